use chrono::NaiveDate;

use crate::error::{EdfError, Result};

/// Non-localized integer parse (EDF numeric fields are plain ASCII).
pub fn atoi_nonlocalized(s: &str) -> i32 {
    let s = s.trim();
    if s.is_empty() {
        return 0;
    }

    s.parse().unwrap_or(0)
}

/// Non-localized float parse.
pub fn atof_nonlocalized(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }

    s.parse().unwrap_or(0.0)
}

/// Parses an EDF time/duration string into 100 ns units.
///
/// Accepts an optional sign and up to 7 fractional digits, e.g. `"1"`,
/// `"+12.5"`, `"-0.0000001"`.
pub fn parse_edf_time(s: &str) -> Result<i64> {
    let s = s.trim();

    if s.is_empty() {
        return Err(EdfError::Decode("Empty time string".to_string()));
    }

    let (negative, s) = if let Some(rest) = s.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = s.strip_prefix('+') {
        (false, rest)
    } else {
        (false, s)
    };

    let mut value = 0i64;

    if let Some(dot_pos) = s.find('.') {
        let integer_part = &s[..dot_pos];
        let decimal_part = &s[dot_pos + 1..];

        if !integer_part.is_empty() {
            value += integer_part
                .parse::<i64>()
                .map_err(|_| EdfError::Decode(format!("Invalid time value: {}", s)))?
                * crate::EDF_TIME_DIMENSION;
        }

        if !decimal_part.is_empty() {
            // At most 7 fractional digits carry information at 100 ns resolution
            let decimal_str = if decimal_part.len() > 7 {
                &decimal_part[..7]
            } else {
                decimal_part
            };

            let decimal_value = decimal_str
                .parse::<i64>()
                .map_err(|_| EdfError::Decode(format!("Invalid time value: {}", s)))?;

            let scale = 10i64.pow(7 - decimal_str.len() as u32);
            value += decimal_value * scale;
        }
    } else {
        value = s
            .parse::<i64>()
            .map_err(|_| EdfError::Decode(format!("Invalid time value: {}", s)))?
            * crate::EDF_TIME_DIMENSION;
    }

    if negative {
        value = -value;
    }

    Ok(value)
}

/// Renders a 100 ns tick count as an EDF time/duration string.
///
/// Inverse of [`parse_edf_time`] up to trailing-zero trimming: whole
/// seconds render without a fraction.
pub fn fmt_edf_time(ticks: i64) -> String {
    let sign = if ticks < 0 { "-" } else { "" };
    let ticks = ticks.abs();
    let seconds = ticks / crate::EDF_TIME_DIMENSION;
    let fraction = ticks % crate::EDF_TIME_DIMENSION;

    if fraction == 0 {
        return format!("{}{}", sign, seconds);
    }

    let mut frac_str = format!("{:07}", fraction);
    while frac_str.ends_with('0') {
        frac_str.pop();
    }
    format!("{}{}.{}", sign, seconds, frac_str)
}

/// Month abbreviations mandated by the EDF+ long date form.
pub const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// Renders a date in the EDF+ long form, e.g. `02-MAY-1951`.
pub fn format_edf_long_date(date: NaiveDate) -> String {
    use chrono::Datelike;
    format!(
        "{:02}-{}-{:04}",
        date.day(),
        MONTHS[date.month0() as usize],
        date.year()
    )
}

const FLEXIBLE_DATE_FORMATS: [&str; 11] = [
    "%d-%b-%Y",
    "%d-%B-%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%d.%m.%Y",
    "%d/%m/%Y",
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%b %d %Y",
    "%d.%m.%y",
];

/// Best-effort date parse over the formats seen in real-world headers.
///
/// Month names match case-insensitively, so both `01-Jan-2000` and
/// `01-JAN-2000` parse. Bare numbers fail on purpose: a lone `32` in a
/// patient field must not become a date.
pub fn parse_flexible_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    FLEXIBLE_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Whether a token has the exact `DD-<alpha-month>-YYYY` shape required
/// by the EDF+ grammar (`02-MAY-1951`). Used to raise guess confidence,
/// not to validate the date itself.
pub fn is_strict_edf_date_shape(s: &str) -> bool {
    let parts: Vec<&str> = s.split('-').collect();
    if parts.len() != 3 {
        return false;
    }

    parts[0].len() == 2
        && parts[0].chars().all(|c| c.is_ascii_digit())
        && !parts[1].is_empty()
        && parts[1].chars().all(char::is_alphabetic)
        && parts[2].len() == 4
        && parts[2].chars().all(|c| c.is_ascii_digit())
}

/// Transliterates text to its closest ASCII equivalent.
pub fn transliterate(s: &str) -> String {
    deunicode::deunicode(s)
}
