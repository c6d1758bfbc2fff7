//! Binary codec for the 256-byte EDF(+) primary header.
//!
//! The byte offsets used here are part of the format contract and must be
//! reproduced exactly on encode:
//!
//! | bytes      | field                              |
//! |------------|------------------------------------|
//! | [0,8)      | version                            |
//! | [8,88)     | local patient information (LPI)    |
//! | [88,168)   | local recording information (LRI)  |
//! | [168,176)  | start date `dd.mm.yy`              |
//! | [176,184)  | start time `hh.mm.ss`              |
//! | [184,192)  | header size in bytes               |
//! | [192,236)  | reserved / file-type tag           |
//! | [236,244)  | number of data records             |
//! | [244,252)  | data record duration               |
//! | [252,256)  | number of signals                  |
//!
//! This module is a pure offset map with no heuristics; compliance repair
//! of malformed LPI/LRI content lives in [`crate::fixer`].

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};

use crate::error::{EdfError, Result};
use crate::types::{FileVariant, HeaderRecord, Sex};
use crate::utils::{atoi_nonlocalized, format_edf_long_date, parse_edf_time, transliterate};
use crate::{EDF_HEADER_SIZE, EDF_MAX_SIGNALS, EDF_TIME_DIMENSION};

pub const LPI_RANGE: std::ops::Range<usize> = 8..88;
pub const LRI_RANGE: std::ops::Range<usize> = 88..168;
pub const RESERVED_RANGE: std::ops::Range<usize> = 192..236;

/// Decodes raw header bytes into text, sniffing the character set.
///
/// EDF headers must be ASCII, but files in the wild are not always strict
/// about it. ASCII passes through untouched; anything else goes through a
/// best-effort charset detection. Bytes that survive neither yield
/// [`EdfError::Encoding`].
pub fn decode_header_text(bytes: &[u8]) -> Result<String> {
    if bytes.is_ascii() {
        // from_utf8_lossy never allocates replacements for pure ASCII
        return Ok(String::from_utf8_lossy(bytes).into_owned());
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);
    let (text, _, had_errors) = encoding.decode(bytes);

    if had_errors {
        return Err(EdfError::Encoding(format!(
            "header bytes are not valid {}",
            encoding.name()
        )));
    }

    Ok(text.into_owned())
}

/// Extracts `[start, end)` of a header string by character position,
/// space-padded so fixed-width slicing never panics on short input.
pub(crate) fn char_slice(text: &str, start: usize, end: usize) -> String {
    let mut out: String = text.chars().skip(start).take(end - start).collect();
    while out.chars().count() < end - start {
        out.push(' ');
    }
    out
}

/// Decodes the primary header into a [`HeaderRecord`].
///
/// For legacy EDF files the free-text patient/recording notes land in
/// `patient_additional`/`recording_additional`; the structured EDF+
/// subfields stay empty. EDF+D (discontinuous) recordings are rejected.
pub fn decode_header(bytes: &[u8]) -> Result<HeaderRecord> {
    if bytes.len() < EDF_HEADER_SIZE {
        return Err(EdfError::Decode(format!(
            "header needs {} bytes, got {}",
            EDF_HEADER_SIZE,
            bytes.len()
        )));
    }

    let text = decode_header_text(&bytes[..EDF_HEADER_SIZE])?;

    let version = char_slice(&text, 0, 8);
    if !version.trim().starts_with('0') {
        return Err(EdfError::UnsupportedFileType(format!(
            "not an EDF file: version {:?}",
            version.trim()
        )));
    }

    let reserved = char_slice(&text, RESERVED_RANGE.start, RESERVED_RANGE.end);
    let variant = if reserved.starts_with("EDF+C") {
        FileVariant::EdfPlus
    } else if reserved.starts_with("EDF+D") {
        return Err(EdfError::UnsupportedFileType(
            "discontinuous EDF+D recordings are not supported".to_string(),
        ));
    } else {
        FileVariant::Edf
    };

    let signal_count = atoi_nonlocalized(&char_slice(&text, 252, 256));
    if signal_count < 1 || signal_count > EDF_MAX_SIGNALS as i32 {
        return Err(EdfError::InvalidSignalCount(signal_count));
    }

    let header_bytes = atoi_nonlocalized(&char_slice(&text, 184, 192));
    if header_bytes != (signal_count + 1) * EDF_HEADER_SIZE as i32 {
        return Err(EdfError::InvalidHeader);
    }

    let datarecords = atoi_nonlocalized(&char_slice(&text, 236, 244)) as i64;

    let duration_str = char_slice(&text, 244, 252);
    let record_duration = if duration_str.trim() == "1" {
        EDF_TIME_DIMENSION
    } else {
        parse_edf_time(&duration_str)?
    };

    let (numeric_date, start_time) = parse_numeric_datetime(
        &char_slice(&text, 168, 176),
        &char_slice(&text, 176, 184),
    )?;

    let lpi = char_slice(&text, LPI_RANGE.start, LPI_RANGE.end);
    let lri = char_slice(&text, LRI_RANGE.start, LRI_RANGE.end);
    let lpi = lpi.trim();
    let lri = lri.trim();

    let mut record = HeaderRecord {
        variant,
        patient_code: String::new(),
        patient_name: String::new(),
        patient_additional: String::new(),
        birthdate: None,
        sex: None,
        admin_code: String::new(),
        recording_start: numeric_date.and_time(start_time),
        technician: String::new(),
        equipment: String::new(),
        recording_additional: String::new(),
        datarecords,
        record_duration,
        signal_count: signal_count as usize,
    };

    match variant {
        FileVariant::Edf => {
            // Legacy EDF has no subfield grammar; keep the notes verbatim
            record.patient_additional = lpi.to_string();
            record.recording_additional = lri.to_string();
        }
        FileVariant::EdfPlus => {
            decode_lpi_subfields(lpi, &mut record);
            decode_lri_subfields(lri, &mut record, start_time);
        }
    }

    Ok(record)
}

fn parse_numeric_datetime(date_str: &str, time_str: &str) -> Result<(NaiveDate, NaiveTime)> {
    let date_parts: Vec<&str> = date_str.trim().split('.').collect();
    if date_parts.len() != 3 {
        return Err(EdfError::Decode(format!("invalid start date: {:?}", date_str)));
    }

    let day = atoi_nonlocalized(date_parts[0]);
    let month = atoi_nonlocalized(date_parts[1]);
    let year = {
        // EDF two-digit year pivot: 85..99 => 19xx, 00..84 => 20xx
        let yy = atoi_nonlocalized(date_parts[2]);
        if yy > 84 {
            1900 + yy
        } else {
            2000 + yy
        }
    };

    let date = NaiveDate::from_ymd_opt(year, month as u32, day as u32)
        .ok_or_else(|| EdfError::Decode(format!("invalid start date: {:?}", date_str)))?;

    let time_parts: Vec<&str> = time_str.trim().split('.').collect();
    if time_parts.len() != 3 {
        return Err(EdfError::Decode(format!("invalid start time: {:?}", time_str)));
    }

    let time = NaiveTime::from_hms_opt(
        atoi_nonlocalized(time_parts[0]) as u32,
        atoi_nonlocalized(time_parts[1]) as u32,
        atoi_nonlocalized(time_parts[2]) as u32,
    )
    .ok_or_else(|| EdfError::Decode(format!("invalid start time: {:?}", time_str)))?;

    Ok((date, time))
}

fn subfield_value(token: Option<&&str>) -> String {
    match token {
        Some(&"X") | Some(&"x") | None => String::new(),
        Some(t) => t.to_string(),
    }
}

fn decode_lpi_subfields(lpi: &str, record: &mut HeaderRecord) {
    // EDF+ LPI grammar: code sex birthdate name [additional...]
    let parts: Vec<&str> = lpi.split_whitespace().collect();

    record.patient_code = subfield_value(parts.first());
    record.sex = parts.get(1).and_then(|t| Sex::from_token(t));
    record.birthdate = parts
        .get(2)
        .and_then(|t| NaiveDate::parse_from_str(t, "%d-%b-%Y").ok());
    record.patient_name = subfield_value(parts.get(3));
    record.patient_additional = parts.get(4..).map(|s| s.join(" ")).unwrap_or_default();
}

fn decode_lri_subfields(lri: &str, record: &mut HeaderRecord, start_time: NaiveTime) {
    // EDF+ LRI grammar: Startdate date admincode technician equipment [additional...]
    let parts: Vec<&str> = lri.split_whitespace().collect();

    // The 4-digit year of the Startdate subfield overrides the two-digit
    // year of the numeric date field (EDF+ spec, section 2.1.3.4)
    if let Some(date) = parts
        .get(1)
        .and_then(|t| NaiveDate::parse_from_str(t, "%d-%b-%Y").ok())
    {
        record.recording_start = date.and_time(start_time);
    }

    record.admin_code = subfield_value(parts.get(2));
    record.technician = subfield_value(parts.get(3));
    record.equipment = subfield_value(parts.get(4));
    record.recording_additional = parts.get(5..).map(|s| s.join(" ")).unwrap_or_default();
}

/// A structured subfield serialized into the LPI/LRI grammar: ASCII only,
/// internal whitespace replaced by underscores, `X` when empty.
fn encode_subfield(s: &str) -> String {
    let t = transliterate(s.trim());
    if t.is_empty() {
        "X".to_string()
    } else {
        t.split_whitespace().collect::<Vec<_>>().join("_")
    }
}

fn encode_lpi(record: &HeaderRecord) -> String {
    match record.variant {
        FileVariant::Edf => transliterate(&record.patient_additional),
        FileVariant::EdfPlus => {
            let mut parts = vec![
                encode_subfield(&record.patient_code),
                record
                    .sex
                    .map(|s| s.as_edf_token().to_string())
                    .unwrap_or_else(|| "X".to_string()),
                record
                    .birthdate
                    .map(format_edf_long_date)
                    .unwrap_or_else(|| "X".to_string()),
                encode_subfield(&record.patient_name),
            ];
            let additional = transliterate(record.patient_additional.trim());
            if !additional.is_empty() {
                parts.push(additional);
            }
            parts.join(" ")
        }
    }
}

fn encode_lri(record: &HeaderRecord) -> String {
    match record.variant {
        FileVariant::Edf => transliterate(&record.recording_additional),
        FileVariant::EdfPlus => {
            let mut parts = vec![
                "Startdate".to_string(),
                format_edf_long_date(record.recording_start.date()),
                encode_subfield(&record.admin_code),
                encode_subfield(&record.technician),
                encode_subfield(&record.equipment),
            ];
            let additional = transliterate(record.recording_additional.trim());
            if !additional.is_empty() {
                parts.push(additional);
            }
            parts.join(" ")
        }
    }
}

fn write_field(out: &mut [u8], range: std::ops::Range<usize>, value: &str) {
    let width = range.end - range.start;
    let bytes = value.as_bytes();
    let len = bytes.len().min(width);
    out[range.start..range.start + len].copy_from_slice(&bytes[..len]);
}

/// Encodes a [`HeaderRecord`] into the 256-byte primary header.
///
/// Free-text fields are transliterated to ASCII, truncated to their fixed
/// width and right-padded with spaces. Dates re-render in the fixed
/// `DD-MMM-YYYY` form.
pub fn encode_header(record: &HeaderRecord) -> Vec<u8> {
    let mut out = vec![b' '; EDF_HEADER_SIZE];

    write_field(&mut out, 0..8, "0");
    write_field(&mut out, LPI_RANGE, &encode_lpi(record));
    write_field(&mut out, LRI_RANGE, &encode_lri(record));

    let start = record.recording_start;
    write_field(
        &mut out,
        168..176,
        &format!(
            "{:02}.{:02}.{:02}",
            start.day(),
            start.month(),
            start.year().rem_euclid(100)
        ),
    );
    write_field(
        &mut out,
        176..184,
        &format!("{:02}.{:02}.{:02}", start.hour(), start.minute(), start.second()),
    );

    let header_bytes = (record.signal_count + 1) * EDF_HEADER_SIZE;
    write_field(&mut out, 184..192, &format!("{:<8}", header_bytes));

    if record.variant == FileVariant::EdfPlus {
        write_field(&mut out, RESERVED_RANGE, "EDF+C");
    }

    write_field(&mut out, 236..244, &format!("{:<8}", record.datarecords));
    write_field(
        &mut out,
        244..252,
        &format!("{:<8}", crate::utils::fmt_edf_time(record.record_duration)),
    );
    write_field(&mut out, 252..256, &format!("{:<4}", record.signal_count));

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> HeaderRecord {
        HeaderRecord {
            variant: FileVariant::EdfPlus,
            patient_code: "P001".to_string(),
            patient_name: "Doe_J".to_string(),
            patient_additional: String::new(),
            birthdate: NaiveDate::from_ymd_opt(1951, 5, 2),
            sex: Some(Sex::Female),
            admin_code: "PSG-1234".to_string(),
            recording_start: NaiveDate::from_ymd_opt(2002, 3, 2)
                .unwrap()
                .and_hms_opt(10, 20, 30)
                .unwrap(),
            technician: "NN".to_string(),
            equipment: "Telemetry03".to_string(),
            recording_additional: String::new(),
            datarecords: 10,
            record_duration: EDF_TIME_DIMENSION,
            signal_count: 2,
        }
    }

    #[test]
    fn test_encode_offsets() {
        let bytes = encode_header(&sample_record());
        assert_eq!(bytes.len(), EDF_HEADER_SIZE);
        assert_eq!(&bytes[0..8], b"0       ");
        assert!(std::str::from_utf8(&bytes[8..88])
            .unwrap()
            .starts_with("P001 F 02-MAY-1951 Doe_J"));
        assert!(std::str::from_utf8(&bytes[88..168])
            .unwrap()
            .starts_with("Startdate 02-MAR-2002 PSG-1234 NN Telemetry03"));
        assert_eq!(&bytes[168..176], b"02.03.02");
        assert_eq!(&bytes[176..184], b"10.20.30");
        assert!(std::str::from_utf8(&bytes[192..236]).unwrap().starts_with("EDF+C"));
    }

    #[test]
    fn test_round_trip() {
        let record = sample_record();
        let decoded = decode_header(&encode_header(&record)).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_round_trip_far_future_start() {
        // dd.mm.yy cannot carry year 3000; the LRI Startdate subfield must
        let mut record = sample_record();
        record.recording_start = NaiveDate::from_ymd_opt(3000, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let decoded = decode_header(&encode_header(&record)).unwrap();
        assert_eq!(decoded.recording_start, record.recording_start);
    }

    #[test]
    fn test_legacy_fields_map_to_additional() {
        let mut record = sample_record();
        record.variant = FileVariant::Edf;
        record.patient_additional = "free text patient notes".to_string();
        record.recording_additional = "free text recording notes".to_string();

        let decoded = decode_header(&encode_header(&record)).unwrap();
        assert_eq!(decoded.variant, FileVariant::Edf);
        assert_eq!(decoded.patient_additional, "free text patient notes");
        assert_eq!(decoded.recording_additional, "free text recording notes");
        assert!(decoded.patient_code.is_empty());
        assert_eq!(decoded.sex, None);
        assert_eq!(decoded.birthdate, None);
    }

    #[test]
    fn test_non_ascii_name_is_transliterated() {
        let mut record = sample_record();
        record.patient_name = "Müller".to_string();
        let bytes = encode_header(&record);
        assert!(bytes.is_ascii());
        let decoded = decode_header(&bytes).unwrap();
        assert_eq!(decoded.patient_name, "Muller");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_header(&[0u8; 64]),
            Err(EdfError::Decode(_))
        ));

        let mut bytes = encode_header(&sample_record());
        bytes[0] = b'9';
        assert!(matches!(
            decode_header(&bytes),
            Err(EdfError::UnsupportedFileType(_))
        ));
    }

    #[test]
    fn test_decode_rejects_header_size_mismatch() {
        let mut bytes = encode_header(&sample_record());
        bytes[184..192].copy_from_slice(b"512     ");
        assert!(matches!(decode_header(&bytes), Err(EdfError::InvalidHeader)));
    }
}
