//! Compliance repair for the two free-text header fields.
//!
//! Malformed local patient/recording information falls into two classes:
//! "right shape, wrong spelling", which the strict field-by-field pass
//! fixes deterministically and losslessly, and "garbled or reordered",
//! which is only recoverable approximately. The heuristic pass maximizes
//! the chance of placing each recognizable fact into its compliant slot
//! and never silently drops unrecognized text: unclassified tokens are
//! appended verbatim after the structured slots.

use std::collections::HashMap;

use log::debug;

use crate::error::{EdfError, FieldFormatError, Result};
use crate::guess::{
    guess_patient_fields, guess_recording_fields, FieldGuess, GuessKind, GuessValue,
};
use crate::header::{char_slice, decode_header_text, LPI_RANGE, LRI_RANGE};
use crate::utils::{format_edf_long_date, parse_flexible_date, transliterate};
use crate::EDF_HEADER_SIZE;

/// Field-by-field reformatting of local patient information.
///
/// Trusts that the field is almost compliant: correct token count and
/// order, wrong formatting only. Short fields are padded with `X`
/// placeholders; the birthdate is re-rendered in the `DD-MMM-YYYY` form.
/// Idempotent on already-compliant input.
pub fn basic_fix_lpi_format(lpi: &str) -> std::result::Result<String, FieldFormatError> {
    let mut fields: Vec<String> = lpi.split_whitespace().map(str::to_string).collect();

    while fields.len() < 4 {
        fields.push("X".to_string());
    }

    if !matches!(fields[1].to_ascii_lowercase().as_str(), "m" | "f" | "x") {
        return Err(FieldFormatError::InvalidSex);
    }

    if fields[2].to_ascii_lowercase() != "x" {
        let birthdate =
            parse_flexible_date(&fields[2]).ok_or(FieldFormatError::InvalidBirthdate)?;
        fields[2] = format_edf_long_date(birthdate);
    }

    Ok(transliterate(&fields.join(" ")))
}

/// Field-by-field reformatting of local recording information.
pub fn basic_fix_lri_format(lri: &str) -> std::result::Result<String, FieldFormatError> {
    let mut fields: Vec<String> = lri.split_whitespace().map(str::to_string).collect();

    while fields.len() < 5 {
        fields.push("X".to_string());
    }

    if fields[0].to_ascii_lowercase() != "startdate" {
        return Err(FieldFormatError::MissingStartdate);
    }

    fields[0] = "Startdate".to_string();

    if fields[1].to_ascii_lowercase() != "x" {
        let startdate =
            parse_flexible_date(&fields[1]).ok_or(FieldFormatError::InvalidStartdate)?;
        fields[1] = format_edf_long_date(startdate);
    }

    Ok(transliterate(&fields.join(" ")))
}

/// Result of conflict resolution: at most one accepted guess per slot,
/// plus the tokens that stay unclassified, in their original order.
#[derive(Debug)]
pub struct CompliantFieldSet {
    selected: HashMap<GuessKind, FieldGuess>,
    leftovers: Vec<String>,
}

impl CompliantFieldSet {
    pub fn slot(&self, kind: GuessKind) -> Option<&FieldGuess> {
        self.selected.get(&kind)
    }

    pub fn leftovers(&self) -> &[String] {
        &self.leftovers
    }

    /// The compliant rendering of a slot, `X` when nothing was accepted.
    fn slot_text(&self, kind: GuessKind) -> String {
        match self.selected.get(&kind).map(|g| &g.value) {
            Some(GuessValue::Sex(sex)) => sex.as_edf_token().to_string(),
            Some(GuessValue::Date(date)) => format_edf_long_date(*date),
            Some(GuessValue::Text(text)) => text.clone(),
            None => "X".to_string(),
        }
    }
}

/// Resolves conflicting guesses into at most one accepted guess per kind.
///
/// Guesses are sorted ascending by confidence and popped from the top, so
/// the highest-confidence guess for a kind is seen first and wins outright
/// over lower-confidence ones. Two guesses of the same kind with *equal*
/// confidence but different values are irreconcilable: the accepted one is
/// discarded entirely and both source tokens stay in the leftover set.
pub fn process_field_guesses(tokens: &[&str], mut guesses: Vec<FieldGuess>) -> CompliantFieldSet {
    guesses.sort_by(|a, b| {
        a.confidence
            .partial_cmp(&b.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut selected: HashMap<GuessKind, FieldGuess> = HashMap::new();

    while let Some(guess) = guesses.pop() {
        match selected.get(&guess.kind) {
            None => {
                selected.insert(guess.kind, guess);
            }
            Some(current)
                if current.confidence == guess.confidence && current.value != guess.value =>
            {
                debug!(
                    "conflicting {:?} guesses at equal confidence, dropping both",
                    guess.kind
                );
                selected.remove(&guess.kind);
            }
            Some(_) => {}
        }
    }

    let consumed: Vec<usize> = selected.values().map(|g| g.token_index).collect();
    let leftovers = tokens
        .iter()
        .enumerate()
        .filter(|(n, _)| !consumed.contains(n))
        .map(|(_, token)| token.to_string())
        .collect();

    CompliantFieldSet { selected, leftovers }
}

/// Reconstruction of local patient information from heuristic guesses.
///
/// Canonical slot order `code sex birthdate name`, `X` for empty slots,
/// unclassified tokens appended in original order.
pub fn heuristic_fix_lpi_format(lpi: &str) -> String {
    let tokens: Vec<&str> = lpi.split_whitespace().collect();
    let guesses = guess_patient_fields(&tokens);
    let set = process_field_guesses(&tokens, guesses);

    let mut fields = vec![
        set.slot_text(GuessKind::Code),
        set.slot_text(GuessKind::Sex),
        set.slot_text(GuessKind::Birthdate),
        set.slot_text(GuessKind::Name),
    ];
    fields.extend(set.leftovers().iter().cloned());

    transliterate(&fields.join(" "))
}

/// Reconstruction of local recording information from heuristic guesses.
pub fn heuristic_fix_lri_format(lri: &str) -> String {
    let tokens: Vec<&str> = lri.split_whitespace().collect();
    let guesses = guess_recording_fields(&tokens);
    let set = process_field_guesses(&tokens, guesses);

    let mut fields = vec![
        "Startdate".to_string(),
        set.slot_text(GuessKind::Startdate),
        set.slot_text(GuessKind::Code),
        set.slot_text(GuessKind::Technician),
        set.slot_text(GuessKind::Equipment),
    ];
    fields.extend(set.leftovers().iter().cloned());

    transliterate(&fields.join(" "))
}

fn fix_field(
    raw: &str,
    strict: impl Fn(&str) -> std::result::Result<String, FieldFormatError>,
    heuristic: impl Fn(&str) -> String,
    label: &str,
) -> String {
    match strict(raw) {
        Ok(fixed) => fixed,
        Err(err) => {
            debug!("strict {} fix failed ({}), trying heuristic reconstruction", label, err);
            heuristic(raw)
        }
    }
}

/// Repairs the LPI/LRI content of a raw 256-byte header.
///
/// The two fields are fixed independently: one falling back to its
/// heuristic path does not affect the other. All byte ranges the fixer
/// does not own (start date/time, header size, record count, duration,
/// signal count) are preserved verbatim, and the file-type marker is
/// forced to the EDF+ continuous tag since the repaired file is, by
/// construction, being normalized to EDF+.
pub fn fix_edfplus_header(header: &[u8]) -> Result<Vec<u8>> {
    if header.len() < EDF_HEADER_SIZE {
        return Err(EdfError::Decode(format!(
            "header needs {} bytes, got {}",
            EDF_HEADER_SIZE,
            header.len()
        )));
    }

    let text = decode_header_text(&header[..EDF_HEADER_SIZE])?;

    let lpi = char_slice(&text, LPI_RANGE.start, LPI_RANGE.end);
    let lri = char_slice(&text, LRI_RANGE.start, LRI_RANGE.end);

    let compliant_lpi = fix_field(
        lpi.trim(),
        basic_fix_lpi_format,
        heuristic_fix_lpi_format,
        "LPI",
    );
    let compliant_lri = fix_field(
        lri.trim(),
        basic_fix_lri_format,
        heuristic_fix_lri_format,
        "LRI",
    );

    let mut fixed = String::with_capacity(EDF_HEADER_SIZE);
    fixed.push_str(&format!("{:<8}", "0"));
    fixed.push_str(&format!("{:<80}", truncate_chars(&compliant_lpi, 80)));
    fixed.push_str(&format!("{:<80}", truncate_chars(&compliant_lri, 80)));
    fixed.push_str(&char_slice(&text, 168, 192));
    fixed.push_str(&format!("{:<44}", "EDF+C"));
    fixed.push_str(&char_slice(&text, 236, 256));

    if !fixed.is_ascii() {
        return Err(EdfError::Encoding(
            "repaired header still contains non-ASCII text".to_string(),
        ));
    }
    debug_assert_eq!(fixed.len(), EDF_HEADER_SIZE);

    Ok(fixed.into_bytes())
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guess::GuessKind;
    use chrono::NaiveDate;

    #[test]
    fn test_basic_lpi_reformats_date() {
        let fixed = basic_fix_lpi_format("P001 F 02.05.1951 Doe_J").unwrap();
        assert_eq!(fixed, "P001 F 02-MAY-1951 Doe_J");
    }

    #[test]
    fn test_basic_lpi_pads_short_fields() {
        assert_eq!(basic_fix_lpi_format("P001").unwrap(), "P001 X X X");
        assert_eq!(basic_fix_lpi_format("").unwrap(), "X X X X");
    }

    #[test]
    fn test_basic_lpi_idempotent() {
        let once = basic_fix_lpi_format("P001 F 02-MAY-1951 Doe_J").unwrap();
        let twice = basic_fix_lpi_format(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_basic_lpi_rejects_invalid_sex() {
        assert_eq!(
            basic_fix_lpi_format("X Q 01-Jan-2000 X"),
            Err(FieldFormatError::InvalidSex)
        );
    }

    #[test]
    fn test_basic_lpi_rejects_invalid_birthdate() {
        assert_eq!(
            basic_fix_lpi_format("P001 M notadate Doe_J"),
            Err(FieldFormatError::InvalidBirthdate)
        );
    }

    #[test]
    fn test_basic_lri_canonicalizes_startdate() {
        let fixed = basic_fix_lri_format("STARTDATE 02.03.2002 PSG NN Telemetry").unwrap();
        assert_eq!(fixed, "Startdate 02-MAR-2002 PSG NN Telemetry");
    }

    #[test]
    fn test_basic_lri_requires_startdate_keyword() {
        assert_eq!(
            basic_fix_lri_format("02-MAR-2002 PSG NN Telemetry X"),
            Err(FieldFormatError::MissingStartdate)
        );
    }

    #[test]
    fn test_strict_failure_is_recovered_by_heuristic() {
        let lpi = "X Q 01-Jan-2000 X";
        assert!(basic_fix_lpi_format(lpi).is_err());

        let fixed = heuristic_fix_lpi_format(lpi);
        assert_eq!(fixed, "X X 01-JAN-2000 X X Q X");
    }

    #[test]
    fn test_conflict_at_equal_confidence_drops_both() {
        let tokens = ["01-JAN-2000", "02-FEB-2001"];
        let guesses = guess_patient_fields(&tokens);
        let set = process_field_guesses(&tokens, guesses);

        assert!(set.slot(GuessKind::Birthdate).is_none());
        assert_eq!(set.leftovers(), ["01-JAN-2000", "02-FEB-2001"]);
    }

    #[test]
    fn test_higher_confidence_overrides_regardless_of_order() {
        for tokens in [["2000-01-01", "02-FEB-2001"], ["02-FEB-2001", "2000-01-01"]] {
            let guesses = guess_patient_fields(&tokens);
            let set = process_field_guesses(&tokens, guesses);

            let accepted = set.slot(GuessKind::Birthdate).expect("one guess accepted");
            assert_eq!(accepted.confidence, 0.8);
            assert_eq!(
                accepted.value,
                GuessValue::Date(NaiveDate::from_ymd_opt(2001, 2, 2).unwrap())
            );
            assert_eq!(set.leftovers(), ["2000-01-01"]);
        }
    }

    #[test]
    fn test_duplicate_equal_guesses_keep_one() {
        // Same value at the same confidence is not a conflict; the second
        // token merely stays unclassified
        let tokens = ["01-JAN-2000", "01-JAN-2000"];
        let guesses = guess_patient_fields(&tokens);
        let set = process_field_guesses(&tokens, guesses);

        assert!(set.slot(GuessKind::Birthdate).is_some());
        assert_eq!(set.leftovers(), ["01-JAN-2000"]);
    }

    #[test]
    fn test_heuristic_preserves_unclassified_tokens_in_order() {
        let fixed = heuristic_fix_lpi_format("John Smith f 02-MAY-1951");
        assert_eq!(fixed, "X F 02-MAY-1951 X John Smith");
    }

    #[test]
    fn test_heuristic_lri_reconstruction() {
        let fixed = heuristic_fix_lri_format("recorded 02-MAR-2002 by NN");
        assert_eq!(fixed, "Startdate 02-MAR-2002 X X X recorded by NN");
    }

    #[test]
    fn test_fix_header_repairs_both_fields() {
        let mut header = vec![b' '; 256];
        header[0..8].copy_from_slice(b"0       ");
        let lpi = b"P001 female 02.05.1951 Doe";
        header[8..8 + lpi.len()].copy_from_slice(lpi);
        let lri = b"02-MAR-2002 PSG NN";
        header[88..88 + lri.len()].copy_from_slice(lri);
        header[168..176].copy_from_slice(b"02.03.02");
        header[176..184].copy_from_slice(b"10.20.30");
        header[184..192].copy_from_slice(b"768     ");
        header[236..244].copy_from_slice(b"10      ");
        header[244..252].copy_from_slice(b"1       ");
        header[252..256].copy_from_slice(b"2   ");

        let fixed = fix_edfplus_header(&header).unwrap();
        let text = std::str::from_utf8(&fixed).unwrap();

        // LPI: "female" is not a valid sex token, strict path fails, the
        // heuristic salvages the birthdate and keeps the rest
        assert!(text[8..88].trim_end().starts_with("X X 02-MAY-1951 X"));
        // LRI: missing Startdate keyword, heuristic inserts it
        assert!(text[88..168].trim_end().starts_with("Startdate 02-MAR-2002"));
        // Untouched ranges survive byte-for-byte
        assert_eq!(&text[168..176], "02.03.02");
        assert_eq!(&text[176..184], "10.20.30");
        assert_eq!(&text[184..192], "768     ");
        assert_eq!(&text[236..244], "10      ");
        assert!(text[192..236].starts_with("EDF+C"));
    }

    #[test]
    fn test_fix_header_transliterates_non_ascii() {
        let mut header = vec![b' '; 256];
        header[0..8].copy_from_slice(b"0       ");
        // "Müller M 02-MAY-1951 X" in Latin-1
        let lpi: &[u8] = b"M\xfcller M 02-MAY-1951 X";
        header[8..8 + lpi.len()].copy_from_slice(lpi);
        let lri = b"Startdate 02-MAR-2002 X X X";
        header[88..88 + lri.len()].copy_from_slice(lri);

        let fixed = fix_edfplus_header(&header).unwrap();
        assert!(fixed.is_ascii());
        let text = std::str::from_utf8(&fixed).unwrap();
        let fixed_lpi = text[8..88].trim_end();
        // The exact transliteration depends on the detected charset; the
        // repaired field must be ASCII and keep the compliant shape
        assert!(fixed_lpi.contains("M 02-MAY-1951 X"), "got {:?}", fixed_lpi);
    }
}
