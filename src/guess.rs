//! Heuristic interpretation of whitespace-tokenized LPI/LRI free text.
//!
//! Every token is independently tested against every candidate type, so a
//! single token may yield zero, one or several guesses (a string can parse
//! as a date and still be something else). Guesses are ephemeral: they live
//! only while the fixer reconstructs a compliant field string.

use chrono::NaiveDate;

use crate::types::Sex;
use crate::utils::{is_strict_edf_date_shape, parse_flexible_date};

/// The slot a guessed value could occupy in a compliant field string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuessKind {
    Sex,
    Birthdate,
    Startdate,
    Code,
    Name,
    Technician,
    Equipment,
}

/// Typed value carried by a guess.
#[derive(Debug, Clone, PartialEq)]
pub enum GuessValue {
    Sex(Sex),
    Date(NaiveDate),
    Text(String),
}

/// One typed interpretation of a source token.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldGuess {
    pub kind: GuessKind,
    pub value: GuessValue,
    /// In [0,1]. Strict-shaped dates score 0.8, everything else 0.5;
    /// the gap is the tie-break used during conflict resolution.
    pub confidence: f64,
    /// Index of the source token within the tokenized field.
    pub token_index: usize,
}

fn date_guess(kind: GuessKind, token: &str, index: usize) -> Option<FieldGuess> {
    let date = parse_flexible_date(token)?;
    let confidence = if is_strict_edf_date_shape(token) { 0.8 } else { 0.5 };
    Some(FieldGuess {
        kind,
        value: GuessValue::Date(date),
        confidence,
        token_index: index,
    })
}

/// Proposes typed interpretations for the tokens of a patient field.
pub fn guess_patient_fields(tokens: &[&str]) -> Vec<FieldGuess> {
    let mut guesses = Vec::new();

    for (n, token) in tokens.iter().enumerate() {
        if let Some(sex) = Sex::from_token(token) {
            guesses.push(FieldGuess {
                kind: GuessKind::Sex,
                value: GuessValue::Sex(sex),
                confidence: 0.5,
                token_index: n,
            });
        }
        if let Some(guess) = date_guess(GuessKind::Birthdate, token, n) {
            guesses.push(guess);
        }
    }

    guesses
}

/// Proposes typed interpretations for the tokens of a recording field.
pub fn guess_recording_fields(tokens: &[&str]) -> Vec<FieldGuess> {
    let mut guesses = Vec::new();

    for (n, token) in tokens.iter().enumerate() {
        if let Some(guess) = date_guess(GuessKind::Startdate, token, n) {
            guesses.push(guess);
        }
    }

    guesses
}
