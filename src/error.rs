use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EdfError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid EDF structure: {0}")]
    Decode(String),

    #[error("Header text has no ASCII-safe decoding: {0}")]
    Encoding(String),

    #[error("Not a valid EDF(+) recording: {0}")]
    InvalidFile(String),

    #[error("Could not repair the EDF file: {0}")]
    Repair(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Invalid header size")]
    InvalidHeader,

    #[error("Invalid number of signals: {0}")]
    InvalidSignalCount(i32),
}

pub type Result<T> = std::result::Result<T, EdfError>;

/// Failure of the strict (field-by-field) LPI/LRI reformatting pass.
///
/// This is deliberately a separate type from [`EdfError`]: the strict fixers
/// return `Result<String, FieldFormatError>` and the caller branches on it to
/// fall back to the heuristic reconstruction. It never crosses the public
/// boundary of the fixer module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FieldFormatError {
    #[error("Invalid sex field")]
    InvalidSex,

    #[error("Invalid birthdate field")]
    InvalidBirthdate,

    #[error("Missing Startdate")]
    MissingStartdate,

    #[error("Invalid startdate field")]
    InvalidStartdate,
}
