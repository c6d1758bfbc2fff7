//! # anonymedf
//!
//! Editing, anonymization and compliance repair for EDF/EDF+ biosignal
//! recordings (European Data Format).
//!
//! The library covers three concerns:
//!
//! - a binary codec between the fixed-offset EDF(+) header and a
//!   structured record ([`header`]),
//! - a compliance-repair engine that reformats malformed local
//!   patient/recording information into the mandated EDF+ grammar, with a
//!   deterministic strict pass and a confidence-weighted heuristic
//!   fallback ([`fixer`], [`guess`], [`repair`]),
//! - an in-memory record model that applies anonymization edits to header
//!   fields and annotations while leaving signal sample data bit-identical
//!   ([`model`]).
//!
//! ## Repairing a non-compliant file
//!
//! ```rust
//! use anonymedf::repair::fix_edf_file;
//!
//! # anonymedf::doctest_utils::create_malformed_test_file("lib_doc_bad.edf")?;
//! // Writes a repaired sibling copy, never touching the source
//! let fixed = fix_edf_file("lib_doc_bad.edf", None, true)?;
//! println!("repaired copy at {}", fixed.display());
//! # std::fs::remove_file("lib_doc_bad.edf").ok();
//! # std::fs::remove_file(&fixed).ok();
//! # Ok::<(), anonymedf::EdfError>(())
//! ```
//!
//! ## Anonymizing a recording
//!
//! ```rust
//! use anonymedf::{FieldEdit, HeaderField, RecordModel, DEFAULT_ANONYMIZED_FIELDS};
//! use std::collections::HashMap;
//!
//! # anonymedf::doctest_utils::create_test_file("lib_doc.edf")?;
//! let mut model = RecordModel::load("lib_doc.edf")?;
//!
//! let edits: HashMap<_, _> = DEFAULT_ANONYMIZED_FIELDS
//!     .iter()
//!     .map(|&field| (field, FieldEdit::anonymize()))
//!     .collect();
//! model.apply_header_edits(&edits);
//!
//! model.write("lib_doc_anonymized.edf")?;
//! # std::fs::remove_file("lib_doc.edf").ok();
//! # std::fs::remove_file("lib_doc_anonymized.edf").ok();
//! # Ok::<(), anonymedf::EdfError>(())
//! ```

pub mod error;
pub mod fixer;
pub mod guess;
pub mod header;
pub mod model;
pub mod reader;
pub mod repair;
pub mod types;
pub mod utils;
pub mod writer;

#[doc(hidden)]
pub mod doctest_utils; // For internal doctest and integration-test support

// Re-export main types for convenience
pub use error::{EdfError, FieldFormatError, Result};
pub use fixer::{
    basic_fix_lpi_format, basic_fix_lri_format, fix_edfplus_header, heuristic_fix_lpi_format,
    heuristic_fix_lri_format, CompliantFieldSet,
};
pub use guess::{FieldGuess, GuessKind, GuessValue};
pub use model::{anonymized_start_sentinel, FieldView, RecordModel};
pub use reader::EdfReader;
pub use repair::fix_edf_file;
pub use types::{
    Annotation, FieldEdit, FieldKind, FieldValue, FileVariant, HeaderField, HeaderRecord, Sex,
    SignalDescriptor, DEFAULT_ANONYMIZED_FIELDS,
};

/// 100 nanosecond units per second, the time resolution used throughout.
pub const EDF_TIME_DIMENSION: i64 = 10_000_000;
pub const EDF_HEADER_SIZE: usize = 256;
pub const EDF_MAX_SIGNALS: usize = 4096;
pub const EDF_MAX_ANNOTATION_LEN: usize = 512;
/// Minimum byte width of the annotation channel per data record.
pub const EDF_ANNOTATION_BYTES: usize = 120;
pub const EDF_ANNOTATIONS_LABEL: &str = "EDF Annotations";

/// Library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
