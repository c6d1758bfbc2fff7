//! In-memory model of one recording under edit.
//!
//! A model instance is exclusively owned by a single edit session: it is
//! created by parsing a source file, mutated in place by edit operations
//! and consumed exactly once by serialization to a new file. The source
//! file is never touched.

use std::collections::HashMap;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{EdfError, Result};
use crate::reader::EdfReader;
use crate::types::{
    Annotation, FieldEdit, FieldKind, FieldValue, HeaderField, HeaderRecord, SignalDescriptor,
};
use crate::writer::write_edf;

/// Sentinel stored when the recording start is anonymized.
///
/// The format cannot represent an empty start datetime, so anonymization
/// of this one field is deliberately lossy: it stores a fixed far-future
/// value instead of clearing it.
pub fn anonymized_start_sentinel() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(3000, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Read-only view of one editable header field, for the editor layer.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldView {
    pub field: HeaderField,
    pub label: &'static str,
    pub kind: FieldKind,
    pub value: Option<FieldValue>,
}

/// The full in-memory representation of one recording.
///
/// ```rust
/// use anonymedf::{FieldEdit, HeaderField, RecordModel};
/// use std::collections::HashMap;
///
/// # anonymedf::doctest_utils::create_test_file("model_doc.edf")?;
/// let mut model = RecordModel::load("model_doc.edf")?;
///
/// let mut edits = HashMap::new();
/// edits.insert(HeaderField::PatientName, FieldEdit::anonymize());
/// model.apply_header_edits(&edits);
///
/// model.write("model_doc_anonymized.edf")?;
/// # std::fs::remove_file("model_doc.edf").ok();
/// # std::fs::remove_file("model_doc_anonymized.edf").ok();
/// # Ok::<(), anonymedf::EdfError>(())
/// ```
pub struct RecordModel {
    header: HeaderRecord,
    signals: Vec<SignalDescriptor>,
    annotations: Vec<Annotation>,
}

impl RecordModel {
    /// Parses `path` into a model.
    ///
    /// Any structural read failure surfaces as [`EdfError::InvalidFile`]:
    /// file-open-time structural validity is a different layer than the
    /// header-field-content problems handled by the compliance fixer, and
    /// it is this error that offers the caller a repair opportunity.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader =
            EdfReader::open(path).map_err(|e| EdfError::InvalidFile(e.to_string()))?;
        let (header, signals, annotations) = reader.into_parts();

        Ok(RecordModel {
            header,
            signals,
            annotations,
        })
    }

    pub fn header(&self) -> &HeaderRecord {
        &self.header
    }

    pub fn signals(&self) -> &[SignalDescriptor] {
        &self.signals
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// The editable fields with their current values, in display order.
    pub fn header_fields(&self) -> impl Iterator<Item = FieldView> + '_ {
        HeaderField::ALL.into_iter().map(|field| FieldView {
            field,
            label: field.label(),
            kind: field.kind(),
            value: self.field_value(field),
        })
    }

    pub fn field_value(&self, field: HeaderField) -> Option<FieldValue> {
        let text = |s: &str| {
            if s.is_empty() {
                None
            } else {
                Some(FieldValue::Text(s.to_string()))
            }
        };

        match field {
            HeaderField::PatientCode => text(&self.header.patient_code),
            HeaderField::PatientName => text(&self.header.patient_name),
            HeaderField::PatientAdditional => text(&self.header.patient_additional),
            HeaderField::Birthdate => self.header.birthdate.map(FieldValue::Date),
            HeaderField::Sex => self.header.sex.map(FieldValue::Sex),
            HeaderField::AdminCode => text(&self.header.admin_code),
            HeaderField::RecordingStart => {
                Some(FieldValue::DateTime(self.header.recording_start))
            }
            HeaderField::Technician => text(&self.header.technician),
            HeaderField::Equipment => text(&self.header.equipment),
            HeaderField::RecordingAdditional => text(&self.header.recording_additional),
        }
    }

    /// Applies header edits: anonymized fields are cleared, everything
    /// else is set to the supplied value (empty when absent).
    ///
    /// The recording start can never be stored empty; anonymizing it
    /// stores [`anonymized_start_sentinel`] instead.
    pub fn apply_header_edits(&mut self, edits: &HashMap<HeaderField, FieldEdit>) {
        for (&field, edit) in edits {
            let value = if edit.anonymize {
                None
            } else {
                edit.value.clone()
            };
            self.set_field(field, value);
        }
    }

    fn set_field(&mut self, field: HeaderField, value: Option<FieldValue>) {
        let as_text = |value: Option<FieldValue>| match value {
            Some(FieldValue::Text(s)) => s,
            _ => String::new(),
        };

        match field {
            HeaderField::PatientCode => self.header.patient_code = as_text(value),
            HeaderField::PatientName => self.header.patient_name = as_text(value),
            HeaderField::PatientAdditional => self.header.patient_additional = as_text(value),
            HeaderField::Birthdate => {
                self.header.birthdate = match value {
                    Some(FieldValue::Date(date)) => Some(date),
                    _ => None,
                }
            }
            HeaderField::Sex => {
                self.header.sex = match value {
                    Some(FieldValue::Sex(sex)) => Some(sex),
                    _ => None,
                }
            }
            HeaderField::AdminCode => self.header.admin_code = as_text(value),
            HeaderField::RecordingStart => {
                self.header.recording_start = match value {
                    Some(FieldValue::DateTime(dt)) => dt,
                    _ => anonymized_start_sentinel(),
                }
            }
            HeaderField::Technician => self.header.technician = as_text(value),
            HeaderField::Equipment => self.header.equipment = as_text(value),
            HeaderField::RecordingAdditional => {
                self.header.recording_additional = as_text(value)
            }
        }
    }

    /// Wholesale replacement of the annotation list.
    ///
    /// Entries marked for removal are simply omitted by the caller before
    /// this call; the model performs no filtering of its own.
    pub fn apply_annotation_edits(&mut self, annotations: Vec<Annotation>) {
        self.annotations = annotations;
    }

    /// Serializes the edited recording to a new EDF+ file.
    ///
    /// Only header and annotation regions differ from the source; digital
    /// sample values round-trip bit-for-bit.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_edf(path, &self.header, &self.signals, &self.annotations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sex;

    fn empty_model() -> RecordModel {
        RecordModel {
            header: HeaderRecord {
                variant: crate::types::FileVariant::EdfPlus,
                patient_code: "P001".to_string(),
                patient_name: "Doe".to_string(),
                patient_additional: String::new(),
                birthdate: NaiveDate::from_ymd_opt(1951, 5, 2),
                sex: Some(Sex::Female),
                admin_code: "A1".to_string(),
                recording_start: NaiveDate::from_ymd_opt(2002, 3, 2)
                    .unwrap()
                    .and_hms_opt(10, 0, 0)
                    .unwrap(),
                technician: "NN".to_string(),
                equipment: "T03".to_string(),
                recording_additional: String::new(),
                datarecords: 0,
                record_duration: crate::EDF_TIME_DIMENSION,
                signal_count: 1,
            },
            signals: Vec::new(),
            annotations: Vec::new(),
        }
    }

    #[test]
    fn test_anonymize_clears_text_field() {
        let mut model = empty_model();
        let mut edits = HashMap::new();
        edits.insert(HeaderField::PatientName, FieldEdit::anonymize());
        // An explicit value loses against the anonymize flag
        edits.insert(
            HeaderField::PatientCode,
            FieldEdit {
                value: Some(FieldValue::Text("P002".to_string())),
                anonymize: true,
            },
        );
        model.apply_header_edits(&edits);

        assert!(model.header().patient_name.is_empty());
        assert!(model.header().patient_code.is_empty());
        assert_eq!(model.header().technician, "NN");
    }

    #[test]
    fn test_anonymize_recording_start_stores_sentinel() {
        let mut model = empty_model();
        let mut edits = HashMap::new();
        edits.insert(HeaderField::RecordingStart, FieldEdit::anonymize());
        model.apply_header_edits(&edits);

        assert_eq!(model.header().recording_start, anonymized_start_sentinel());
    }

    #[test]
    fn test_set_value_edits() {
        let mut model = empty_model();
        let mut edits = HashMap::new();
        edits.insert(
            HeaderField::Sex,
            FieldEdit::set(FieldValue::Sex(Sex::Male)),
        );
        edits.insert(
            HeaderField::Birthdate,
            FieldEdit {
                value: None,
                anonymize: false,
            },
        );
        model.apply_header_edits(&edits);

        assert_eq!(model.header().sex, Some(Sex::Male));
        assert_eq!(model.header().birthdate, None);
    }

    #[test]
    fn test_header_fields_iterate_in_display_order() {
        let model = empty_model();
        let views: Vec<FieldView> = model.header_fields().collect();
        assert_eq!(views.len(), 10);
        assert_eq!(views[0].field, HeaderField::PatientCode);
        assert_eq!(views[0].label, "Patient code");
        assert_eq!(
            views[0].value,
            Some(FieldValue::Text("P001".to_string()))
        );
        assert_eq!(views[3].kind, FieldKind::Date);
    }

    #[test]
    fn test_annotation_edits_replace_wholesale() {
        let mut model = empty_model();
        model.annotations = vec![
            Annotation {
                onset: 0,
                duration: None,
                text: "keep".to_string(),
            },
            Annotation {
                onset: 10,
                duration: None,
                text: "drop".to_string(),
            },
        ];

        let replacement = vec![Annotation {
            onset: 0,
            duration: None,
            text: "keep (edited)".to_string(),
        }];
        model.apply_annotation_edits(replacement.clone());
        assert_eq!(model.annotations(), replacement.as_slice());
    }
}
