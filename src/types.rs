use chrono::{NaiveDate, NaiveDateTime};

/// Biological sex as stored in the EDF+ local patient information field.
///
/// An unknown or anonymized sex is represented as `Option<Sex>::None` and
/// serializes to the `X` placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub fn from_token(token: &str) -> Option<Sex> {
        match token.to_ascii_lowercase().as_str() {
            "m" => Some(Sex::Male),
            "f" => Some(Sex::Female),
            _ => None,
        }
    }

    pub fn as_edf_token(self) -> &'static str {
        match self {
            Sex::Male => "M",
            Sex::Female => "F",
        }
    }
}

/// File variant declared by the reserved tag at header bytes [192,236).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileVariant {
    /// Legacy EDF: the patient and recording fields are free text.
    Edf,
    /// EDF+ continuous recording (`EDF+C`): the patient and recording
    /// fields follow the mandated subfield grammar.
    EdfPlus,
}

/// Structured view of one recording's primary header.
///
/// Produced by [`crate::header::decode_header`] and consumed byte-for-byte
/// by [`crate::header::encode_header`]. For legacy EDF files the free-text
/// patient/recording notes are mapped onto `patient_additional` and
/// `recording_additional` so downstream logic is format-agnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderRecord {
    pub variant: FileVariant,
    pub patient_code: String,
    pub patient_name: String,
    pub patient_additional: String,
    pub birthdate: Option<NaiveDate>,
    pub sex: Option<Sex>,
    pub admin_code: String,
    pub recording_start: NaiveDateTime,
    pub technician: String,
    pub equipment: String,
    pub recording_additional: String,
    /// Number of data records in the file (-1 when unknown).
    pub datarecords: i64,
    /// Duration of one data record in 100 ns units.
    pub record_duration: i64,
    /// Total signal count including any annotation channels.
    pub signal_count: usize,
}

/// Per-channel metadata plus the owned digital sample buffer.
///
/// The sample buffer is an opaque payload: the library never transforms
/// sample values, it only carries them from a parsed source file to a
/// re-serialized output file bit-for-bit.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalDescriptor {
    pub label: String,
    pub transducer: String,
    pub physical_dimension: String,
    pub physical_min: f64,
    pub physical_max: f64,
    pub digital_min: i32,
    pub digital_max: i32,
    pub prefilter: String,
    pub samples_per_record: i32,
    /// Raw digital samples in file order, one entry per stored i16.
    pub samples: Vec<i32>,
}

/// One entry of the EDF Annotations channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Onset relative to recording start, in 100 ns units.
    pub onset: i64,
    /// Event duration in 100 ns units, `None` for instantaneous events.
    pub duration: Option<i64>,
    pub text: String,
}

/// The closed set of editable header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderField {
    PatientCode,
    PatientName,
    PatientAdditional,
    Birthdate,
    Sex,
    AdminCode,
    RecordingStart,
    Technician,
    Equipment,
    RecordingAdditional,
}

/// Value/validation category of a header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Date,
    DateTime,
    Sex,
}

impl HeaderField {
    /// All editable fields, in display order.
    pub const ALL: [HeaderField; 10] = [
        HeaderField::PatientCode,
        HeaderField::PatientName,
        HeaderField::PatientAdditional,
        HeaderField::Birthdate,
        HeaderField::Sex,
        HeaderField::AdminCode,
        HeaderField::RecordingStart,
        HeaderField::Technician,
        HeaderField::Equipment,
        HeaderField::RecordingAdditional,
    ];

    pub fn kind(self) -> FieldKind {
        match self {
            HeaderField::Birthdate => FieldKind::Date,
            HeaderField::RecordingStart => FieldKind::DateTime,
            HeaderField::Sex => FieldKind::Sex,
            _ => FieldKind::Text,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            HeaderField::PatientCode => "Patient code",
            HeaderField::PatientName => "Patient name",
            HeaderField::PatientAdditional => "Patient info",
            HeaderField::Birthdate => "Birthdate",
            HeaderField::Sex => "Sex",
            HeaderField::AdminCode => "Admin code",
            HeaderField::RecordingStart => "Recording date",
            HeaderField::Technician => "Technician",
            HeaderField::Equipment => "Equipment",
            HeaderField::RecordingAdditional => "Recording info",
        }
    }
}

/// Typed value of a header field, matching its [`FieldKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Sex(Sex),
}

/// One requested edit of a header field.
///
/// `anonymize` wins over `value`: when set, the stored value is cleared
/// regardless of what `value` contains.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEdit {
    pub value: Option<FieldValue>,
    pub anonymize: bool,
}

impl FieldEdit {
    pub fn anonymize() -> Self {
        FieldEdit { value: None, anonymize: true }
    }

    pub fn set(value: FieldValue) -> Self {
        FieldEdit { value: Some(value), anonymize: false }
    }
}

/// Fields anonymized by default when an editor session opens.
pub const DEFAULT_ANONYMIZED_FIELDS: [HeaderField; 5] = [
    HeaderField::PatientCode,
    HeaderField::PatientName,
    HeaderField::PatientAdditional,
    HeaderField::AdminCode,
    HeaderField::Technician,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sex_tokens() {
        assert_eq!(Sex::from_token("m"), Some(Sex::Male));
        assert_eq!(Sex::from_token("F"), Some(Sex::Female));
        assert_eq!(Sex::from_token("x"), None);
        assert_eq!(Sex::from_token("male"), None);
        assert_eq!(Sex::Male.as_edf_token(), "M");
    }

    #[test]
    fn test_field_kinds_are_closed() {
        for field in HeaderField::ALL {
            match field.kind() {
                FieldKind::Date => assert_eq!(field, HeaderField::Birthdate),
                FieldKind::DateTime => assert_eq!(field, HeaderField::RecordingStart),
                FieldKind::Sex => assert_eq!(field, HeaderField::Sex),
                FieldKind::Text => {}
            }
            assert!(!field.label().is_empty());
        }
    }
}
