//! Helpers that synthesize small EDF files for doctests and integration
//! tests. Not part of the public API surface.

use std::path::Path;

use chrono::NaiveDate;

use crate::error::Result;
use crate::types::{Annotation, FileVariant, HeaderRecord, Sex, SignalDescriptor};
use crate::writer::write_edf;
use crate::EDF_TIME_DIMENSION;

/// A two-record EDF+ recording with one 16 Hz signal and one annotation.
pub fn create_test_file<P: AsRef<Path>>(path: P) -> Result<()> {
    let header = HeaderRecord {
        variant: FileVariant::EdfPlus,
        patient_code: "P001".to_string(),
        patient_name: "Test_Patient".to_string(),
        patient_additional: String::new(),
        birthdate: NaiveDate::from_ymd_opt(1990, 1, 1),
        sex: Some(Sex::Male),
        admin_code: "A01".to_string(),
        recording_start: NaiveDate::from_ymd_opt(2020, 6, 15)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap(),
        technician: "Tech01".to_string(),
        equipment: "Device01".to_string(),
        recording_additional: String::new(),
        datarecords: 2,
        record_duration: EDF_TIME_DIMENSION,
        signal_count: 2,
    };

    let signal = SignalDescriptor {
        label: "EEG Fp1".to_string(),
        transducer: "AgAgCl".to_string(),
        physical_dimension: "uV".to_string(),
        physical_min: -100.0,
        physical_max: 100.0,
        digital_min: -32768,
        digital_max: 32767,
        prefilter: "HP:0.1Hz".to_string(),
        samples_per_record: 16,
        samples: (0..32).map(|i| i * 100 - 1600).collect(),
    };

    let annotations = vec![Annotation {
        onset: 15_000_000,
        duration: Some(5_000_000),
        text: "Test event".to_string(),
    }];

    write_edf(path, &header, &[signal], &annotations)
}

/// Like [`create_test_file`], but with a non-compliant LPI (the sex token
/// is not one of `M`/`F`/`X`) and an LRI missing its `Startdate` keyword,
/// so the strict fixer rejects both fields.
pub fn create_malformed_test_file<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    create_test_file(path)?;

    let mut bytes = std::fs::read(path)?;
    let lpi = b"John Smith born 02.05.1951";
    bytes[8..88].fill(b' ');
    bytes[8..8 + lpi.len()].copy_from_slice(lpi);
    let lri = b"recorded 15.06.2020 by Tech01";
    bytes[88..168].fill(b' ');
    bytes[88..88 + lri.len()].copy_from_slice(lri);
    std::fs::write(path, bytes)?;

    Ok(())
}
