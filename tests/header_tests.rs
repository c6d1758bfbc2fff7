use anonymedf::doctest_utils::create_test_file;
use anonymedf::header::{decode_header, encode_header};
use anonymedf::{EdfReader, FileVariant, Sex, EDF_TIME_DIMENSION};
use chrono::NaiveDate;

#[test]
fn test_written_file_round_trips_header_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recording.edf");
    create_test_file(&path).unwrap();

    let reader = EdfReader::open(&path).unwrap();
    let header = reader.header();

    assert_eq!(header.variant, FileVariant::EdfPlus);
    assert_eq!(header.patient_code, "P001");
    assert_eq!(header.patient_name, "Test_Patient");
    assert_eq!(header.sex, Some(Sex::Male));
    assert_eq!(header.birthdate, NaiveDate::from_ymd_opt(1990, 1, 1));
    assert_eq!(header.admin_code, "A01");
    assert_eq!(header.technician, "Tech01");
    assert_eq!(header.equipment, "Device01");
    assert_eq!(
        header.recording_start,
        NaiveDate::from_ymd_opt(2020, 6, 15)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    );
    assert_eq!(header.datarecords, 2);
    assert_eq!(header.record_duration, EDF_TIME_DIMENSION);
}

#[test]
fn test_decode_encode_decode_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recording.edf");
    create_test_file(&path).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let first = decode_header(&bytes[..256]).unwrap();
    let second = decode_header(&encode_header(&first)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_annotations_are_read_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recording.edf");
    create_test_file(&path).unwrap();

    let reader = EdfReader::open(&path).unwrap();
    let annotations = reader.annotations();
    assert_eq!(annotations.len(), 1);
    assert_eq!(annotations[0].onset, 15_000_000);
    assert_eq!(annotations[0].duration, Some(5_000_000));
    assert_eq!(annotations[0].text, "Test event");
}

#[test]
fn test_signal_samples_are_loaded_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recording.edf");
    create_test_file(&path).unwrap();

    let reader = EdfReader::open(&path).unwrap();
    let signals = reader.signals();
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].label, "EEG Fp1");
    let expected: Vec<i32> = (0..32).map(|i| i * 100 - 1600).collect();
    assert_eq!(signals[0].samples, expected);
}

#[test]
fn test_open_rejects_non_edf_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("not_edf.edf");
    std::fs::write(&path, vec![0x42u8; 1024]).unwrap();

    assert!(EdfReader::open(&path).is_err());
    assert!(EdfReader::open(dir.path().join("missing.edf")).is_err());
}
