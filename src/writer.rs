//! One-shot serializer for a complete in-memory recording.
//!
//! Writes an EDF+C file: primary header, per-signal header block with a
//! trailing `EDF Annotations` channel, then the data records. Digital
//! sample values are written back verbatim (little-endian i16), so a
//! read-modify-write cycle that only touches header fields or annotations
//! leaves the signal region bit-identical.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{EdfError, Result};
use crate::header::encode_header;
use crate::types::{Annotation, FileVariant, HeaderRecord, SignalDescriptor};
use crate::utils::fmt_edf_time;
use crate::{
    EDF_ANNOTATIONS_LABEL, EDF_ANNOTATION_BYTES, EDF_HEADER_SIZE, EDF_MAX_ANNOTATION_LEN,
};

/// Serializes header, annotations and unchanged signal payloads to `path`.
///
/// The output is always EDF+ continuous, regardless of the source variant:
/// anonymized copies are normalized on write. Each signal's sample buffer
/// must hold exactly `samples_per_record * datarecords` values.
pub fn write_edf<P: AsRef<Path>>(
    path: P,
    header: &HeaderRecord,
    signals: &[SignalDescriptor],
    annotations: &[Annotation],
) -> Result<()> {
    let datarecords = record_count(header, signals)?;

    for (i, signal) in signals.iter().enumerate() {
        let expected = signal.samples_per_record as usize * datarecords;
        if signal.samples.len() != expected {
            return Err(EdfError::Decode(format!(
                "signal {} has {} samples, expected {}",
                i,
                signal.samples.len(),
                expected
            )));
        }
    }

    let tal_payloads = build_tal_payloads(header, annotations, datarecords);
    let max_payload = tal_payloads.iter().map(Vec::len).max().unwrap_or(0);
    // Round up to an even byte count so the channel holds whole i16 samples
    let annotation_bytes = EDF_ANNOTATION_BYTES.max(max_payload + max_payload % 2);

    let out = HeaderRecord {
        variant: FileVariant::EdfPlus,
        datarecords: datarecords as i64,
        signal_count: signals.len() + 1,
        ..header.clone()
    };

    let file = File::create(&path)
        .map_err(|e| EdfError::FileNotFound(format!("{}: {}", path.as_ref().display(), e)))?;
    let mut writer = BufWriter::new(file);

    writer.write_all(&encode_header(&out))?;
    writer.write_all(&encode_signal_headers(signals, annotation_bytes))?;

    for (record_index, payload) in tal_payloads.iter().enumerate() {
        for signal in signals {
            let spr = signal.samples_per_record as usize;
            let start = record_index * spr;
            for &sample in &signal.samples[start..start + spr] {
                let value = sample.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
                writer.write_all(&value.to_le_bytes())?;
            }
        }

        writer.write_all(payload)?;
        // NUL padding up to the fixed channel width
        let padding = annotation_bytes - payload.len();
        writer.write_all(&vec![0u8; padding])?;
    }

    writer.flush()?;
    Ok(())
}

fn record_count(header: &HeaderRecord, signals: &[SignalDescriptor]) -> Result<usize> {
    match signals.first() {
        Some(signal) => {
            if signal.samples_per_record < 1 {
                return Err(EdfError::Decode(
                    "signal has invalid samples per record".to_string(),
                ));
            }
            Ok(signal.samples.len() / signal.samples_per_record as usize)
        }
        None => Ok(header.datarecords.max(0) as usize),
    }
}

/// Builds the TAL byte payload of every data record.
///
/// Each record opens with its mandatory timestamp TAL; annotations are
/// placed in the record covering their onset, clamped into range so a
/// replacement list never silently loses an entry.
fn build_tal_payloads(
    header: &HeaderRecord,
    annotations: &[Annotation],
    datarecords: usize,
) -> Vec<Vec<u8>> {
    let duration = header.record_duration.max(1);
    let mut payloads: Vec<Vec<u8>> = (0..datarecords)
        .map(|r| {
            let mut tal = Vec::new();
            tal.extend_from_slice(signed_time(r as i64 * duration).as_bytes());
            tal.extend_from_slice(&[0x14, 0x14, 0x00]);
            tal
        })
        .collect();

    if payloads.is_empty() {
        return payloads;
    }

    for annotation in annotations {
        let record_index =
            (annotation.onset.div_euclid(duration)).clamp(0, datarecords as i64 - 1) as usize;
        let tal = &mut payloads[record_index];

        tal.extend_from_slice(signed_time(annotation.onset).as_bytes());
        if let Some(duration_ticks) = annotation.duration {
            tal.push(0x15);
            tal.extend_from_slice(fmt_edf_time(duration_ticks).as_bytes());
        }
        tal.push(0x14);
        tal.extend_from_slice(truncate_text(&annotation.text).as_bytes());
        tal.extend_from_slice(&[0x14, 0x00]);
    }

    payloads
}

/// Onsets carry an explicit sign in TALs; `fmt_edf_time` only emits `-`.
fn signed_time(ticks: i64) -> String {
    if ticks >= 0 {
        format!("+{}", fmt_edf_time(ticks))
    } else {
        fmt_edf_time(ticks)
    }
}

fn truncate_text(text: &str) -> &str {
    if text.len() <= EDF_MAX_ANNOTATION_LEN {
        return text;
    }
    let mut end = EDF_MAX_ANNOTATION_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn write_column(block: &mut [u8], start: usize, width: usize, value: &str) {
    let bytes = value.as_bytes();
    let len = bytes.len().min(width);
    block[start..start + len].copy_from_slice(&bytes[..len]);
}

fn fmt_f64_field(value: f64) -> String {
    let mut s = if value == value.trunc() && value.abs() < 1e7 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    };
    s.truncate(8);
    if s.ends_with('.') {
        s.pop();
    }
    s
}

/// Column-major per-signal header block, annotation channel last.
fn encode_signal_headers(signals: &[SignalDescriptor], annotation_bytes: usize) -> Vec<u8> {
    let count = signals.len() + 1;
    let mut block = vec![b' '; count * EDF_HEADER_SIZE];

    let mut column = |i: usize, value: String, base: usize, width: usize| {
        write_column(&mut block, base * count + i * width, width, &value);
    };

    for (i, signal) in signals.iter().enumerate() {
        column(i, signal.label.clone(), 0, 16);
        column(i, signal.transducer.clone(), 16, 80);
        column(i, signal.physical_dimension.clone(), 96, 8);
        column(i, fmt_f64_field(signal.physical_min), 104, 8);
        column(i, fmt_f64_field(signal.physical_max), 112, 8);
        column(i, signal.digital_min.to_string(), 120, 8);
        column(i, signal.digital_max.to_string(), 128, 8);
        column(i, signal.prefilter.clone(), 136, 80);
        column(i, signal.samples_per_record.to_string(), 216, 8);
        // bytes [224,256) per signal are reserved and stay blank
    }

    let a = signals.len();
    column(a, EDF_ANNOTATIONS_LABEL.to_string(), 0, 16);
    column(a, "-1".to_string(), 104, 8);
    column(a, "1".to_string(), 112, 8);
    column(a, "-32768".to_string(), 120, 8);
    column(a, "32767".to_string(), 128, 8);
    column(a, (annotation_bytes / 2).to_string(), 216, 8);

    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EDF_TIME_DIMENSION;

    #[test]
    fn test_signed_time() {
        assert_eq!(signed_time(0), "+0");
        assert_eq!(signed_time(15_000_000), "+1.5");
        assert_eq!(signed_time(-10_000_000), "-1");
    }

    #[test]
    fn test_fmt_f64_field() {
        assert_eq!(fmt_f64_field(-200.0), "-200");
        assert_eq!(fmt_f64_field(0.5), "0.5");
        assert_eq!(fmt_f64_field(3.1415926535), "3.141592");
    }

    #[test]
    fn test_tal_payload_contains_timestamp_and_event() {
        let header = HeaderRecord {
            variant: FileVariant::EdfPlus,
            patient_code: String::new(),
            patient_name: String::new(),
            patient_additional: String::new(),
            birthdate: None,
            sex: None,
            admin_code: String::new(),
            recording_start: chrono::NaiveDate::from_ymd_opt(2020, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            technician: String::new(),
            equipment: String::new(),
            recording_additional: String::new(),
            datarecords: 2,
            record_duration: EDF_TIME_DIMENSION,
            signal_count: 1,
        };
        let annotations = vec![Annotation {
            onset: 15_000_000,
            duration: Some(5_000_000),
            text: "Spike".to_string(),
        }];

        let payloads = build_tal_payloads(&header, &annotations, 2);
        assert_eq!(payloads.len(), 2);
        assert!(payloads[0].starts_with(b"+0\x14\x14\x00"));
        assert!(payloads[1].starts_with(b"+1\x14\x14\x00"));
        let expected: &[u8] = b"+1.5\x150.5\x14Spike\x14\x00";
        assert!(payloads[1].windows(expected.len()).any(|w| w == expected));
    }
}
