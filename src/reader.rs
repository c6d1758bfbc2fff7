//! Structural reader: parses a whole EDF(+) file into memory.
//!
//! Unlike a streaming reader, the whole recording is loaded up front:
//! header, per-signal headers, every digital sample and the annotation
//! channel. An edit session owns the complete in-memory representation and
//! re-serializes it exactly once.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{EdfError, Result};
use crate::header::decode_header;
use crate::types::{Annotation, HeaderRecord, SignalDescriptor};
use crate::utils::{atof_nonlocalized, atoi_nonlocalized, parse_edf_time};
use crate::{EDF_ANNOTATIONS_LABEL, EDF_HEADER_SIZE};

/// Reads an EDF or EDF+C file completely into memory.
///
/// ```rust
/// use anonymedf::EdfReader;
///
/// # anonymedf::doctest_utils::create_test_file("reader_doc.edf")?;
/// let reader = EdfReader::open("reader_doc.edf")?;
/// println!("signals: {}", reader.signals().len());
/// println!("annotations: {}", reader.annotations().len());
/// # std::fs::remove_file("reader_doc.edf").ok();
/// # Ok::<(), anonymedf::EdfError>(())
/// ```
pub struct EdfReader {
    header: HeaderRecord,
    signals: Vec<SignalDescriptor>,
    annotations: Vec<Annotation>,
}

/// Layout of one channel inside a data record, annotation channels included.
#[derive(Debug, Clone)]
struct ChannelLayout {
    samples_per_record: usize,
    is_annotation: bool,
    /// Index into the ordinary-signal list, None for annotation channels.
    signal_index: Option<usize>,
}

impl EdfReader {
    /// Opens and fully parses an EDF(+) file.
    ///
    /// # Errors
    ///
    /// * [`EdfError::FileNotFound`] - the file cannot be opened
    /// * [`EdfError::Decode`] / [`EdfError::Encoding`] - the header cannot
    ///   be interpreted as EDF(+) structure or text
    /// * [`EdfError::UnsupportedFileType`] - not EDF, or discontinuous EDF+D
    /// * [`EdfError::Io`] - the sample region is truncated or unreadable
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)
            .map_err(|e| EdfError::FileNotFound(format!("{}: {}", path.as_ref().display(), e)))?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let mut main_header = vec![0u8; EDF_HEADER_SIZE];
        reader.read_exact(&mut main_header)?;
        let mut header = decode_header(&main_header)?;

        let mut signal_header = vec![0u8; header.signal_count * EDF_HEADER_SIZE];
        reader.read_exact(&mut signal_header)?;

        let (mut signals, layout) = Self::parse_signal_headers(&signal_header, header.signal_count)?;

        let record_size: usize = layout.iter().map(|l| l.samples_per_record * 2).sum();
        if record_size == 0 {
            return Err(EdfError::Decode("empty data records".to_string()));
        }

        // The record count field may be -1 (unknown); derive it from the
        // file length in that case
        if header.datarecords < 0 {
            let data_bytes = file_len.saturating_sub(((header.signal_count + 1) * EDF_HEADER_SIZE) as u64);
            header.datarecords = (data_bytes / record_size as u64) as i64;
        }

        for entry in &layout {
            if let Some(idx) = entry.signal_index {
                signals[idx]
                    .samples
                    .reserve(entry.samples_per_record * header.datarecords as usize);
            }
        }

        let mut annotations = Vec::new();
        let mut record_buf = vec![0u8; record_size];

        for _ in 0..header.datarecords {
            reader.read_exact(&mut record_buf)?;

            let mut offset = 0;
            for entry in &layout {
                let bytes = &record_buf[offset..offset + entry.samples_per_record * 2];
                offset += entry.samples_per_record * 2;

                if entry.is_annotation {
                    parse_annotation_block(bytes, &mut annotations)?;
                } else if let Some(idx) = entry.signal_index {
                    let signal = &mut signals[idx];
                    // Raw i16 values kept verbatim so a later write is
                    // bit-identical, no digital-range clamping
                    signal.samples.extend(
                        bytes
                            .chunks_exact(2)
                            .map(|b| i16::from_le_bytes([b[0], b[1]]) as i32),
                    );
                }
            }
        }

        Ok(EdfReader {
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

    /// Decomposes the reader into its owned parts.
    pub fn into_parts(self) -> (HeaderRecord, Vec<SignalDescriptor>, Vec<Annotation>) {
        (self.header, self.signals, self.annotations)
    }

    /// Parses the per-signal header block (column-major fixed-width fields).
    fn parse_signal_headers(
        block: &[u8],
        count: usize,
    ) -> Result<(Vec<SignalDescriptor>, Vec<ChannelLayout>)> {
        let mut signals = Vec::new();
        let mut layout = Vec::new();

        let text_at = |start: usize, width: usize| -> String {
            String::from_utf8_lossy(&block[start..start + width])
                .trim()
                .to_string()
        };

        for i in 0..count {
            let label = text_at(i * 16, 16);
            let is_annotation = label == EDF_ANNOTATIONS_LABEL;

            let transducer = text_at(count * 16 + i * 80, 80);
            let physical_dimension = text_at(count * 96 + i * 8, 8);
            let physical_min = atof_nonlocalized(&text_at(count * 104 + i * 8, 8));
            let physical_max = atof_nonlocalized(&text_at(count * 112 + i * 8, 8));
            let digital_min = atoi_nonlocalized(&text_at(count * 120 + i * 8, 8));
            let digital_max = atoi_nonlocalized(&text_at(count * 128 + i * 8, 8));
            let prefilter = text_at(count * 136 + i * 80, 80);
            let samples_per_record = atoi_nonlocalized(&text_at(count * 216 + i * 8, 8));

            if samples_per_record < 1 {
                return Err(EdfError::Decode(format!(
                    "signal {} has invalid samples per record: {}",
                    i, samples_per_record
                )));
            }

            if is_annotation {
                layout.push(ChannelLayout {
                    samples_per_record: samples_per_record as usize,
                    is_annotation: true,
                    signal_index: None,
                });
                continue;
            }

            if physical_min == physical_max {
                return Err(EdfError::Decode(format!(
                    "signal {} physical min equals max",
                    i
                )));
            }
            if digital_min == digital_max {
                return Err(EdfError::Decode(format!(
                    "signal {} digital min equals max",
                    i
                )));
            }

            layout.push(ChannelLayout {
                samples_per_record: samples_per_record as usize,
                is_annotation: false,
                signal_index: Some(signals.len()),
            });

            signals.push(SignalDescriptor {
                label,
                transducer,
                physical_dimension,
                physical_min,
                physical_max,
                digital_min,
                digital_max,
                prefilter,
                samples_per_record,
                samples: Vec::new(),
            });
        }

        Ok((signals, layout))
    }
}

/// Parses the TAL (time-stamped annotations list) bytes of one record.
///
/// TALs are NUL-separated; each starts with `onset[<0x15>duration]` and
/// carries its texts between 0x14 separators. Record-keeping timestamp
/// TALs have no text and are skipped.
fn parse_annotation_block(block: &[u8], annotations: &mut Vec<Annotation>) -> Result<()> {
    for tal in block.split(|&b| b == 0).filter(|t| !t.is_empty()) {
        let mut parts = tal.split(|&b| b == 0x14);

        let timing = String::from_utf8_lossy(parts.next().unwrap_or(&[])).into_owned();
        let (onset_str, duration_str) = match timing.split_once('\u{15}') {
            Some((onset, duration)) => (onset.to_string(), Some(duration.to_string())),
            None => (timing, None),
        };

        let onset = parse_edf_time(&onset_str)?;
        let duration = match duration_str.as_deref() {
            Some(d) if !d.trim().is_empty() => Some(parse_edf_time(d)?),
            _ => None,
        };

        for text in parts {
            let text = String::from_utf8_lossy(text).trim().to_string();
            if text.is_empty() {
                continue;
            }
            annotations.push(Annotation {
                onset,
                duration,
                text,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_annotation_block() {
        let mut annotations = Vec::new();
        // timestamp TAL, then an event with duration, then one without
        let block = b"+1\x14\x14\x00+1.5\x150.5\x14Eyes closed\x14\x00+1.75\x14Spike\x14\x00";
        parse_annotation_block(block, &mut annotations).unwrap();

        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[0].onset, 15_000_000);
        assert_eq!(annotations[0].duration, Some(5_000_000));
        assert_eq!(annotations[0].text, "Eyes closed");
        assert_eq!(annotations[1].onset, 17_500_000);
        assert_eq!(annotations[1].duration, None);
        assert_eq!(annotations[1].text, "Spike");
    }

    #[test]
    fn test_parse_annotation_block_skips_padding() {
        let mut annotations = Vec::new();
        let mut block = b"+0\x14\x14\x00".to_vec();
        block.resize(120, 0);
        parse_annotation_block(&block, &mut annotations).unwrap();
        assert!(annotations.is_empty());
    }
}
