//! File-level repair pipeline.
//!
//! Reads only the header of the source, repairs it, byte-copies the whole
//! file and patches the header bytes of the copy. The source is never
//! modified, outputs are never overwritten, and a patched file that fails
//! re-validation is removed again: the pipeline never leaves behind a
//! file it cannot itself re-parse.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::{EdfError, Result};
use crate::fixer::fix_edfplus_header;
use crate::reader::EdfReader;
use crate::EDF_HEADER_SIZE;

/// Derives a sibling path `<stem>_<suffix>.<ext>`, disambiguated with a
/// numeric counter (`_2`, `_3`, ...) if that name already exists. This
/// never-overwrite rule is the pipeline's only concurrency-avoidance
/// mechanism; it does not guard against another process racing for the
/// same destination name.
pub fn derive_output_path(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "edf".to_string());

    let mut candidate = path.with_file_name(format!("{}_{}.{}", stem, suffix, extension));
    let mut n = 2;
    while candidate.exists() {
        candidate = path.with_file_name(format!("{}_{}_{}.{}", stem, suffix, n, extension));
        n += 1;
    }
    candidate
}

/// Default output name for an anonymized copy, e.g. `rec_anonymized.edf`.
pub fn anonymized_output_path(path: &Path) -> PathBuf {
    derive_output_path(path, "anonymized")
}

/// Tries to fix a non-compliant EDF(+) file.
///
/// Only the first 256 bytes of the source are read for the repair; the
/// rest of the file is copied untouched. With `verify` set, the patched
/// output must survive a full structural re-parse or it is deleted and
/// [`EdfError::Repair`] is returned.
///
/// Returns the path of the repaired copy.
///
/// ```rust
/// use anonymedf::repair::fix_edf_file;
///
/// # anonymedf::doctest_utils::create_malformed_test_file("repair_doc.edf")?;
/// let fixed = fix_edf_file("repair_doc.edf", None, true)?;
/// assert!(fixed.ends_with("repair_doc_fixed.edf"));
/// # std::fs::remove_file("repair_doc.edf").ok();
/// # std::fs::remove_file(&fixed).ok();
/// # Ok::<(), anonymedf::EdfError>(())
/// ```
pub fn fix_edf_file<P: AsRef<Path>>(
    path: P,
    output_path: Option<PathBuf>,
    verify: bool,
) -> Result<PathBuf> {
    let path = path.as_ref();
    let output_path = output_path.unwrap_or_else(|| derive_output_path(path, "fixed"));

    let mut header = vec![0u8; EDF_HEADER_SIZE];
    {
        let mut file = File::open(path)
            .map_err(|e| EdfError::FileNotFound(format!("{}: {}", path.display(), e)))?;
        file.read_exact(&mut header)?;
    }

    let fixed_header = fix_edfplus_header(&header)?;
    debug!("repaired header for {}", path.display());

    fs::copy(path, &output_path)?;
    {
        let mut file = OpenOptions::new().write(true).open(&output_path)?;
        file.write_all(&fixed_header)?;
    }

    if verify {
        if let Err(err) = EdfReader::open(&output_path) {
            warn!(
                "repaired file {} failed re-validation: {}",
                output_path.display(),
                err
            );
            fs::remove_file(&output_path).ok();
            return Err(EdfError::Repair(format!(
                "repaired file does not re-parse: {}",
                err
            )));
        }
    }

    Ok(output_path)
}
