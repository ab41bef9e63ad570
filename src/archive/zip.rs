use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use ::zip::ZipArchive;
use tracing::{debug, warn};

use crate::error::DriverFetchError;

use super::has_suffix_ignore_case;

/// Extract the first member whose name ends with `suffix` into `output_dir`.
///
/// Members are scanned in archive order. Only the matching member is
/// written; it keeps its relative path inside the archive. Members whose
/// names would land outside `output_dir` are skipped.
pub fn extract_descriptor(
    archive_path: &Path,
    suffix: &str,
    output_dir: &Path,
) -> Result<PathBuf, DriverFetchError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file).map_err(|source| archive_error(archive_path, source))?;

    for index in 0..archive.len() {
        let mut member = archive
            .by_index(index)
            .map_err(|source| archive_error(archive_path, source))?;
        if member.is_dir() || !has_suffix_ignore_case(member.name(), suffix) {
            continue;
        }

        let Some(relative) = member.enclosed_name() else {
            warn!(
                archive = %archive_path.display(),
                member = member.name(),
                "skipping member that escapes the extraction directory"
            );
            continue;
        };

        let target = output_dir.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut member, &mut out).map_err(|source| archive_error(archive_path, source))?;

        debug!(member = member.name(), path = %target.display(), "extracted descriptor");
        return Ok(target);
    }

    Err(archive_error(
        archive_path,
        format!("no member ending in '{suffix}'"),
    ))
}

fn archive_error(path: &Path, message: impl ToString) -> DriverFetchError {
    DriverFetchError::Archive {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}
