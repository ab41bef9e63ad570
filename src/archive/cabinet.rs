use std::path::{Component, Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::config::DriverFetchConfig;
use crate::error::DriverFetchError;
use crate::hwid::HardwareId;
use crate::tool::ToolRunner;

use super::has_suffix_ignore_case;

/// Run the extraction tool on a cabinet and locate the descriptor it produced.
///
/// Success of the tool is judged by a zero exit code only. The descriptor is
/// then looked up in `output_dir`: `<hardware id><suffix>` if the catalog
/// followed that naming, otherwise the first file (sorted path order) with
/// the descriptor suffix.
pub fn extract_descriptor(
    archive_path: &Path,
    hardware_id: &HardwareId,
    output_dir: &Path,
    config: &DriverFetchConfig,
    tools: &dyn ToolRunner,
) -> Result<PathBuf, DriverFetchError> {
    let archive_arg = archive_path.display().to_string();
    let output_arg = output_dir.display().to_string();
    let args = config.extractor.render_args(&[
        ("archive", archive_arg.as_str()),
        ("output_dir", output_arg.as_str()),
        ("hardware_id", hardware_id.as_str()),
    ]);

    let exit = tools.run(&config.extractor.program, &args)?;
    if !exit.is(0) {
        return Err(DriverFetchError::Archive {
            path: archive_path.to_path_buf(),
            message: format!(
                "{} exited with {}",
                config.extractor.program,
                exit.code
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| "a signal".to_string())
            ),
        });
    }

    find_descriptor(output_dir, hardware_id, &config.descriptor_suffix).ok_or_else(|| {
        DriverFetchError::Archive {
            path: archive_path.to_path_buf(),
            message: format!(
                "no '{}' file in {} after extraction",
                config.descriptor_suffix,
                output_dir.display()
            ),
        }
    })
}

/// Locate the descriptor among extracted files.
pub fn find_descriptor(output_dir: &Path, hardware_id: &HardwareId, suffix: &str) -> Option<PathBuf> {
    if let Some(named) = named_descriptor(output_dir, hardware_id, suffix) {
        if named.is_file() {
            return Some(named);
        }
    }

    let found = WalkDir::new(output_dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .find(|entry| has_suffix_ignore_case(&entry.file_name().to_string_lossy(), suffix))
        .map(|entry| entry.into_path());

    if let Some(path) = &found {
        debug!(path = %path.display(), "descriptor found by content scan");
    }
    found
}

/// `<output_dir>/<hardware id><suffix>`, if that name is a single plain
/// file name. Identifiers with separators or `..` never name a file here.
fn named_descriptor(output_dir: &Path, hardware_id: &HardwareId, suffix: &str) -> Option<PathBuf> {
    let name = format!("{hardware_id}{suffix}");
    let mut components = Path::new(&name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(file_name)), None) => Some(output_dir.join(file_name)),
        _ => None,
    }
}
