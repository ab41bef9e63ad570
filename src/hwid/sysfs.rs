//! Capture the Linux sysfs device hierarchy as a [`Topology`].
//!
//! Every directory under the device root becomes a node; symlinks are not
//! followed, so the `subsystem`/`driver` back-links cannot introduce cycles.
//! A node's identifiers come from its `modalias` file and the `MODALIAS=`
//! entry of its `uevent` file.

use std::fs;
use std::path::Path;

use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::error::DriverFetchError;

use super::{NodeIndex, Topology};

/// Default location of the device hierarchy.
pub const DEFAULT_SYSFS_ROOT: &str = "/sys/devices";

/// Walk `root` and build a topology mirroring its directory tree.
pub fn capture(root: &Path) -> Result<Topology, DriverFetchError> {
    if !root.is_dir() {
        return Err(DriverFetchError::DeviceTree {
            path: root.to_path_buf(),
            message: "not a directory".to_string(),
        });
    }

    let mut topology = Topology::new();
    let mut ancestors: Vec<NodeIndex> = Vec::new();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!(error = %err, "skipping unreadable sysfs entry");
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }

        let depth = entry.depth();
        ancestors.truncate(depth);
        let hardware_ids = read_device_ids(entry.path());

        let node = if depth == 0 {
            topology.add_root(hardware_ids.as_slice())
        } else {
            match ancestors.get(depth - 1) {
                Some(parent) => topology.add_child(*parent, hardware_ids.as_slice()),
                None => continue,
            }
        };
        ancestors.push(node);
    }

    debug!(root = %root.display(), nodes = topology.len(), "captured sysfs topology");
    Ok(topology)
}

/// Identifiers for one device directory, most specific first, deduplicated.
fn read_device_ids(dir: &Path) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();

    if let Some(modalias) = read_trimmed(&dir.join("modalias")) {
        ids.push(modalias);
    }

    if let Some(uevent) = read_trimmed(&dir.join("uevent")) {
        for value in uevent.lines().filter_map(|line| line.strip_prefix("MODALIAS=")) {
            let value = value.trim();
            if !value.is_empty() && !ids.iter().any(|existing| existing == value) {
                ids.push(value.to_string());
            }
        }
    }

    ids
}

fn read_trimmed(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            let trimmed = contents.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Err(err) => {
            if err.kind() != std::io::ErrorKind::NotFound {
                trace!(path = %path.display(), error = %err, "unreadable device attribute");
            }
            None
        }
    }
}
