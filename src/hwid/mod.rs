//! Hardware identifiers and the device topology walk that collects them.
//!
//! A device node exposes its identifiers as a multi-string property: a run of
//! NUL-terminated strings closed by an extra NUL. [`build_hardware_id_set`]
//! walks every node reachable from the root through the first-child and
//! next-sibling links and folds all identifiers into one deduplicated set.

#[cfg(windows)]
pub mod cfgmgr;
pub mod sysfs;
pub mod topology;

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::DriverFetchError;

pub use topology::{DeviceTreeProvider, NodeIndex, Topology};

/// A token naming a device class or instance to the driver matching subsystem.
///
/// Equality is exact, case-sensitive string comparison.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HardwareId(String);

impl HardwareId {
    /// Creates a new HardwareId.
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier text.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for HardwareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HardwareId({:?})", self.0)
    }
}

impl fmt::Display for HardwareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for HardwareId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The deduplicated set of identifiers found on a machine.
pub type HardwareIdSet = BTreeSet<HardwareId>;

/// Split a multi-string property into its non-empty parts.
///
/// Empty parts (the terminating NULs, or a zero-length property) contribute
/// nothing. Bytes that are not valid UTF-8 are replaced rather than rejected.
pub fn split_multi_sz(raw: &[u8]) -> Vec<HardwareId> {
    raw.split(|byte| *byte == 0)
        .filter(|part| !part.is_empty())
        .map(|part| HardwareId::new(String::from_utf8_lossy(part).into_owned()))
        .collect()
}

/// Encode identifiers as a multi-string property.
///
/// An empty list encodes to a zero-length property.
pub fn encode_multi_sz<S: AsRef<str>>(ids: &[S]) -> Vec<u8> {
    if ids.is_empty() {
        return Vec::new();
    }

    let mut raw = Vec::with_capacity(ids.iter().map(|id| id.as_ref().len() + 1).sum::<usize>() + 1);
    for id in ids {
        raw.extend_from_slice(id.as_ref().as_bytes());
        raw.push(0);
    }
    raw.push(0);
    raw
}

/// Walk the device topology and collect every hardware identifier.
///
/// Traversal is depth-first pre-order from the root: a node's first child is
/// visited before its next sibling. An explicit stack replaces recursion so
/// deep or very wide topologies cannot exhaust the call stack.
pub fn build_hardware_id_set<P>(provider: &P) -> Result<HardwareIdSet, DriverFetchError>
where
    P: DeviceTreeProvider + ?Sized,
{
    let root = provider
        .locate_root()
        .ok_or(DriverFetchError::RootNotFound)?;

    let mut ids = HardwareIdSet::new();
    let mut pending = vec![root];
    let mut visited = 0usize;

    while let Some(node) = pending.pop() {
        visited += 1;
        ids.extend(read_node_ids(provider, node));

        // Sibling goes on first so the child subtree is drained before it.
        if let Some(sibling) = provider.next_sibling(node) {
            pending.push(sibling);
        }
        if let Some(child) = provider.first_child(node) {
            pending.push(child);
        }
    }

    debug!(nodes = visited, hardware_ids = ids.len(), "device topology walked");
    Ok(ids)
}

fn read_node_ids<P>(provider: &P, node: P::Node) -> Vec<HardwareId>
where
    P: DeviceTreeProvider + ?Sized,
{
    let needed = match provider.hardware_id_property_len(node) {
        Some(0) | None => return Vec::new(),
        Some(needed) => needed,
    };

    let mut buf = vec![0u8; needed];
    match provider.read_hardware_id_property(node, &mut buf) {
        Some(written) => split_multi_sz(&buf[..written.min(needed)]),
        None => {
            trace!(?node, needed, "hardware id property read failed");
            Vec::new()
        }
    }
}

#[cfg(feature = "fuzzing")]
/// Fuzzing entry point for multi-string property decoding.
pub fn fuzz_split_multi_sz(raw: &[u8]) -> usize {
    split_multi_sz(raw).len()
}
