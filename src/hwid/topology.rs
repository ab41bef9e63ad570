//! The device tree provider boundary and an in-memory arena topology.

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::error::DriverFetchError;

use super::encode_multi_sz;

/// Access to the host's device tree.
///
/// Mirrors the platform configuration-manager calls: every query either
/// succeeds or reports failure (`None`). Reading the identifier property is a
/// two-step exchange: ask for the required length, then hand over a buffer of
/// that length.
pub trait DeviceTreeProvider {
    /// Opaque handle to a device node.
    type Node: Copy + fmt::Debug;

    /// Locate the root device node.
    fn locate_root(&self) -> Option<Self::Node>;

    /// Number of bytes needed to hold the node's hardware identifier property.
    fn hardware_id_property_len(&self, node: Self::Node) -> Option<usize>;

    /// Copy the node's hardware identifier property into `buf`.
    ///
    /// Returns the number of bytes written, or `None` if `buf` is too small or
    /// the property cannot be read.
    fn read_hardware_id_property(&self, node: Self::Node, buf: &mut [u8]) -> Option<usize>;

    /// First child of `node`.
    fn first_child(&self, node: Self::Node) -> Option<Self::Node>;

    /// Next sibling of `node`.
    fn next_sibling(&self, node: Self::Node) -> Option<Self::Node>;
}

/// Index of a node inside a [`Topology`] arena.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIndex(usize);

impl fmt::Debug for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeIndex({})", self.0)
    }
}

#[derive(Clone, Debug, Default)]
struct TopologyNode {
    property: Vec<u8>,
    first_child: Option<NodeIndex>,
    last_child: Option<NodeIndex>,
    next_sibling: Option<NodeIndex>,
}

/// A device forest stored as an arena of nodes linked by index.
///
/// Top-level nodes are chained as siblings of the first root, so a walk that
/// starts at [`DeviceTreeProvider::locate_root`] reaches every subtree.
#[derive(Clone, Debug, Default)]
pub struct Topology {
    nodes: Vec<TopologyNode>,
    last_root: Option<NodeIndex>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Append a top-level node with the given identifiers.
    pub fn add_root<S: AsRef<str>>(&mut self, hardware_ids: &[S]) -> NodeIndex {
        let index = self.push_node(hardware_ids);
        if let Some(previous) = self.last_root.replace(index) {
            self.nodes[previous.0].next_sibling = Some(index);
        }
        index
    }

    /// Append a node as the last child of `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` does not belong to this topology.
    pub fn add_child<S: AsRef<str>>(&mut self, parent: NodeIndex, hardware_ids: &[S]) -> NodeIndex {
        assert!(parent.0 < self.nodes.len(), "parent {parent:?} is not in this topology");

        let index = self.push_node(hardware_ids);
        match self.nodes[parent.0].last_child.replace(index) {
            Some(previous) => self.nodes[previous.0].next_sibling = Some(index),
            None => self.nodes[parent.0].first_child = Some(index),
        }
        index
    }

    fn push_node<S: AsRef<str>>(&mut self, hardware_ids: &[S]) -> NodeIndex {
        let index = NodeIndex(self.nodes.len());
        self.nodes.push(TopologyNode {
            property: encode_multi_sz(hardware_ids),
            ..TopologyNode::default()
        });
        index
    }

    /// Parse a JSON snapshot: a list of top-level nodes, each with optional
    /// `hardware_ids` and `children`.
    pub fn from_snapshot_str(input: &str) -> Result<Self, serde_json::Error> {
        let roots: Vec<SnapshotNode> = serde_json::from_str(input)?;
        Ok(Self::from_snapshot_nodes(roots))
    }

    /// Read a JSON snapshot from disk.
    pub fn read_snapshot(path: &Path) -> Result<Self, DriverFetchError> {
        let input = std::fs::read_to_string(path)?;
        Self::from_snapshot_str(&input).map_err(|source| DriverFetchError::TopologySnapshotParse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn from_snapshot_nodes(roots: Vec<SnapshotNode>) -> Self {
        let mut topology = Topology::new();
        let mut pending: Vec<(Option<NodeIndex>, SnapshotNode)> =
            roots.into_iter().rev().map(|node| (None, node)).collect();

        while let Some((parent, node)) = pending.pop() {
            let index = match parent {
                Some(parent) => topology.add_child(parent, node.hardware_ids.as_slice()),
                None => topology.add_root(node.hardware_ids.as_slice()),
            };
            pending.extend(
                node.children
                    .into_iter()
                    .rev()
                    .map(|child| (Some(index), child)),
            );
        }

        topology
    }
}

#[derive(Debug, Deserialize)]
struct SnapshotNode {
    #[serde(default)]
    hardware_ids: Vec<String>,
    #[serde(default)]
    children: Vec<SnapshotNode>,
}

impl DeviceTreeProvider for Topology {
    type Node = NodeIndex;

    fn locate_root(&self) -> Option<NodeIndex> {
        if self.nodes.is_empty() {
            None
        } else {
            Some(NodeIndex(0))
        }
    }

    fn hardware_id_property_len(&self, node: NodeIndex) -> Option<usize> {
        self.nodes.get(node.0).map(|n| n.property.len())
    }

    fn read_hardware_id_property(&self, node: NodeIndex, buf: &mut [u8]) -> Option<usize> {
        let property = &self.nodes.get(node.0)?.property;
        let target = buf.get_mut(..property.len())?;
        target.copy_from_slice(property);
        Some(property.len())
    }

    fn first_child(&self, node: NodeIndex) -> Option<NodeIndex> {
        self.nodes.get(node.0)?.first_child
    }

    fn next_sibling(&self, node: NodeIndex) -> Option<NodeIndex> {
        self.nodes.get(node.0)?.next_sibling
    }
}

#[cfg(feature = "fuzzing")]
/// Fuzzing entry point for topology snapshot parsing.
pub fn fuzz_parse_snapshot(input: &str) -> Result<usize, serde_json::Error> {
    Topology::from_snapshot_str(input).map(|topology| topology.len())
}
