#![allow(dead_code)]

use std::collections::BTreeSet;

use driverfetch::hwid::{HardwareId, NodeIndex, Topology};
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// One generated node: an optional parent (by earlier position) and its ids.
#[derive(Clone, Debug)]
pub struct GeneratedNode {
    pub parent: Option<usize>,
    pub hardware_ids: Vec<String>,
}

/// Small alphabet so generated topologies repeat identifiers often.
pub fn arb_hardware_id() -> BoxedStrategy<String> {
    "(PCI|USB|ACPI)\\\\VEN_[0-3](\\\\SUB_[0-1])?".boxed()
}

/// A forest of up to `max_nodes` nodes; each node's parent is an earlier
/// node or none (a new top-level node).
pub fn arb_topology_layout(max_nodes: usize) -> BoxedStrategy<Vec<GeneratedNode>> {
    prop::collection::vec(
        (
            any::<prop::sample::Index>(),
            any::<bool>(),
            prop::collection::vec(arb_hardware_id(), 0..4),
        ),
        1..=max_nodes,
    )
    .prop_map(|raw| {
        raw.into_iter()
            .enumerate()
            .map(|(position, (parent, top_level, hardware_ids))| GeneratedNode {
                parent: if position == 0 || top_level {
                    None
                } else {
                    Some(parent.index(position))
                },
                hardware_ids,
            })
            .collect()
    })
    .boxed()
}

pub fn build_topology(layout: &[GeneratedNode]) -> Topology {
    let mut topology = Topology::new();
    let mut indices: Vec<NodeIndex> = Vec::with_capacity(layout.len());
    for node in layout {
        let index = match node.parent {
            Some(parent) => topology.add_child(indices[parent], node.hardware_ids.as_slice()),
            None => topology.add_root(node.hardware_ids.as_slice()),
        };
        indices.push(index);
    }
    topology
}

pub fn expected_ids(layout: &[GeneratedNode]) -> BTreeSet<HardwareId> {
    layout.iter()
        .flat_map(|node| node.hardware_ids.iter())
        .map(|id| HardwareId::new(id.clone()))
        .collect()
}
