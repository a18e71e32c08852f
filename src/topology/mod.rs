//! Live topology: classification, graph construction and the snapshot cache

pub mod cache;
pub mod classify;
pub mod graph;

pub use cache::{TopologyCache, TopologySnapshot};
pub use classify::{classify_node, classify_tag, classify_tags, Classification};
pub use graph::{build_graph, port_label, TopologyEdge, TopologyGraph, TopologyNode};
