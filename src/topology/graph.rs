//! Live topology graph
//!
//! Built wholesale from aggregated rows; never mutated after construction.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::classify::{classify_node, Classification};
use crate::identity::IdentityMap;
use crate::models::AggregatedEdge;
use crate::network::PrivateRanges;

/// A host in the live graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopologyNode {
    pub id: String,
    pub label: String,
    pub degree: usize,
    pub ip: Option<String>,
    pub classification: Classification,
    pub color: String,
}

/// An observed, oriented connection between two hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopologyEdge {
    pub source: String,
    pub target: String,
    pub port: Option<u16>,
    pub label: String,
    pub is_public: bool,
    pub src_ip: Option<String>,
    pub dst_ip: Option<String>,
}

/// Immutable graph value. Nodes are exactly the edge endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TopologyGraph {
    nodes: Vec<TopologyNode>,
    edges: Vec<TopologyEdge>,
}

impl TopologyGraph {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[TopologyNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[TopologyEdge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&TopologyNode> {
        self.nodes
            .binary_search_by(|n| n.id.as_str().cmp(id))
            .ok()
            .map(|idx| &self.nodes[idx])
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Edge label for the live map.
pub fn port_label(port: Option<u16>) -> String {
    port.map(|p| format!("port {}", p)).unwrap_or_default()
}

/// Build the live graph from one window of aggregated rows.
pub fn build_graph(
    rows: &[AggregatedEdge],
    identity: &IdentityMap,
    ranges: &PrivateRanges,
) -> TopologyGraph {
    // (source, target, port, is_public); ordered for deterministic output
    let mut edge_keys: BTreeSet<(String, String, Option<u16>, bool)> = BTreeSet::new();

    for row in rows {
        let key = &row.key;
        if key.local_ip.is_empty() || key.remote_ip.is_empty() {
            continue;
        }
        let o = key.orientation();
        if o.source.is_empty() || o.target.is_empty() {
            continue;
        }
        let is_public = ranges.is_public_ip(&key.remote_ip);
        edge_keys.insert((o.source.to_string(), o.target.to_string(), key.port, is_public));
    }

    let mut degree: BTreeMap<&str, usize> = BTreeMap::new();
    for (source, target, _, _) in &edge_keys {
        *degree.entry(source.as_str()).or_insert(0) += 1;
        *degree.entry(target.as_str()).or_insert(0) += 1;
    }

    let nodes: Vec<TopologyNode> = degree
        .iter()
        .map(|(id, degree)| {
            let ip = identity.representative_ip(id);
            let classification = classify_node(ip.as_deref(), identity.role_tags(id), ranges);
            let label = match &ip {
                Some(ip) if ip != id => format!("{} ({})", id, ip),
                _ => id.to_string(),
            };
            TopologyNode {
                id: id.to_string(),
                label,
                degree: *degree,
                ip,
                classification,
                color: classification.color().to_string(),
            }
        })
        .collect();

    let edges: Vec<TopologyEdge> = edge_keys
        .iter()
        .map(|(source, target, port, is_public)| TopologyEdge {
            source: source.clone(),
            target: target.clone(),
            port: *port,
            label: port_label(*port),
            is_public: *is_public,
            src_ip: identity.representative_ip(source),
            dst_ip: identity.representative_ip(target),
        })
        .collect();

    tracing::debug!(
        "[TOPOLOGY] Graph built: {} nodes, {} edges from {} rows",
        nodes.len(),
        edges.len(),
        rows.len()
    );

    TopologyGraph { nodes, edges }
}
