//! Per-host diagram layout
//!
//! A host's rows become a small directed graph which is placed with a seeded
//! spring layout, scaled onto the canvas and then relaxed until node
//! rectangles stop overlapping (or the pass cap is hit).

pub mod collision;
pub mod spring;

pub use collision::{count_overlaps, overlaps, resolve_collisions, separation_pass, CollisionOutcome, Footprint};
pub use spring::{spring_layout, to_canvas, SpringParams};

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::config;
use crate::models::AggregatedEdge;

/// Top-left corner of a node rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Tunables for one layout run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConfig {
    pub footprint: Footprint,
    pub spring: SpringParams,
    pub canvas_scale: f64,
    pub canvas_margin: f64,
    pub max_collision_iterations: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            footprint: Footprint {
                width: config::NODE_WIDTH,
                height: config::NODE_HEIGHT,
                padding: config::NODE_PADDING,
            },
            spring: SpringParams {
                k: config::SPRING_K,
                iterations: config::SPRING_ITERATIONS,
                seed: config::SPRING_SEED,
            },
            canvas_scale: config::CANVAS_SCALE,
            canvas_margin: config::CANVAS_MARGIN,
            max_collision_iterations: config::COLLISION_MAX_ITERATIONS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubgraphEdge {
    pub source: usize,
    pub target: usize,
    pub label: String,
}

/// Directed simple graph of one host's connections.
///
/// Nodes keep first-seen order; a repeated `(source, target)` pair keeps
/// the label of the last row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostSubgraph {
    pub host: String,
    nodes: Vec<String>,
    edges: Vec<SubgraphEdge>,
}

/// Diagram edge label: connection type plus the port when known.
pub fn connection_label(row: &AggregatedEdge) -> String {
    match row.key.port {
        Some(port) => format!("{} (port={})", row.key.direction, port),
        None => row.key.direction.to_string(),
    }
}

impl HostSubgraph {
    /// Build from rows whose local host is `host`. Rows touching an excluded
    /// host on either end, or missing a host name, are dropped.
    pub fn from_rows<'a, I>(host: &str, rows: I, excluded: &BTreeSet<String>) -> Self
    where
        I: IntoIterator<Item = &'a AggregatedEdge>,
    {
        let mut nodes: Vec<String> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut edges: Vec<SubgraphEdge> = Vec::new();
        let mut edge_index: HashMap<(usize, usize), usize> = HashMap::new();

        let mut node_id = |name: &str, nodes: &mut Vec<String>| -> usize {
            if let Some(&idx) = index.get(name) {
                return idx;
            }
            nodes.push(name.to_string());
            index.insert(name.to_string(), nodes.len() - 1);
            nodes.len() - 1
        };

        for row in rows {
            if row.key.local_host != host {
                continue;
            }
            let o = row.key.orientation();
            if o.source.is_empty() || o.target.is_empty() {
                continue;
            }
            if excluded.contains(o.source) || excluded.contains(o.target) {
                continue;
            }
            let source = node_id(o.source, &mut nodes);
            let target = node_id(o.target, &mut nodes);
            let label = connection_label(row);
            match edge_index.get(&(source, target)) {
                Some(&existing) => edges[existing].label = label,
                None => {
                    edge_index.insert((source, target), edges.len());
                    edges.push(SubgraphEdge { source, target, label });
                }
            }
        }

        Self {
            host: host.to_string(),
            nodes,
            edges,
        }
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn edges(&self) -> &[SubgraphEdge] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Placed subgraph, ready for rendering. `positions[i]` belongs to node `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagramLayout {
    pub subgraph: HostSubgraph,
    pub positions: Vec<Position>,
    pub collision: CollisionOutcome,
}

/// Run spring placement and collision resolution. `None` for an empty
/// subgraph; no page is drawn for it.
pub fn layout_subgraph(subgraph: HostSubgraph, cfg: &LayoutConfig) -> Option<DiagramLayout> {
    if subgraph.is_empty() {
        return None;
    }

    let springs: Vec<(usize, usize)> = subgraph.edges.iter().map(|e| (e.source, e.target)).collect();
    let unit = spring_layout(subgraph.nodes.len(), &springs, &cfg.spring);
    let canvas = to_canvas(&unit, cfg.canvas_scale, cfg.canvas_margin);
    let (positions, collision) = resolve_collisions(canvas, &cfg.footprint, cfg.max_collision_iterations);

    if !collision.converged {
        tracing::warn!(
            "[LAYOUT] Host '{}': {} overlapping node pairs left after {} passes",
            subgraph.host,
            count_overlaps(&positions, &cfg.footprint),
            collision.iterations
        );
    }

    Some(DiagramLayout {
        subgraph,
        positions,
        collision,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AggregationKey, Direction};
    use chrono::{TimeZone, Utc};

    fn row(direction: Direction, local: &str, remote: &str, port: Option<u16>) -> AggregatedEdge {
        AggregatedEdge::new(
            AggregationKey {
                direction,
                local_host: local.to_string(),
                local_ip: "10.0.0.2".to_string(),
                remote_host: remote.to_string(),
                remote_ip: "10.0.0.9".to_string(),
                port,
            },
            Utc.timestamp_opt(0, 0).unwrap(),
        )
    }

    fn excluded() -> BTreeSet<String> {
        ["Zabbix server".to_string()].into_iter().collect()
    }

    #[test]
    fn test_subgraph_orientation_and_labels() {
        let rows = vec![
            row(Direction::Outgoing, "web1", "db1", Some(5432)),
            row(Direction::Incoming, "web1", "lb1", None),
            row(Direction::Outgoing, "db1", "backup", Some(22)),
        ];
        let sub = HostSubgraph::from_rows("web1", &rows, &excluded());

        assert_eq!(sub.nodes(), ["web1", "db1", "lb1"]);
        assert_eq!(
            sub.edges(),
            [
                SubgraphEdge {
                    source: 0,
                    target: 1,
                    label: "outgoing (port=5432)".to_string()
                },
                SubgraphEdge {
                    source: 2,
                    target: 0,
                    label: "incoming".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_duplicate_pair_keeps_last_label() {
        let rows = vec![
            row(Direction::Outgoing, "web1", "db1", Some(5432)),
            row(Direction::Outgoing, "web1", "db1", Some(6432)),
        ];
        let sub = HostSubgraph::from_rows("web1", &rows, &excluded());
        assert_eq!(sub.edges().len(), 1);
        assert_eq!(sub.edges()[0].label, "outgoing (port=6432)");
    }

    #[test]
    fn test_excluded_hosts_drop_rows() {
        let rows = vec![row(Direction::Incoming, "web1", "Zabbix server", Some(10050))];
        let sub = HostSubgraph::from_rows("web1", &rows, &excluded());
        assert!(sub.is_empty());
        assert!(layout_subgraph(sub, &LayoutConfig::default()).is_none());
    }

    #[test]
    fn test_layout_places_every_node_without_overlap() {
        let rows: Vec<AggregatedEdge> = (0..6)
            .map(|i| row(Direction::Outgoing, "web1", &format!("peer{}", i), Some(443)))
            .collect();
        let cfg = LayoutConfig::default();
        let layout = layout_subgraph(HostSubgraph::from_rows("web1", &rows, &excluded()), &cfg).unwrap();

        assert_eq!(layout.positions.len(), 7);
        assert!(layout.collision.converged);
        assert_eq!(count_overlaps(&layout.positions, &cfg.footprint), 0);
    }

    #[test]
    fn test_layout_is_reproducible() {
        let rows = vec![
            row(Direction::Outgoing, "web1", "db1", Some(5432)),
            row(Direction::Outgoing, "web1", "cache1", Some(6379)),
            row(Direction::Incoming, "web1", "lb1", Some(443)),
        ];
        let cfg = LayoutConfig::default();
        let a = layout_subgraph(HostSubgraph::from_rows("web1", &rows, &excluded()), &cfg).unwrap();
        let b = layout_subgraph(HostSubgraph::from_rows("web1", &rows, &excluded()), &cfg).unwrap();
        assert_eq!(a.positions, b.positions);
    }

    #[test]
    fn test_single_node_lands_on_margin() {
        let rows = vec![row(Direction::Outgoing, "web1", "web1", Some(8080))];
        let layout = layout_subgraph(
            HostSubgraph::from_rows("web1", &rows, &excluded()),
            &LayoutConfig::default(),
        )
        .unwrap();
        assert_eq!(layout.positions, vec![Position::new(50.0, 50.0)]);
    }
}
