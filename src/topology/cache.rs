//! Process-wide holder of the latest topology snapshot
//!
//! Writers build a complete snapshot off to the side and publish it with one
//! pointer swap. Readers get an `Arc` to whichever snapshot was current and
//! never observe a partially built graph.

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::graph::TopologyGraph;
use crate::ingest::IngestStats;

/// One published graph with its provenance.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TopologySnapshot {
    pub graph: TopologyGraph,
    /// `None` until the first successful refresh.
    pub refreshed_at: Option<DateTime<Utc>>,
    pub stats: IngestStats,
}

#[derive(Clone)]
pub struct TopologyCache {
    current: Arc<ArcSwap<TopologySnapshot>>,
}

impl Default for TopologyCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TopologyCache {
    pub fn new() -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(TopologySnapshot::default())),
        }
    }

    /// The last complete snapshot. Never blocks on a running refresh.
    pub fn snapshot(&self) -> Arc<TopologySnapshot> {
        self.current.load_full()
    }

    /// Replace the current snapshot wholesale.
    pub fn publish(&self, snapshot: TopologySnapshot) {
        self.current.store(Arc::new(snapshot));
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.current.load().refreshed_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityMap;
    use crate::models::{AggregatedEdge, AggregationKey, Direction};
    use crate::network::PrivateRanges;
    use crate::topology::build_graph;
    use chrono::TimeZone;

    fn graph_with_fanout(n: usize) -> TopologyGraph {
        let rows: Vec<AggregatedEdge> = (0..n)
            .map(|i| {
                AggregatedEdge::new(
                    AggregationKey {
                        direction: Direction::Outgoing,
                        local_host: "hub".to_string(),
                        local_ip: "10.0.0.1".to_string(),
                        remote_host: format!("leaf{}", i),
                        remote_ip: format!("10.0.1.{}", i),
                        port: Some(443),
                    },
                    Utc.timestamp_opt(0, 0).unwrap(),
                )
            })
            .collect();
        build_graph(&rows, &IdentityMap::default(), &PrivateRanges::default())
    }

    #[test]
    fn test_empty_before_first_publish() {
        let cache = TopologyCache::new();
        assert!(cache.snapshot().graph.is_empty());
        assert!(cache.last_updated().is_none());
    }

    #[test]
    fn test_old_snapshot_survives_publish() {
        let cache = TopologyCache::new();
        cache.publish(TopologySnapshot {
            graph: graph_with_fanout(2),
            refreshed_at: Some(Utc.timestamp_opt(10, 0).unwrap()),
            stats: IngestStats::default(),
        });
        let held = cache.snapshot();

        cache.publish(TopologySnapshot {
            graph: graph_with_fanout(5),
            refreshed_at: Some(Utc.timestamp_opt(20, 0).unwrap()),
            stats: IngestStats::default(),
        });

        assert_eq!(held.graph.edges().len(), 2);
        assert_eq!(cache.snapshot().graph.edges().len(), 5);
        assert_eq!(cache.last_updated(), Some(Utc.timestamp_opt(20, 0).unwrap()));
    }

    #[test]
    fn test_concurrent_readers_see_whole_snapshots() {
        let cache = TopologyCache::new();
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        let snap = cache.snapshot();
                        // Each published graph is a hub with `edges` leaves.
                        let edges = snap.graph.edges().len();
                        let nodes = snap.graph.nodes().len();
                        assert!((edges == 0 && nodes == 0) || nodes == edges + 1);
                    }
                })
            })
            .collect();

        for n in 1..50 {
            cache.publish(TopologySnapshot {
                graph: graph_with_fanout(n),
                refreshed_at: Some(Utc::now()),
                stats: IngestStats::default(),
            });
        }

        for reader in readers {
            reader.join().unwrap();
        }
    }
}
