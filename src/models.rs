//! Data models for the network map engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which side initiated a connection, as seen from the reporting host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Incoming => "incoming",
            Direction::Outgoing => "outgoing",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parsed sighting of a single connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionObservation {
    pub direction: Direction,
    pub local_ip: String,
    pub remote_ip: String,
    pub local_port: Option<u16>,
    pub remote_port: Option<u16>,
    pub observed_at: DateTime<Utc>,
}

impl ConnectionObservation {
    /// The service port: local for incoming, remote for outgoing.
    pub fn service_port(&self) -> Option<u16> {
        match self.direction {
            Direction::Incoming => self.local_port,
            Direction::Outgoing => self.remote_port,
        }
    }
}

/// Identity of one logical connection. Equal keys merge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AggregationKey {
    #[serde(rename = "type")]
    pub direction: Direction,
    pub local_host: String,
    pub local_ip: String,
    pub remote_host: String,
    pub remote_ip: String,
    pub port: Option<u16>,
}

/// Endpoints of a key oriented along the traffic direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Orientation<'a> {
    pub source: &'a str,
    pub source_ip: &'a str,
    pub target: &'a str,
    pub target_ip: &'a str,
}

impl AggregationKey {
    /// Incoming points remote -> local, outgoing points local -> remote.
    pub fn orientation(&self) -> Orientation<'_> {
        match self.direction {
            Direction::Outgoing => Orientation {
                source: &self.local_host,
                source_ip: &self.local_ip,
                target: &self.remote_host,
                target_ip: &self.remote_ip,
            },
            Direction::Incoming => Orientation {
                source: &self.remote_host,
                source_ip: &self.remote_ip,
                target: &self.local_host,
                target_ip: &self.local_ip,
            },
        }
    }

    /// Port as display text, empty when unknown.
    pub fn port_text(&self) -> String {
        self.port.map(|p| p.to_string()).unwrap_or_default()
    }
}

/// A deduplicated, counted connection row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedEdge {
    #[serde(flatten)]
    pub key: AggregationKey,
    pub count: u64,
    #[serde(rename = "timestamp")]
    pub latest_seen_at: DateTime<Utc>,
}

impl AggregatedEdge {
    pub fn new(key: AggregationKey, observed_at: DateTime<Utc>) -> Self {
        Self {
            key,
            count: 1,
            latest_seen_at: observed_at,
        }
    }

    /// Fold one more sighting into this row.
    pub fn record(&mut self, observed_at: DateTime<Utc>) {
        self.count += 1;
        self.latest_seen_at = self.latest_seen_at.max(observed_at);
    }

    /// Combine two partial aggregates of the same key.
    pub fn absorb(&mut self, other: &AggregatedEdge) {
        debug_assert_eq!(self.key, other.key);
        self.count += other.count;
        self.latest_seen_at = self.latest_seen_at.max(other.latest_seen_at);
    }
}

/// A telemetry item carrying connection snapshots for one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryItem {
    pub item_id: String,
    pub host_name: String,
}

/// One timestamped text entry from an item's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryEntry {
    pub timestamp: DateTime<Utc>,
    pub payload: String,
}

/// A monitored host and its interface addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryHost {
    pub name: String,
    #[serde(default)]
    pub interface_ips: Vec<String>,
}

/// A richer inventory record (virtual machine, device) with role tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntity {
    pub name: String,
    #[serde(default)]
    pub primary_ip: Option<String>,
    #[serde(default)]
    pub role_tags: Vec<String>,
}

/// CMDB answer for an exact address match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmdbRecord {
    #[serde(default)]
    pub linked_name: Option<String>,
    #[serde(default)]
    pub dns_name: Option<String>,
}

impl CmdbRecord {
    /// Linked VM name first, then DNS name. Blank values do not count.
    pub fn preferred_name(&self) -> Option<&str> {
        self.linked_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| self.dns_name.as_deref().filter(|n| !n.trim().is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn key(direction: Direction) -> AggregationKey {
        AggregationKey {
            direction,
            local_host: "web1".to_string(),
            local_ip: "10.0.0.2".to_string(),
            remote_host: "db1".to_string(),
            remote_ip: "10.0.0.5".to_string(),
            port: Some(443),
        }
    }

    #[test]
    fn test_orientation_follows_direction() {
        let out = key(Direction::Outgoing);
        let o = out.orientation();
        assert_eq!((o.source, o.target), ("web1", "db1"));
        assert_eq!((o.source_ip, o.target_ip), ("10.0.0.2", "10.0.0.5"));

        let inc = key(Direction::Incoming);
        let o = inc.orientation();
        assert_eq!((o.source, o.target), ("db1", "web1"));
    }

    #[test]
    fn test_record_keeps_latest_timestamp() {
        let early = Utc.timestamp_opt(1_000, 0).unwrap();
        let late = Utc.timestamp_opt(2_000, 0).unwrap();
        let mut edge = AggregatedEdge::new(key(Direction::Outgoing), late);
        edge.record(early);
        assert_eq!(edge.count, 2);
        assert_eq!(edge.latest_seen_at, late);
    }

    #[test]
    fn test_absorb_is_symmetric() {
        let t1 = Utc.timestamp_opt(1_000, 0).unwrap();
        let t2 = Utc.timestamp_opt(3_000, 0).unwrap();
        let mut a = AggregatedEdge::new(key(Direction::Outgoing), t1);
        a.record(t1);
        let b = AggregatedEdge::new(key(Direction::Outgoing), t2);

        let mut ab = a.clone();
        ab.absorb(&b);
        let mut ba = b.clone();
        ba.absorb(&a);
        assert_eq!(ab, ba);
        assert_eq!(ab.count, 3);
        assert_eq!(ab.latest_seen_at, t2);
    }

    #[test]
    fn test_cmdb_prefers_linked_name() {
        let both = CmdbRecord {
            linked_name: Some("vm-app01".to_string()),
            dns_name: Some("app01.example.net".to_string()),
        };
        assert_eq!(both.preferred_name(), Some("vm-app01"));

        let dns_only = CmdbRecord {
            linked_name: Some("  ".to_string()),
            dns_name: Some("app01.example.net".to_string()),
        };
        assert_eq!(dns_only.preferred_name(), Some("app01.example.net"));
        assert_eq!(CmdbRecord::default().preferred_name(), None);
    }

    #[test]
    fn test_edge_serializes_flat() {
        let edge = AggregatedEdge::new(
            key(Direction::Outgoing),
            Utc.timestamp_opt(0, 0).unwrap(),
        );
        let value = serde_json::to_value(&edge).unwrap();
        assert_eq!(value["type"], "outgoing");
        assert_eq!(value["local_host"], "web1");
        assert_eq!(value["port"], 443);
        assert_eq!(value["count"], 1);
    }
}
