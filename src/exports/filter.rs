//! Traffic filters applied to aggregated rows before export

use serde::Serialize;
use std::fmt;

use crate::models::AggregatedEdge;
use crate::network::{is_loopback, parse_ip, PrivateRanges};

/// One of the three export variants. Every variant produces its own
/// artifact set, distinguished by a file-name suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterVariant {
    All,
    InternalOnly,
    PublicOnly,
}

impl FilterVariant {
    pub const ALL: [FilterVariant; 3] = [
        FilterVariant::All,
        FilterVariant::InternalOnly,
        FilterVariant::PublicOnly,
    ];

    pub fn file_suffix(&self) -> &'static str {
        match self {
            FilterVariant::All => "",
            FilterVariant::InternalOnly => "_internal_ip",
            FilterVariant::PublicOnly => "_public_ip",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterVariant::All => "all",
            FilterVariant::InternalOnly => "internal-only",
            FilterVariant::PublicOnly => "public-only",
        }
    }

    /// Whether a single row belongs to this variant.
    pub fn keeps(&self, row: &AggregatedEdge, ranges: &PrivateRanges) -> bool {
        let local = &row.key.local_ip;
        let remote = &row.key.remote_ip;
        match self {
            FilterVariant::All => true,
            // Both ends must be well-formed addresses inside the private ranges.
            FilterVariant::InternalOnly => ranges.is_internal_ip(local) && ranges.is_internal_ip(remote),
            FilterVariant::PublicOnly => {
                parse_ip(local).is_some()
                    && !is_loopback(local)
                    && !is_loopback(remote)
                    && ranges.is_public_ip(remote)
            }
        }
    }

    /// Rows kept by this variant, in input order.
    pub fn apply(&self, rows: &[AggregatedEdge], ranges: &PrivateRanges) -> Vec<AggregatedEdge> {
        rows.iter().filter(|row| self.keeps(row, ranges)).cloned().collect()
    }
}

impl fmt::Display for FilterVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AggregationKey, Direction};
    use chrono::{TimeZone, Utc};

    fn row(local_ip: &str, remote_ip: &str) -> AggregatedEdge {
        AggregatedEdge::new(
            AggregationKey {
                direction: Direction::Outgoing,
                local_host: "web1".to_string(),
                local_ip: local_ip.to_string(),
                remote_host: remote_ip.to_string(),
                remote_ip: remote_ip.to_string(),
                port: Some(443),
            },
            Utc.timestamp_opt(0, 0).unwrap(),
        )
    }

    #[test]
    fn test_suffixes() {
        let suffixes: Vec<&str> = FilterVariant::ALL.iter().map(|v| v.file_suffix()).collect();
        assert_eq!(suffixes, ["", "_internal_ip", "_public_ip"]);
    }

    #[test]
    fn test_variant_membership() {
        let ranges = PrivateRanges::default();
        let internal = row("10.0.0.2", "192.168.1.5");
        let public = row("10.0.0.2", "8.8.8.8");
        let loopback = row("127.0.0.1", "1.1.1.1");
        let garbage = row("not-an-ip", "10.0.0.9");

        assert!(FilterVariant::InternalOnly.keeps(&internal, &ranges));
        assert!(!FilterVariant::PublicOnly.keeps(&internal, &ranges));

        assert!(FilterVariant::PublicOnly.keeps(&public, &ranges));
        assert!(!FilterVariant::InternalOnly.keeps(&public, &ranges));

        assert!(!FilterVariant::PublicOnly.keeps(&loopback, &ranges));
        assert!(!FilterVariant::InternalOnly.keeps(&garbage, &ranges));
        assert!(!FilterVariant::PublicOnly.keeps(&garbage, &ranges));
        assert!(FilterVariant::All.keeps(&garbage, &ranges));
    }

    #[test]
    fn test_internal_and_public_are_disjoint_subsets() {
        let ranges = PrivateRanges::default();
        let rows = vec![
            row("10.0.0.2", "10.0.0.5"),
            row("10.0.0.2", "8.8.8.8"),
            row("172.16.4.1", "172.32.0.1"),
            row("192.168.0.3", "127.0.0.1"),
            row("", "10.0.0.5"),
            row("10.0.0.2", "::1"),
        ];
        let all = FilterVariant::All.apply(&rows, &ranges);
        let internal = FilterVariant::InternalOnly.apply(&rows, &ranges);
        let public = FilterVariant::PublicOnly.apply(&rows, &ranges);

        assert_eq!(all, rows);
        for r in internal.iter().chain(&public) {
            assert!(all.contains(r));
        }
        assert!(internal.iter().all(|r| !public.contains(r)));
        assert_eq!(internal.len(), 1);
        assert_eq!(public.len(), 2);
    }
}
