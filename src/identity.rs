//! Host identity resolution
//!
//! Maps addresses to friendly host names from the monitoring inventory, with
//! a CMDB fallback for addresses the inventory cannot name. An address with no
//! known name resolves to itself.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{PassError, SourceError};
use crate::models::{InventoryEntity, InventoryHost};
use crate::network::parse_ip;
use crate::sources::{CmdbSource, InventorySource};

/// Bidirectional address/name map plus inventory role tags.
#[derive(Debug, Clone, Default)]
pub struct IdentityMap {
    ip_to_name: HashMap<String, String>,
    name_to_ip: HashMap<String, String>,
    role_tags: HashMap<String, Vec<String>>,
}

impl IdentityMap {
    /// Hosts first; entities only name addresses no host claimed.
    pub fn build(hosts: &[InventoryHost], entities: &[InventoryEntity]) -> Self {
        let mut map = Self::default();

        for host in hosts {
            for ip in host.interface_ips.iter().map(|ip| ip.trim()) {
                if ip.is_empty() {
                    continue;
                }
                map.ip_to_name.insert(ip.to_string(), host.name.clone());
                map.name_to_ip
                    .entry(host.name.clone())
                    .or_insert_with(|| ip.to_string());
            }
        }

        for entity in entities {
            let tags: Vec<String> = entity
                .role_tags
                .iter()
                .filter(|t| !t.trim().is_empty())
                .cloned()
                .collect();
            if !tags.is_empty() {
                map.role_tags.insert(entity.name.clone(), tags);
            }

            let Some(ip) = entity
                .primary_ip
                .as_deref()
                .map(strip_prefix_len)
                .filter(|ip| !ip.is_empty())
            else {
                continue;
            };
            map.ip_to_name
                .entry(ip.to_string())
                .or_insert_with(|| entity.name.clone());
            map.name_to_ip
                .entry(entity.name.clone())
                .or_insert_with(|| ip.to_string());
        }

        map
    }

    /// Record `ip -> name`; the first address seen for a name stays representative.
    pub fn insert(&mut self, ip: &str, name: &str) {
        self.ip_to_name.insert(ip.to_string(), name.to_string());
        self.name_to_ip
            .entry(name.to_string())
            .or_insert_with(|| ip.to_string());
    }

    pub fn name_for(&self, ip: &str) -> Option<&str> {
        self.ip_to_name.get(ip).map(String::as_str)
    }

    pub fn ip_for(&self, name: &str) -> Option<&str> {
        self.name_to_ip.get(name).map(String::as_str)
    }

    /// Known address of a node: mapped IP, else the name itself when it is an address.
    pub fn representative_ip(&self, name: &str) -> Option<String> {
        self.ip_for(name)
            .map(str::to_string)
            .or_else(|| parse_ip(name).map(|_| name.to_string()))
    }

    pub fn role_tags(&self, name: &str) -> &[String] {
        self.role_tags.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Addresses whose inventory name is the address itself.
    pub fn self_named(&self) -> Vec<String> {
        let mut ips: Vec<String> = self
            .ip_to_name
            .iter()
            .filter(|(ip, name)| ip == name)
            .map(|(ip, _)| ip.clone())
            .collect();
        ips.sort();
        ips
    }

    pub fn len(&self) -> usize {
        self.ip_to_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ip_to_name.is_empty()
    }
}

/// Inventory addresses sometimes carry a prefix length (`10.0.0.5/24`).
fn strip_prefix_len(raw: &str) -> &str {
    raw.split('/').next().unwrap_or(raw).trim()
}

/// Pass-scoped resolver. CMDB answers, hits and misses alike, are memoised
/// for the resolver's lifetime.
pub struct IdentityResolver {
    map: IdentityMap,
    cmdb: Option<Arc<dyn CmdbSource>>,
    misses: HashSet<String>,
}

impl IdentityResolver {
    pub fn new(map: IdentityMap, cmdb: Option<Arc<dyn CmdbSource>>) -> Self {
        Self {
            map,
            cmdb,
            misses: HashSet::new(),
        }
    }

    /// Build a fresh resolver from the inventory. Only an unreachable host
    /// list is fatal; entity listing failures degrade to "no entities".
    pub fn from_inventory(
        inventory: &dyn InventorySource,
        cmdb: Option<Arc<dyn CmdbSource>>,
    ) -> Result<Self, PassError> {
        let hosts = inventory
            .list_hosts()
            .map_err(PassError::InventoryUnavailable)?;
        let entities = inventory.list_entities().unwrap_or_else(|e| {
            tracing::warn!("[IDENTITY] Entity inventory unavailable, continuing without: {}", e);
            Vec::new()
        });

        let mut resolver = Self::new(IdentityMap::build(&hosts, &entities), cmdb);
        resolver.enrich_self_named();

        tracing::debug!(
            "[IDENTITY] Identity map built: {} hosts, {} entities, {} addresses",
            hosts.len(),
            entities.len(),
            resolver.map.len()
        );
        Ok(resolver)
    }

    /// Replace address-named inventory entries with CMDB names where possible.
    pub fn enrich_self_named(&mut self) -> usize {
        let mut enriched = 0;
        for ip in self.map.self_named() {
            if let Some(name) = self.lookup_cmdb(&ip) {
                self.map.insert(&ip, &name);
                enriched += 1;
            }
        }
        enriched
    }

    /// Friendly name for `ip`, or `ip` itself when nothing names it.
    pub fn resolve(&mut self, ip: &str) -> String {
        if ip.is_empty() {
            return String::new();
        }
        if let Some(name) = self.map.name_for(ip) {
            return name.to_string();
        }
        if self.misses.contains(ip) {
            return ip.to_string();
        }
        match self.lookup_cmdb(ip) {
            Some(name) => {
                self.map.insert(ip, &name);
                name
            }
            None => {
                self.misses.insert(ip.to_string());
                ip.to_string()
            }
        }
    }

    fn lookup_cmdb(&self, ip: &str) -> Option<String> {
        let cmdb = self.cmdb.as_ref()?;
        match cmdb.lookup_by_address(ip) {
            Ok(Some(record)) => record.preferred_name().map(str::to_string),
            Ok(None) => None,
            Err(e) => {
                log_cmdb_failure(ip, &e);
                None
            }
        }
    }

    pub fn map(&self) -> &IdentityMap {
        &self.map
    }

    pub fn into_map(self) -> IdentityMap {
        self.map
    }
}

fn log_cmdb_failure(ip: &str, e: &SourceError) {
    tracing::warn!("[IDENTITY] CMDB lookup failed for {}: {}", ip, e);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CmdbRecord;
    use crate::sources::FixtureSource;

    fn host(name: &str, ips: &[&str]) -> InventoryHost {
        InventoryHost {
            name: name.to_string(),
            interface_ips: ips.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_build_from_hosts_keeps_first_ip_representative() {
        let map = IdentityMap::build(&[host("db1", &["10.0.0.5", "10.0.1.5"])], &[]);
        assert_eq!(map.name_for("10.0.0.5"), Some("db1"));
        assert_eq!(map.name_for("10.0.1.5"), Some("db1"));
        assert_eq!(map.ip_for("db1"), Some("10.0.0.5"));
    }

    #[test]
    fn test_entities_fill_gaps_only() {
        let entities = vec![
            InventoryEntity {
                name: "vm-db1".to_string(),
                primary_ip: Some("10.0.0.5/24".to_string()),
                role_tags: vec!["production".to_string()],
            },
            InventoryEntity {
                name: "vm-cache".to_string(),
                primary_ip: Some("10.0.0.9/24".to_string()),
                role_tags: vec![],
            },
        ];
        let map = IdentityMap::build(&[host("db1", &["10.0.0.5"])], &entities);
        assert_eq!(map.name_for("10.0.0.5"), Some("db1"));
        assert_eq!(map.name_for("10.0.0.9"), Some("vm-cache"));
        assert_eq!(map.role_tags("vm-db1"), ["production".to_string()]);
        assert!(map.role_tags("vm-cache").is_empty());
    }

    #[test]
    fn test_representative_ip_falls_back_to_address_name() {
        let map = IdentityMap::default();
        assert_eq!(map.representative_ip("8.8.8.8"), Some("8.8.8.8".to_string()));
        assert_eq!(map.representative_ip("web1"), None);
    }

    #[test]
    fn test_unresolved_address_is_its_own_name() {
        let mut resolver = IdentityResolver::new(IdentityMap::default(), None);
        assert_eq!(resolver.resolve("8.8.8.8"), "8.8.8.8");
        assert_eq!(resolver.resolve(""), "");
    }

    #[test]
    fn test_self_named_hosts_enriched_from_cmdb() {
        let fixture = Arc::new(
            FixtureSource::new()
                .with_host("10.0.0.7", &["10.0.0.7"])
                .with_cmdb(
                    "10.0.0.7",
                    CmdbRecord {
                        linked_name: None,
                        dns_name: Some("mail.example.net".to_string()),
                    },
                ),
        );
        let resolver =
            IdentityResolver::from_inventory(fixture.as_ref(), Some(fixture.clone())).unwrap();
        assert_eq!(resolver.map().name_for("10.0.0.7"), Some("mail.example.net"));
    }

    #[test]
    fn test_cmdb_answers_are_memoised() {
        let fixture = Arc::new(FixtureSource::new().with_cmdb(
            "10.9.9.9",
            CmdbRecord {
                linked_name: Some("vm-backup".to_string()),
                dns_name: None,
            },
        ));
        let mut resolver = IdentityResolver::new(IdentityMap::default(), Some(fixture.clone()));

        assert_eq!(resolver.resolve("10.9.9.9"), "vm-backup");
        assert_eq!(resolver.resolve("10.9.9.9"), "vm-backup");
        assert_eq!(resolver.resolve("1.1.1.1"), "1.1.1.1");
        assert_eq!(resolver.resolve("1.1.1.1"), "1.1.1.1");
        assert_eq!(fixture.cmdb_calls(), 2);
        assert_eq!(resolver.map().ip_for("vm-backup"), Some("10.9.9.9"));
    }

    #[test]
    fn test_unreachable_inventory_is_fatal() {
        let fixture = FixtureSource::new().with_inventory_unavailable();
        let result = IdentityResolver::from_inventory(&fixture, None);
        assert!(matches!(result, Err(PassError::InventoryUnavailable(_))));
    }
}
