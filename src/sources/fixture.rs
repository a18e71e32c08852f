//! JSON fixture standing in for the collector, inventory and CMDB
//!
//! Used by the CLI for offline runs and by the test suites.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{CmdbSource, InventorySource, TelemetrySource};
use crate::error::SourceError;
use crate::models::{CmdbRecord, InventoryEntity, InventoryHost, TelemetryEntry, TelemetryItem};

const SOURCE_NAME: &str = "fixture";

/// In-memory snapshot of every collaborator.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FixtureSource {
    #[serde(default)]
    pub items: Vec<TelemetryItem>,
    /// item id -> history entries
    #[serde(default)]
    pub history: BTreeMap<String, Vec<TelemetryEntry>>,
    #[serde(default)]
    pub hosts: Vec<InventoryHost>,
    #[serde(default)]
    pub entities: Vec<InventoryEntity>,
    /// address -> CMDB record
    #[serde(default)]
    pub cmdb: BTreeMap<String, CmdbRecord>,
    /// Items whose history fetch fails.
    #[serde(default)]
    pub failing_items: BTreeSet<String>,
    #[serde(default)]
    pub inventory_unavailable: bool,
    #[serde(default)]
    pub cmdb_unavailable: bool,
    #[serde(skip)]
    history_calls: AtomicUsize,
    #[serde(skip)]
    cmdb_calls: AtomicUsize,
}

impl FixtureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse fixture {}", path.display()))
    }

    pub fn with_item(mut self, item_id: &str, host_name: &str) -> Self {
        self.items.push(TelemetryItem {
            item_id: item_id.to_string(),
            host_name: host_name.to_string(),
        });
        self
    }

    pub fn with_entry(mut self, item_id: &str, timestamp: DateTime<Utc>, payload: &str) -> Self {
        self.history
            .entry(item_id.to_string())
            .or_default()
            .push(TelemetryEntry {
                timestamp,
                payload: payload.to_string(),
            });
        self
    }

    pub fn with_host(mut self, name: &str, interface_ips: &[&str]) -> Self {
        self.hosts.push(InventoryHost {
            name: name.to_string(),
            interface_ips: interface_ips.iter().map(|ip| ip.to_string()).collect(),
        });
        self
    }

    pub fn with_entity(mut self, name: &str, primary_ip: Option<&str>, role_tags: &[&str]) -> Self {
        self.entities.push(InventoryEntity {
            name: name.to_string(),
            primary_ip: primary_ip.map(str::to_string),
            role_tags: role_tags.iter().map(|t| t.to_string()).collect(),
        });
        self
    }

    pub fn with_cmdb(mut self, ip: &str, record: CmdbRecord) -> Self {
        self.cmdb.insert(ip.to_string(), record);
        self
    }

    pub fn with_failing_item(mut self, item_id: &str) -> Self {
        self.failing_items.insert(item_id.to_string());
        self
    }

    pub fn with_inventory_unavailable(mut self) -> Self {
        self.inventory_unavailable = true;
        self
    }

    /// Number of `fetch_history` calls served so far.
    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    /// Number of CMDB lookups served so far.
    pub fn cmdb_calls(&self) -> usize {
        self.cmdb_calls.load(Ordering::SeqCst)
    }
}

impl TelemetrySource for FixtureSource {
    fn list_connection_items(&self) -> Result<Vec<TelemetryItem>, SourceError> {
        Ok(self.items.clone())
    }

    fn fetch_history(
        &self,
        item_id: &str,
        from: DateTime<Utc>,
        till: DateTime<Utc>,
        max_rows: usize,
    ) -> Result<Vec<TelemetryEntry>, SourceError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_items.contains(item_id) {
            return Err(SourceError::new(
                SOURCE_NAME,
                format!("history unavailable for item {}", item_id),
            ));
        }

        let mut entries: Vec<TelemetryEntry> = self
            .history
            .get(item_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.timestamp >= from && e.timestamp <= till)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        entries.sort_by_key(|e| e.timestamp);
        entries.truncate(max_rows);
        Ok(entries)
    }
}

impl InventorySource for FixtureSource {
    fn list_hosts(&self) -> Result<Vec<InventoryHost>, SourceError> {
        if self.inventory_unavailable {
            return Err(SourceError::new(SOURCE_NAME, "host inventory unreachable"));
        }
        Ok(self.hosts.clone())
    }

    fn list_entities(&self) -> Result<Vec<InventoryEntity>, SourceError> {
        if self.inventory_unavailable {
            return Err(SourceError::new(SOURCE_NAME, "entity inventory unreachable"));
        }
        Ok(self.entities.clone())
    }
}

impl CmdbSource for FixtureSource {
    fn lookup_by_address(&self, ip: &str) -> Result<Option<CmdbRecord>, SourceError> {
        self.cmdb_calls.fetch_add(1, Ordering::SeqCst);
        if self.cmdb_unavailable {
            return Err(SourceError::new(SOURCE_NAME, "cmdb unreachable"));
        }
        Ok(self.cmdb.get(ip).cloned())
    }
}
