//! External collaborators, reduced to the read operations the engine needs
//!
//! All calls are blocking; passes run them off the async runtime.

pub mod fixture;

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::SourceError;
use crate::models::{CmdbRecord, InventoryEntity, InventoryHost, TelemetryEntry, TelemetryItem};

pub use fixture::FixtureSource;

/// Monitoring collector holding per-host connection telemetry.
pub trait TelemetrySource: Send + Sync {
    /// Items named `linux-network-connections` or `windows-network-connections`.
    fn list_connection_items(&self) -> Result<Vec<TelemetryItem>, SourceError>;

    /// Entries with `from <= timestamp <= till`, at most `max_rows` of them.
    fn fetch_history(
        &self,
        item_id: &str,
        from: DateTime<Utc>,
        till: DateTime<Utc>,
        max_rows: usize,
    ) -> Result<Vec<TelemetryEntry>, SourceError>;
}

/// Host inventory of the monitoring system.
pub trait InventorySource: Send + Sync {
    fn list_hosts(&self) -> Result<Vec<InventoryHost>, SourceError>;

    /// Optional richer records used for role classification.
    fn list_entities(&self) -> Result<Vec<InventoryEntity>, SourceError> {
        Ok(Vec::new())
    }
}

/// Secondary CMDB used to name addresses the inventory does not know.
pub trait CmdbSource: Send + Sync {
    fn lookup_by_address(&self, ip: &str) -> Result<Option<CmdbRecord>, SourceError>;
}

/// The collaborator set one pass works against.
#[derive(Clone)]
pub struct Sources {
    pub telemetry: Arc<dyn TelemetrySource>,
    pub inventory: Arc<dyn InventorySource>,
    pub cmdb: Option<Arc<dyn CmdbSource>>,
}

impl Sources {
    pub fn new(
        telemetry: Arc<dyn TelemetrySource>,
        inventory: Arc<dyn InventorySource>,
        cmdb: Option<Arc<dyn CmdbSource>>,
    ) -> Self {
        Self {
            telemetry,
            inventory,
            cmdb,
        }
    }

    /// One object serving all three roles.
    pub fn from_single<T>(source: Arc<T>) -> Self
    where
        T: TelemetrySource + InventorySource + CmdbSource + 'static,
    {
        Self {
            telemetry: source.clone(),
            inventory: source.clone(),
            cmdb: Some(source),
        }
    }
}
