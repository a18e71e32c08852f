//! Error taxonomy for ingestion and map passes
//!
//! Per-record and per-item failures are absorbed where they happen; only
//! `PassError` crosses a pass boundary.

use thiserror::Error;

/// A telemetry payload that could not be turned into connection records.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload is not a JSON object")]
    NotAnObject,
}

/// Failure reported by an external collaborator (collector, inventory, CMDB).
#[derive(Debug, Error)]
#[error("{source_name}: {message}")]
pub struct SourceError {
    pub source_name: String,
    pub message: String,
}

impl SourceError {
    pub fn new(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

/// Failures that abort a whole pass.
#[derive(Debug, Error)]
pub enum PassError {
    #[error("inventory unavailable: {0}")]
    InventoryUnavailable(#[source] SourceError),

    #[error("telemetry item listing failed: {0}")]
    ItemListing(#[source] SourceError),

    #[error("export failed: {0}")]
    Export(#[from] anyhow::Error),
}
