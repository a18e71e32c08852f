//! Background task events
//!
//! Emitted through a callback so the embedding service decides where they go

use serde::{Deserialize, Serialize};

/// Events emitted by the topology refresher and the export scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum MapEvent {
    /// Refresher loop started
    RefresherStarted { interval_seconds: u64 },

    /// Refresher loop exited
    RefresherStopped,

    /// Live pass started
    RefreshStarted { refresh_number: u32 },

    /// Live pass published a new snapshot
    RefreshCompleted {
        refresh_number: u32,
        nodes: usize,
        edges: usize,
        duration_ms: u64,
    },

    /// Live pass failed; the previous snapshot stays current
    RefreshFailed { refresh_number: u32, message: String },

    /// Export pass started
    ExportStarted { run_number: u32 },

    /// Export pass finished, possibly with per-artifact failures
    ExportCompleted {
        run_number: u32,
        files_written: usize,
        failures: usize,
        duration_ms: u64,
    },

    /// Export pass aborted
    ExportFailed { run_number: u32, message: String },

    /// Next export run time (RFC 3339, local time)
    ExportScheduled { next_run: String },

    /// Export scheduler exited
    SchedulerStopped,
}

/// Refresher status information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefresherStatus {
    pub is_running: bool,
    pub interval_seconds: u64,
    pub refresh_count: u32,
    pub failure_count: u32,
    pub last_refresh_time: Option<String>,
    pub nodes: usize,
    pub edges: usize,
}

impl Default for RefresherStatus {
    fn default() -> Self {
        Self {
            is_running: false,
            interval_seconds: crate::config::DEFAULT_REFRESH_SECONDS,
            refresh_count: 0,
            failure_count: 0,
            last_refresh_time: None,
            nodes: 0,
            edges: 0,
        }
    }
}
