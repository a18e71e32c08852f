//! Network map engine
//!
//! Rebuilds a live network-topology graph from per-host connection telemetry
//! and exports it as blueprint reports:
//! - Telemetry ingestion and order-independent aggregation
//! - Host identity resolution from inventory and CMDB
//! - Classified topology graph behind a lock-free snapshot cache
//! - Seeded force-directed layout with collision resolution
//! - CSV, JSON and draw.io exports under three traffic filters

#[macro_use]
pub mod logging;

pub mod app;
mod cli;
mod command_handlers;
pub mod config;
pub mod error;
pub mod exports;
pub mod identity;
pub mod ingest;
pub mod layout;
pub mod models;
pub mod monitor;
pub mod network;
pub mod sources;
pub mod topology;
pub mod workflow;

pub use cli::{parse_cli_args, CliCommand};
pub use config::MapSettings;
pub use error::{PassError, PayloadError, SourceError};
pub use exports::{
    export_topology_json, generate_reports, list_report_files, ExportSummary, FilterVariant, ReportFile,
};
pub use identity::{IdentityMap, IdentityResolver};
pub use ingest::{aggregate_items, parse_payload, Aggregator, ChunkCache, HistoryFetcher, IngestStats, TimeWindow};
pub use layout::{layout_subgraph, resolve_collisions, spring_layout, DiagramLayout, HostSubgraph, LayoutConfig, Position};
pub use models::*;
pub use monitor::{next_daily_run, ExportScheduler, MapEvent, RefresherStatus, TopologyRefresher};
pub use network::PrivateRanges;
pub use sources::{CmdbSource, FixtureSource, InventorySource, Sources, TelemetrySource};
pub use topology::{build_graph, Classification, TopologyCache, TopologyGraph, TopologySnapshot};
pub use workflow::{refresh_topology, run_export_pass, run_live_pass};
