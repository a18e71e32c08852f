//! Telemetry ingestion: payload parsing, chunked history fetch, aggregation

pub mod aggregate;
pub mod history;
pub mod payload;

pub use aggregate::{aggregate_items, Aggregator, IngestStats};
pub use history::{ChunkCache, FetchOutcome, HistoryFetcher, TimeWindow};
pub use payload::{parse_payload, ConnectionDescriptor, ConnectionRecord};
