//! Aggregation of connection observations into counted edge rows

use std::collections::HashMap;

use super::history::{HistoryFetcher, TimeWindow};
use super::payload::parse_payload;
use crate::identity::IdentityResolver;
use crate::models::{AggregatedEdge, AggregationKey, ConnectionObservation, TelemetryEntry, TelemetryItem};

/// Running map of aggregation key -> counted row.
#[derive(Debug, Default)]
pub struct Aggregator {
    rows: HashMap<AggregationKey, AggregatedEdge>,
    stats: IngestStats,
}

/// Counters describing one ingestion pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct IngestStats {
    pub items: usize,
    pub failed_items: usize,
    pub entries: usize,
    pub skipped_entries: usize,
    pub out_of_window: usize,
    pub observations: usize,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one observation reported by `local_host`.
    pub fn observe(
        &mut self,
        local_host: &str,
        observation: &ConnectionObservation,
        resolver: &mut IdentityResolver,
    ) {
        let key = AggregationKey {
            direction: observation.direction,
            local_host: local_host.to_string(),
            local_ip: observation.local_ip.clone(),
            remote_host: resolver.resolve(&observation.remote_ip),
            remote_ip: observation.remote_ip.clone(),
            port: observation.service_port(),
        };
        self.stats.observations += 1;
        self.merge_key(key, observation.observed_at);
    }

    fn merge_key(&mut self, key: AggregationKey, observed_at: chrono::DateTime<chrono::Utc>) {
        match self.rows.get_mut(&key) {
            Some(row) => row.record(observed_at),
            None => {
                self.rows
                    .insert(key.clone(), AggregatedEdge::new(key, observed_at));
            }
        }
    }

    /// Parse and merge one history entry. Entries outside `window` and
    /// malformed payloads are counted and skipped.
    pub fn ingest_entry(
        &mut self,
        local_host: &str,
        entry: &TelemetryEntry,
        window: &TimeWindow,
        resolver: &mut IdentityResolver,
    ) {
        self.stats.entries += 1;
        if !window.contains(entry.timestamp) {
            self.stats.out_of_window += 1;
            return;
        }

        let record = match parse_payload(&entry.payload) {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!(
                    "[INGEST] Skipping malformed entry from {} at {}: {}",
                    local_host,
                    entry.timestamp,
                    e
                );
                self.stats.skipped_entries += 1;
                return;
            }
        };

        for observation in record.observations(entry.timestamp) {
            self.observe(local_host, &observation, resolver);
        }
    }

    /// Fold another partial aggregate into this one.
    pub fn absorb(&mut self, other: Aggregator) {
        for (key, row) in other.rows {
            match self.rows.get_mut(&key) {
                Some(existing) => existing.absorb(&row),
                None => {
                    self.rows.insert(key, row);
                }
            }
        }
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Final rows in key order.
    pub fn finish(self) -> (Vec<AggregatedEdge>, IngestStats) {
        let mut rows: Vec<AggregatedEdge> = self.rows.into_values().collect();
        rows.sort_by(|a, b| a.key.cmp(&b.key));
        (rows, self.stats)
    }
}

/// Fetch, parse and aggregate every item's history over `window`. An item
/// whose fetch fails entirely contributes no rows; the pass continues.
pub fn aggregate_items(
    items: &[TelemetryItem],
    fetcher: &HistoryFetcher<'_>,
    window: &TimeWindow,
    resolver: &mut IdentityResolver,
) -> (Vec<AggregatedEdge>, IngestStats) {
    let mut aggregator = Aggregator::new();

    for item in items {
        aggregator.stats.items += 1;
        let outcome = fetcher.fetch(&item.item_id, window);
        if outcome.all_failed() {
            tracing::warn!(
                "[INGEST] No data for item {} ({}): every history chunk failed",
                item.item_id,
                item.host_name
            );
            aggregator.stats.failed_items += 1;
            continue;
        }

        for entry in &outcome.entries {
            aggregator.ingest_entry(&item.host_name, entry, window, resolver);
        }
    }

    let (rows, stats) = aggregator.finish();
    tracing::info!(
        "[INGEST] Aggregated {} rows from {} items ({} failed, {} entries, {} malformed)",
        rows.len(),
        stats.items,
        stats.failed_items,
        stats.entries,
        stats.skipped_entries
    );
    (rows, stats)
}
