//! Pass orchestration
//!
//! A pass wires the collaborators through ingestion, identity and either the
//! graph builder (live pass) or the report writers (export pass). Passes are
//! blocking and self-contained; nothing is shared between two passes except
//! the optional on-disk chunk cache.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;

use crate::config::MapSettings;
use crate::error::PassError;
use crate::exports::{generate_reports, ExportSummary, ReportOptions};
use crate::identity::IdentityResolver;
use crate::ingest::{aggregate_items, ChunkCache, HistoryFetcher, IngestStats, TimeWindow};
use crate::layout::LayoutConfig;
use crate::models::AggregatedEdge;
use crate::sources::Sources;
use crate::topology::{build_graph, TopologyCache, TopologySnapshot};

const SECONDS_PER_DAY: i64 = 86_400;

/// Rows plus the identity knowledge gathered while producing them.
struct Ingested {
    rows: Vec<AggregatedEdge>,
    stats: IngestStats,
    resolver: IdentityResolver,
}

fn ingest(
    sources: &Sources,
    settings: &MapSettings,
    window: &TimeWindow,
    cache: Option<ChunkCache>,
) -> Result<Ingested, PassError> {
    let mut resolver = IdentityResolver::from_inventory(sources.inventory.as_ref(), sources.cmdb.clone())?;
    let items = sources
        .telemetry
        .list_connection_items()
        .map_err(PassError::ItemListing)?;

    let fetcher = HistoryFetcher::new(
        sources.telemetry.as_ref(),
        settings.history_chunk_secs,
        settings.history_max_rows,
    )
    .with_cache(cache);

    let (rows, stats) = aggregate_items(&items, &fetcher, window, &mut resolver);
    Ok(Ingested { rows, stats, resolver })
}

/// Build a fresh live topology from the last `live_window_secs` of telemetry.
pub fn run_live_pass(
    sources: &Sources,
    settings: &MapSettings,
    now: DateTime<Utc>,
) -> Result<TopologySnapshot, PassError> {
    let started = Instant::now();
    let window = TimeWindow::ending_at(now, settings.live_window_secs);
    let Ingested { rows, stats, resolver } = ingest(sources, settings, &window, None)?;

    let identity = resolver.into_map();
    let graph = build_graph(&rows, &identity, &settings.private_ranges);

    log_info!(
        "[WORKFLOW] Live pass: {} nodes, {} edges in {}ms",
        graph.nodes().len(),
        graph.edges().len(),
        started.elapsed().as_millis()
    );

    Ok(TopologySnapshot {
        graph,
        refreshed_at: Some(now),
        stats,
    })
}

/// Run a live pass and publish it. On failure the cache keeps its previous
/// snapshot and the error is returned to the caller.
pub fn refresh_topology(
    sources: &Sources,
    settings: &MapSettings,
    cache: &TopologyCache,
    now: DateTime<Utc>,
) -> Result<Arc<TopologySnapshot>, PassError> {
    match run_live_pass(sources, settings, now) {
        Ok(snapshot) => {
            cache.publish(snapshot);
            Ok(cache.snapshot())
        }
        Err(e) => {
            log_warn!("[WORKFLOW] Live pass failed, keeping previous topology: {}", e);
            Err(e)
        }
    }
}

fn prepare_chunk_cache(settings: &MapSettings, window: &TimeWindow) -> Option<ChunkCache> {
    let dir = settings.cache_dir.as_ref()?;
    if let Err(e) = std::fs::create_dir_all(dir) {
        log_warn!(
            "[WORKFLOW] Chunk cache directory {} unusable, fetching without cache: {}",
            dir.display(),
            e
        );
        return None;
    }
    let cache = ChunkCache::new(dir.clone());
    let removed = cache.cleanup(window, settings.history_chunk_secs);
    if removed > 0 {
        log_debug!("[WORKFLOW] Removed {} stale history chunks", removed);
    }
    Some(cache)
}

/// Aggregate the export window and write every report variant.
pub fn run_export_pass(
    sources: &Sources,
    settings: &MapSettings,
    now: DateTime<Utc>,
) -> Result<ExportSummary, PassError> {
    let started = Instant::now();
    let window = TimeWindow::ending_at(now, settings.export_days * SECONDS_PER_DAY);
    let cache = prepare_chunk_cache(settings, &window);
    let Ingested { rows, .. } = ingest(sources, settings, &window, cache)?;

    let options = ReportOptions {
        dir: &settings.report_dir,
        excluded_hosts: &settings.excluded_hosts,
        ranges: &settings.private_ranges,
        layout: LayoutConfig::default(),
        generated_at: now,
    };
    let summary = generate_reports(&rows, &options)?;

    log_info!(
        "[WORKFLOW] Export pass: {} rows, {} files, {} failures in {}ms",
        rows.len(),
        summary.files_written.len(),
        summary.failures.len(),
        started.elapsed().as_millis()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::FixtureSource;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
    }

    fn fixture() -> FixtureSource {
        FixtureSource::new()
            .with_host("web1", &["10.0.0.2"])
            .with_host("db1", &["10.0.0.5"])
            .with_item("item-web1", "web1")
            .with_entry(
                "item-web1",
                now() - chrono::Duration::hours(1),
                r#"{"outgoingconnections":[{"localip":"10.0.0.2","remoteip":"10.0.0.5","localport":51000,"remoteport":5432}]}"#,
            )
    }

    #[test]
    fn test_live_pass_builds_graph() {
        let sources = Sources::from_single(Arc::new(fixture()));
        let snapshot = run_live_pass(&sources, &MapSettings::default_values(), now()).unwrap();

        assert_eq!(snapshot.graph.edges().len(), 1);
        assert_eq!(snapshot.graph.edges()[0].label, "port 5432");
        assert_eq!(snapshot.refreshed_at, Some(now()));
        assert_eq!(snapshot.stats.items, 1);
    }

    #[test]
    fn test_refresh_keeps_previous_snapshot_on_inventory_failure() {
        let cache = TopologyCache::new();
        let settings = MapSettings::default_values();
        let good = Sources::from_single(Arc::new(fixture()));
        refresh_topology(&good, &settings, &cache, now()).unwrap();

        let broken = Sources::from_single(Arc::new(fixture().with_inventory_unavailable()));
        let err = refresh_topology(&broken, &settings, &cache, now()).unwrap_err();

        assert!(matches!(err, PassError::InventoryUnavailable(_)));
        assert_eq!(cache.snapshot().graph.edges().len(), 1);
    }

    #[test]
    fn test_export_pass_writes_reports() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = MapSettings::default_values()
            .with_report_dir(tmp.path().join("reports"))
            .with_cache_dir(Some(tmp.path().join("cache")));
        let sources = Sources::from_single(Arc::new(fixture()));

        let summary = run_export_pass(&sources, &settings, now()).unwrap();
        assert!(summary.is_complete());
        assert_eq!(summary.files_written.len(), 12);
        assert!(tmp.path().join("cache").is_dir());
    }
}
