use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{cache_dir, MapSettings};
use crate::exports::{export_topology_json, list_report_files};
use crate::sources::{FixtureSource, Sources};
use crate::workflow::{run_export_pass, run_live_pass};

fn fixture_sources(path: &Path) -> Result<Sources> {
    let fixture = FixtureSource::load(path)?;
    Ok(Sources::from_single(Arc::new(fixture)))
}

fn settings_for(out: Option<PathBuf>) -> MapSettings {
    let settings = MapSettings::from_env();
    match out {
        Some(dir) => {
            let cache = cache_dir(&dir);
            settings.with_report_dir(dir).with_cache_dir(Some(cache))
        }
        None => settings,
    }
}

pub(crate) async fn handle_export(fixture: PathBuf, out: Option<PathBuf>, at: Option<DateTime<Utc>>) -> Result<()> {
    let sources = fixture_sources(&fixture)?;
    let settings = settings_for(out);
    let now = at.unwrap_or_else(Utc::now);

    log_info!("[EXPORT] Writing reports to {}", settings.report_dir.display());
    let summary = tokio::task::spawn_blocking(move || run_export_pass(&sources, &settings, now))
        .await
        .context("Export task failed")??;

    println!(
        "{}",
        serde_json::to_string_pretty(&summary).context("Failed to serialize export summary")?
    );
    if !summary.is_complete() {
        log_warn!("[EXPORT] {} artifacts failed", summary.failures.len());
    }
    Ok(())
}

pub(crate) async fn handle_topology(fixture: PathBuf, at: Option<DateTime<Utc>>) -> Result<()> {
    let sources = fixture_sources(&fixture)?;
    let settings = MapSettings::from_env();
    let now = at.unwrap_or_else(Utc::now);

    let snapshot = tokio::task::spawn_blocking(move || run_live_pass(&sources, &settings, now))
        .await
        .context("Topology task failed")??;

    println!("{}", export_topology_json(&snapshot.graph, now)?);
    Ok(())
}

pub(crate) async fn handle_reports(out: Option<PathBuf>) -> Result<()> {
    let dir = out.unwrap_or_else(crate::config::report_dir);
    let files = list_report_files(&dir)?;
    if files.is_empty() {
        println!("No reports in {}", dir.display());
        return Ok(());
    }
    for file in files {
        let modified = file
            .modified
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "unknown".to_string());
        println!("{}\t{}\t{}", file.name, file.size_bytes, modified);
    }
    Ok(())
}
