//! Report orchestration
//!
//! Renders every artifact for every filter variant into the report
//! directory. A failing artifact is logged and recorded; the rest still run.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use super::csv::{export_edge_list_csv, export_summary_csv};
use super::drawio::export_drawio;
use super::filter::FilterVariant;
use super::json::export_per_host_json;
use crate::layout::LayoutConfig;
use crate::models::AggregatedEdge;
use crate::network::PrivateRanges;

const REPORT_FILE_PREFIX: &str = "network_blueprint_";
const REPORT_EXTENSIONS: [&str; 3] = ["csv", "json", "drawio"];

/// The four artifacts produced per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Artifact {
    Summary,
    PerHost,
    EdgeList,
    Diagram,
}

impl Artifact {
    pub const ALL: [Artifact; 4] = [
        Artifact::Summary,
        Artifact::PerHost,
        Artifact::EdgeList,
        Artifact::Diagram,
    ];

    pub fn file_name(&self, variant: FilterVariant) -> String {
        let s = variant.file_suffix();
        match self {
            Artifact::Summary => format!("{}summary{}.csv", REPORT_FILE_PREFIX, s),
            Artifact::PerHost => format!("{}per_host{}.json", REPORT_FILE_PREFIX, s),
            Artifact::EdgeList => format!("{}edges{}.csv", REPORT_FILE_PREFIX, s),
            Artifact::Diagram => format!("{}per_host{}.drawio", REPORT_FILE_PREFIX, s),
        }
    }
}

/// Inputs shared by every variant of one export run.
#[derive(Debug, Clone)]
pub struct ReportOptions<'a> {
    pub dir: &'a Path,
    pub excluded_hosts: &'a BTreeSet<String>,
    pub ranges: &'a PrivateRanges,
    pub layout: LayoutConfig,
    pub generated_at: DateTime<Utc>,
}

/// What one export run produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExportSummary {
    pub files_written: Vec<PathBuf>,
    /// Rows kept per variant.
    pub rows: BTreeMap<FilterVariant, usize>,
    /// Diagram pages drawn per variant.
    pub pages: BTreeMap<FilterVariant, usize>,
    pub failures: Vec<String>,
}

impl ExportSummary {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

fn render(
    artifact: Artifact,
    rows: &[AggregatedEdge],
    opts: &ReportOptions<'_>,
) -> Result<(String, Option<usize>)> {
    match artifact {
        Artifact::Summary => Ok((export_summary_csv(rows)?, None)),
        Artifact::PerHost => Ok((export_per_host_json(rows, opts.generated_at)?, None)),
        Artifact::EdgeList => Ok((export_edge_list_csv(rows)?, None)),
        Artifact::Diagram => {
            let (xml, pages) = export_drawio(rows, opts.excluded_hosts, &opts.layout)?;
            Ok((xml, Some(pages)))
        }
    }
}

/// Write all artifacts of all variants. Fails only when the report
/// directory itself cannot be created.
pub fn generate_reports(rows: &[AggregatedEdge], opts: &ReportOptions<'_>) -> Result<ExportSummary> {
    fs::create_dir_all(opts.dir)
        .with_context(|| format!("Failed to create report directory {}", opts.dir.display()))?;

    let mut summary = ExportSummary::default();

    for variant in FilterVariant::ALL {
        let kept = variant.apply(rows, opts.ranges);
        summary.rows.insert(variant, kept.len());

        for artifact in Artifact::ALL {
            let path = opts.dir.join(artifact.file_name(variant));
            let written = render(artifact, &kept, opts).and_then(|(content, pages)| {
                fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
                Ok(pages)
            });

            match written {
                Ok(pages) => {
                    if let Some(pages) = pages {
                        summary.pages.insert(variant, pages);
                    }
                    summary.files_written.push(path);
                }
                Err(e) => {
                    tracing::warn!("[EXPORT] {:?} ({}) failed: {:#}", artifact, variant, e);
                    summary.failures.push(format!("{}: {:#}", path.display(), e));
                }
            }
        }

        tracing::info!(
            "[EXPORT] Variant '{}': {} rows, {} diagram pages",
            variant,
            kept.len(),
            summary.pages.get(&variant).copied().unwrap_or(0)
        );
    }

    Ok(summary)
}

/// A report artifact found on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportFile {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// `network_blueprint_*` artifacts in `dir`, sorted by name. Other files,
/// such as a chunk cache sharing the directory, are ignored. A missing
/// directory is empty.
pub fn list_report_files(dir: &Path) -> Result<Vec<ReportFile>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        let has_prefix = entry
            .file_name()
            .to_str()
            .is_some_and(|n| n.starts_with(REPORT_FILE_PREFIX));
        let has_extension = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| REPORT_EXTENSIONS.contains(&e));
        let is_report = has_prefix && has_extension;
        if !is_report {
            continue;
        }
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        files.push(ReportFile {
            name: entry.file_name().to_string_lossy().into_owned(),
            path,
            size_bytes: metadata.len(),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        });
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}
