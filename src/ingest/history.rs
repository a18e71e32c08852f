//! Chunked telemetry history retrieval with an optional on-disk chunk cache

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::path::{Path, PathBuf};

use crate::models::TelemetryEntry;
use crate::sources::TelemetrySource;

/// Inclusive time window `[from, till]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: DateTime<Utc>,
    pub till: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(from: DateTime<Utc>, till: DateTime<Utc>) -> Self {
        Self { from, till }
    }

    /// The `length_secs` seconds ending at `now`.
    pub fn ending_at(now: DateTime<Utc>, length_secs: i64) -> Self {
        Self {
            from: now - Duration::seconds(length_secs),
            till: now,
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.from && at <= self.till
    }

    /// Chunk starts (unix seconds) aligned down to `chunk_secs`, covering the window.
    pub fn chunk_starts(&self, chunk_secs: i64) -> Vec<i64> {
        let chunk_secs = chunk_secs.max(1);
        let first = align_down(self.from.timestamp(), chunk_secs);
        let last = align_down(self.till.timestamp(), chunk_secs);
        (0..)
            .map(|i| first + i * chunk_secs)
            .take_while(|start| *start <= last)
            .collect()
    }
}

fn align_down(ts: i64, chunk_secs: i64) -> i64 {
    ts.div_euclid(chunk_secs) * chunk_secs
}

/// One JSON file per `(item, chunk length, chunk start)`.
#[derive(Debug, Clone)]
pub struct ChunkCache {
    dir: PathBuf,
}

impl ChunkCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `history_<hex item id>_<chunk secs>_<chunk start>.json`. The item id
    /// is hex-encoded so distinct ids never share a file.
    pub fn chunk_path(&self, item_id: &str, chunk_secs: i64, chunk_start: i64) -> PathBuf {
        self.dir.join(format!(
            "{}{}_{}_{}.json",
            CHUNK_FILE_PREFIX,
            encode_item_id(item_id),
            chunk_secs,
            chunk_start
        ))
    }

    /// Cached chunk, or `None` when absent or unreadable.
    pub fn read(&self, item_id: &str, chunk_secs: i64, chunk_start: i64) -> Option<Vec<TelemetryEntry>> {
        let path = self.chunk_path(item_id, chunk_secs, chunk_start);
        if !path.exists() {
            return None;
        }
        let parsed = std::fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|raw| serde_json::from_str(&raw).map_err(anyhow::Error::from));
        match parsed {
            Ok(entries) => Some(entries),
            Err(e) => {
                tracing::warn!("[HISTORY] Failed to read cache {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn write(
        &self,
        item_id: &str,
        chunk_secs: i64,
        chunk_start: i64,
        entries: &[TelemetryEntry],
    ) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create cache dir {}", self.dir.display()))?;
        let path = self.chunk_path(item_id, chunk_secs, chunk_start);
        let json = serde_json::to_string(entries)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write cache {}", path.display()))?;
        Ok(())
    }

    /// Delete chunks that end before the first chunk of `window`, and chunks
    /// of any other length, which the fetcher can no longer read.
    pub fn cleanup(&self, window: &TimeWindow, chunk_secs: i64) -> usize {
        let chunk_secs = chunk_secs.max(1);
        let min_keep_start = align_down(window.from.timestamp(), chunk_secs);
        let Ok(read_dir) = std::fs::read_dir(&self.dir) else {
            return 0;
        };

        let mut removed = 0;
        for entry in read_dir.flatten() {
            let name = entry.file_name();
            let Some((file_secs, chunk_start)) = name.to_str().and_then(parse_chunk_name) else {
                continue;
            };
            if file_secs != chunk_secs || chunk_start + file_secs < min_keep_start {
                match std::fs::remove_file(entry.path()) {
                    Ok(()) => removed += 1,
                    Err(e) => tracing::debug!(
                        "[HISTORY] Could not remove stale chunk {}: {}",
                        entry.path().display(),
                        e
                    ),
                }
            }
        }
        removed
    }
}

const CHUNK_FILE_PREFIX: &str = "history_";

fn encode_item_id(item_id: &str) -> String {
    item_id.bytes().map(|b| format!("{:02x}", b)).collect()
}

/// `(chunk secs, chunk start)` of a cache file name.
fn parse_chunk_name(file_name: &str) -> Option<(i64, i64)> {
    let base = file_name
        .strip_prefix(CHUNK_FILE_PREFIX)?
        .strip_suffix(".json")?;
    let mut parts = base.rsplitn(3, '_');
    let start = parts.next()?.parse().ok()?;
    let secs = parts.next()?.parse().ok()?;
    let item = parts.next()?;
    if item.is_empty() || !item.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Some((secs, start))
}

/// Fetches an item's history one chunk at a time.
pub struct HistoryFetcher<'a> {
    source: &'a dyn TelemetrySource,
    chunk_secs: i64,
    max_rows: usize,
    cache: Option<ChunkCache>,
}

impl<'a> HistoryFetcher<'a> {
    pub fn new(source: &'a dyn TelemetrySource, chunk_secs: i64, max_rows: usize) -> Self {
        Self {
            source,
            chunk_secs: chunk_secs.max(1),
            max_rows,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Option<ChunkCache>) -> Self {
        self.cache = cache;
        self
    }

    /// All entries of the chunks overlapping `window`. A failed chunk is
    /// logged and skipped. Only complete pages of chunks that ended before
    /// `window.till` are cached; partial chunks and full pages are refetched.
    pub fn fetch(&self, item_id: &str, window: &TimeWindow) -> FetchOutcome {
        let mut outcome = FetchOutcome::default();

        for chunk_start in window.chunk_starts(self.chunk_secs) {
            if let Some(entries) = self
                .cache
                .as_ref()
                .and_then(|c| c.read(item_id, self.chunk_secs, chunk_start))
            {
                outcome.cached_chunks += 1;
                outcome.entries.extend(entries);
                continue;
            }

            let from = timestamp(chunk_start);
            // Chunks are half-open so boundary entries are fetched once.
            let chunk_end = timestamp(chunk_start + self.chunk_secs);
            let till = chunk_end - Duration::seconds(1);

            match self.source.fetch_history(item_id, from, till, self.max_rows) {
                Ok(entries) => {
                    let truncated = entries.len() >= self.max_rows;
                    if truncated {
                        tracing::warn!(
                            "[HISTORY] Item {} chunk {} hit the {} row limit; data may be truncated",
                            item_id,
                            chunk_start,
                            self.max_rows
                        );
                    }
                    // A full page is never cached so a later pass can ask again.
                    let cacheable = chunk_end <= window.till && !truncated;
                    if let Some(cache) = self.cache.as_ref().filter(|_| cacheable) {
                        if let Err(e) = cache.write(item_id, self.chunk_secs, chunk_start, &entries) {
                            tracing::warn!("[HISTORY] {:#}", e);
                        }
                    }
                    outcome.fetched_chunks += 1;
                    outcome.entries.extend(entries);
                }
                Err(e) => {
                    tracing::warn!(
                        "[HISTORY] history fetch failed for item {} chunk {}: {}",
                        item_id,
                        chunk_start,
                        e
                    );
                    outcome.failed_chunks += 1;
                }
            }
        }

        outcome
    }
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Entries gathered for one item plus per-chunk bookkeeping.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub entries: Vec<TelemetryEntry>,
    pub fetched_chunks: usize,
    pub cached_chunks: usize,
    pub failed_chunks: usize,
}

impl FetchOutcome {
    /// True when every chunk failed, i.e. the item produced no data at all.
    pub fn all_failed(&self) -> bool {
        self.failed_chunks > 0 && self.fetched_chunks == 0 && self.cached_chunks == 0
    }
}
