//! Configuration for the network map engine
//!
//! Compile-time defaults with `NETWORK_MAP_*` environment overrides.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::network::PrivateRanges;

// ====== Live topology ======

/// Default interval between live topology refreshes (seconds)
pub const DEFAULT_REFRESH_SECONDS: u64 = 30 * 60;

/// Minimum refresh interval (seconds)
pub const MIN_REFRESH_SECONDS: u64 = 10;

/// Maximum refresh interval (seconds)
pub const MAX_REFRESH_SECONDS: u64 = 86_400;

/// Telemetry window used for the live graph (seconds)
pub const LIVE_WINDOW_SECONDS: i64 = 24 * 3600;

// ====== Telemetry history ======

/// Export window length in days
pub const EXPORT_WINDOW_DAYS: i64 = 30;

/// Width of one history fetch chunk (seconds)
pub const HISTORY_CHUNK_SECONDS: i64 = 24 * 3600;

/// Maximum rows the collector returns per history call
pub const HISTORY_MAX_ROWS: usize = 100_000;

// ====== Export ======

/// Local hour at which the daily export runs
pub const EXPORT_HOUR: u32 = 2;

/// Hosts never given a diagram page nor drawn as a peer
pub const EXCLUDED_HOSTS: &[&str] = &["Zabbix server"];

/// RFC 1918 ranges treated as internal
pub const PRIVATE_RANGES: &[&str] = &["10.0.0.0/8", "192.168.0.0/16", "172.16.0.0/12"];

// ====== Layout ======

/// Node footprint width in diagram units
pub const NODE_WIDTH: f64 = 160.0;

/// Node footprint height in diagram units
pub const NODE_HEIGHT: f64 = 80.0;

/// Extra clearance kept between separated nodes
pub const NODE_PADDING: f64 = 40.0;

/// Cap on collision-resolution passes
pub const COLLISION_MAX_ITERATIONS: usize = 800;

/// Spring layout iterations
pub const SPRING_ITERATIONS: usize = 200;

/// Spring layout optimal distance (unit square coordinates)
pub const SPRING_K: f64 = 3.0;

/// Seed for the spring layout's initial placement
pub const SPRING_SEED: u64 = 42;

/// Canvas scale applied to normalised coordinates
pub const CANVAS_SCALE: f64 = 800.0;

/// Offset from the page origin
pub const CANVAS_MARGIN: f64 = 50.0;

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse_u64(name: &str, default: u64, min: u64, max: u64) -> u64 {
    match env_var(name).and_then(|v| v.parse::<u64>().ok()) {
        Some(v) => v.clamp(min, max),
        None => default,
    }
}

fn env_parse_i64(name: &str, default: i64, min: i64, max: i64) -> i64 {
    match env_var(name).and_then(|v| v.parse::<i64>().ok()) {
        Some(v) => v.clamp(min, max),
        None => default,
    }
}

fn env_parse_usize(name: &str, default: usize, min: usize, max: usize) -> usize {
    match env_var(name).and_then(|v| v.parse::<usize>().ok()) {
        Some(v) => v.clamp(min, max),
        None => default,
    }
}

fn env_parse_list(name: &str) -> Option<Vec<String>> {
    let items: Vec<String> = env_var(name)?
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

/// Log directory override.
/// Env: `NETWORK_MAP_LOG_DIR`
pub fn log_dir_override() -> Option<PathBuf> {
    env_var("NETWORK_MAP_LOG_DIR").map(PathBuf::from)
}

/// Runtime-tunable refresh interval.
/// Env: `NETWORK_MAP_REFRESH_SECONDS`
pub fn refresh_interval() -> Duration {
    Duration::from_secs(env_parse_u64(
        "NETWORK_MAP_REFRESH_SECONDS",
        DEFAULT_REFRESH_SECONDS,
        MIN_REFRESH_SECONDS,
        MAX_REFRESH_SECONDS,
    ))
}

/// Runtime-tunable report directory.
/// Env: `NETWORK_MAP_REPORT_DIR`
pub fn report_dir() -> PathBuf {
    env_var("NETWORK_MAP_REPORT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("netmap")
                .join("reports")
        })
}

/// Runtime-tunable history chunk cache directory. Defaults to `<report_dir>/cache`.
/// Env: `NETWORK_MAP_CACHE_DIR`
pub fn cache_dir(report_dir: &std::path::Path) -> PathBuf {
    env_var("NETWORK_MAP_CACHE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| report_dir.join("cache"))
}

/// Everything one live or export pass needs.
#[derive(Debug, Clone)]
pub struct MapSettings {
    pub refresh_interval: Duration,
    pub live_window_secs: i64,
    pub export_days: i64,
    pub history_chunk_secs: i64,
    pub history_max_rows: usize,
    pub report_dir: PathBuf,
    /// `None` disables the on-disk history chunk cache.
    pub cache_dir: Option<PathBuf>,
    pub export_hour: u32,
    pub excluded_hosts: BTreeSet<String>,
    pub private_ranges: PrivateRanges,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self::from_env()
    }
}

impl MapSettings {
    /// Built-in defaults, ignoring the environment.
    pub fn default_values() -> Self {
        Self {
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_SECONDS),
            live_window_secs: LIVE_WINDOW_SECONDS,
            export_days: EXPORT_WINDOW_DAYS,
            history_chunk_secs: HISTORY_CHUNK_SECONDS,
            history_max_rows: HISTORY_MAX_ROWS,
            report_dir: PathBuf::from("reports"),
            cache_dir: None,
            export_hour: EXPORT_HOUR,
            excluded_hosts: EXCLUDED_HOSTS.iter().map(|h| h.to_string()).collect(),
            private_ranges: PrivateRanges::default(),
        }
    }

    pub fn from_env() -> Self {
        let report_dir = report_dir();
        let cache_dir = Some(cache_dir(&report_dir));

        let excluded_hosts = env_parse_list("NETWORK_MAP_EXCLUDED_HOSTS")
            .map(|hosts| hosts.into_iter().collect())
            .unwrap_or_else(|| EXCLUDED_HOSTS.iter().map(|h| h.to_string()).collect());

        let private_ranges = match env_parse_list("NETWORK_MAP_PRIVATE_RANGES") {
            Some(cidrs) => PrivateRanges::parse(&cidrs).unwrap_or_else(|e| {
                tracing::warn!("Ignoring NETWORK_MAP_PRIVATE_RANGES: {}", e);
                PrivateRanges::default()
            }),
            None => PrivateRanges::default(),
        };

        Self {
            refresh_interval: refresh_interval(),
            live_window_secs: LIVE_WINDOW_SECONDS,
            export_days: env_parse_i64("NETWORK_MAP_EXPORT_DAYS", EXPORT_WINDOW_DAYS, 1, 365),
            history_chunk_secs: env_parse_i64(
                "NETWORK_MAP_HISTORY_CHUNK_SECONDS",
                HISTORY_CHUNK_SECONDS,
                600,
                7 * 86_400,
            ),
            history_max_rows: env_parse_usize(
                "NETWORK_MAP_HISTORY_MAX_ROWS",
                HISTORY_MAX_ROWS,
                100,
                1_000_000,
            ),
            report_dir,
            cache_dir,
            export_hour: env_parse_u64("NETWORK_MAP_EXPORT_HOUR", EXPORT_HOUR as u64, 0, 23) as u32,
            excluded_hosts,
            private_ranges,
        }
    }

    pub fn with_report_dir(mut self, report_dir: PathBuf) -> Self {
        self.report_dir = report_dir;
        self
    }

    pub fn with_cache_dir(mut self, cache_dir: Option<PathBuf>) -> Self {
        self.cache_dir = cache_dir;
        self
    }

    pub fn with_refresh_interval(mut self, refresh_interval: Duration) -> Self {
        self.refresh_interval = refresh_interval;
        self
    }

    pub fn with_excluded_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_excluded(&self, host: &str) -> bool {
        self.excluded_hosts.contains(host)
    }
}
