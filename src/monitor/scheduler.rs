//! Daily export scheduler
//!
//! Runs one export pass at start, then once a day at the configured local
//! hour. Independent of the topology cache.

use chrono::{DateTime, Days, Local, TimeZone, Utc};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::events::MapEvent;
use super::refresher::{EventCallback, TaskSlot};
use crate::config::MapSettings;
use crate::sources::Sources;
use crate::workflow::run_export_pass;

/// Next instant strictly after `now` whose local wall clock reads `hour:00`.
/// Days where that time does not exist (DST gap) are skipped.
pub fn next_daily_run<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32) -> DateTime<Tz> {
    let hour = hour.min(23);
    let tz = now.timezone();
    let today = now.date_naive();

    for offset in 0..3 {
        let candidate = (today + Days::new(offset))
            .and_hms_opt(hour, 0, 0)
            .and_then(|naive| tz.from_local_datetime(&naive).earliest());
        if let Some(at) = candidate {
            if at > *now {
                return at;
            }
        }
    }
    now.clone() + chrono::Duration::hours(24)
}

/// Runs the export pass on its daily schedule.
pub struct ExportScheduler {
    sources: Sources,
    settings: Arc<MapSettings>,
    run_count: Arc<AtomicU32>,
    task: TaskSlot,
}

impl ExportScheduler {
    pub fn new(sources: Sources, settings: MapSettings) -> Self {
        Self {
            sources,
            settings: Arc::new(settings),
            run_count: Arc::new(AtomicU32::new(0)),
            task: TaskSlot::default(),
        }
    }

    pub fn run_count(&self) -> u32 {
        self.run_count.load(Ordering::SeqCst)
    }

    /// Start the schedule. Must be called from within a tokio runtime.
    pub fn start<F>(&self, callback: F)
    where
        F: Fn(MapEvent) + Send + Sync + 'static,
    {
        if self.task.is_occupied() {
            log_debug!("[SCHEDULER] Export scheduler already running");
            return;
        }

        let cb: EventCallback = Arc::new(callback);
        let token = CancellationToken::new();
        let loop_token = token.clone();
        let sources = self.sources.clone();
        let settings = Arc::clone(&self.settings);
        let run_count = Arc::clone(&self.run_count);

        let handle = tokio::spawn(async move {
            log_info!(
                "[SCHEDULER] Export scheduler started (daily at {:02}:00 local)",
                settings.export_hour
            );

            loop {
                let current = run_count.fetch_add(1, Ordering::SeqCst) + 1;
                (*cb)(MapEvent::ExportStarted { run_number: current });
                let start = Instant::now();

                let pass_sources = sources.clone();
                let pass_settings = Arc::clone(&settings);
                let result = tokio::task::spawn_blocking(move || {
                    run_export_pass(&pass_sources, &pass_settings, Utc::now())
                })
                .await;

                match result {
                    Ok(Ok(summary)) => (*cb)(MapEvent::ExportCompleted {
                        run_number: current,
                        files_written: summary.files_written.len(),
                        failures: summary.failures.len(),
                        duration_ms: start.elapsed().as_millis() as u64,
                    }),
                    Ok(Err(e)) => {
                        log_warn!("[SCHEDULER] Export run #{} failed: {}", current, e);
                        (*cb)(MapEvent::ExportFailed {
                            run_number: current,
                            message: e.to_string(),
                        });
                    }
                    Err(e) => {
                        log_error!("[SCHEDULER] Export run #{} panicked: {}", current, e);
                        (*cb)(MapEvent::ExportFailed {
                            run_number: current,
                            message: format!("export task error: {}", e),
                        });
                    }
                }

                let now = Local::now();
                let next = next_daily_run(&now, settings.export_hour);
                (*cb)(MapEvent::ExportScheduled {
                    next_run: next.to_rfc3339(),
                });
                let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                log_debug!("[SCHEDULER] Next export at {} (in {}s)", next, wait.as_secs());

                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {}
                }
            }

            log_info!("[SCHEDULER] Export scheduler stopped");
            (*cb)(MapEvent::SchedulerStopped);
        });

        self.task.set(token, handle);
    }

    pub fn stop(&self) {
        self.task.cancel();
    }

    /// Stop and wait for the loop to exit.
    pub async fn shutdown(&self) {
        self.task.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::FixtureSource;
    use std::sync::Mutex;

    fn utc(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_next_run_later_today() {
        assert_eq!(next_daily_run(&utc(1, 30), 2), utc(2, 0));
    }

    #[test]
    fn test_next_run_tomorrow_when_hour_passed() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 2, 2, 0, 0).unwrap();
        assert_eq!(next_daily_run(&utc(2, 0), 2), expected);
        assert_eq!(next_daily_run(&utc(23, 59), 2), expected);
    }

    #[test]
    fn test_next_run_crosses_month_end() {
        let now = Utc.with_ymd_and_hms(2024, 2, 29, 5, 0, 0).unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 2, 0, 0).unwrap();
        assert_eq!(next_daily_run(&now, 2), expected);
    }

    #[tokio::test]
    async fn test_runs_once_at_start() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = MapSettings::default_values().with_report_dir(tmp.path().to_path_buf());
        let fixture = FixtureSource::new()
            .with_host("web1", &["10.0.0.2"])
            .with_item("item-web1", "web1")
            .with_entry(
                "item-web1",
                Utc::now() - chrono::Duration::hours(2),
                r#"{"incomingconnections":[{"localip":"10.0.0.2","localport":22,"remoteip":"10.0.0.7"}]}"#,
            );
        let scheduler = ExportScheduler::new(Sources::from_single(Arc::new(fixture)), settings);
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);

        scheduler.start(move |e: MapEvent| sink.lock().unwrap().push(e));
        for _ in 0..500 {
            let scheduled = events
                .lock()
                .unwrap()
                .iter()
                .any(|e| matches!(e, MapEvent::ExportScheduled { .. }));
            if scheduled {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        scheduler.shutdown().await;

        assert_eq!(scheduler.run_count(), 1);
        let events = events.lock().unwrap();
        assert!(events
            .iter()
            .any(|e| matches!(e, MapEvent::ExportCompleted { files_written: 12, failures: 0, .. })));
        assert!(matches!(events.last(), Some(MapEvent::SchedulerStopped)));
        assert!(tmp.path().join("network_blueprint_per_host.drawio").is_file());
    }
}
