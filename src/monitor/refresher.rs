//! Background topology refresher
//!
//! Runs a live pass immediately and then on a fixed interval, publishing each
//! successful result to the topology cache. Readers never wait on it.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::events::{MapEvent, RefresherStatus};
use crate::config::{MapSettings, MAX_REFRESH_SECONDS, MIN_REFRESH_SECONDS};
use crate::sources::Sources;
use crate::topology::TopologyCache;
use crate::workflow::refresh_topology;

/// Event callback type
pub type EventCallback = Arc<dyn Fn(MapEvent) + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cancellation token and join handle of one spawned loop.
#[derive(Default)]
pub(crate) struct TaskSlot {
    inner: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl TaskSlot {
    pub(crate) fn is_occupied(&self) -> bool {
        lock(&self.inner).as_ref().is_some_and(|(_, handle)| !handle.is_finished())
    }

    pub(crate) fn set(&self, token: CancellationToken, handle: JoinHandle<()>) {
        *lock(&self.inner) = Some((token, handle));
    }

    pub(crate) fn cancel(&self) {
        if let Some((token, _)) = lock(&self.inner).as_ref() {
            token.cancel();
        }
    }

    /// Cancel and wait for the loop to exit.
    pub(crate) async fn shutdown(&self) {
        let taken = lock(&self.inner).take();
        if let Some((token, handle)) = taken {
            token.cancel();
            if let Err(e) = handle.await {
                log_warn!("[MONITOR] Background task ended abnormally: {}", e);
            }
        }
    }
}

/// Keeps the topology cache fresh.
pub struct TopologyRefresher {
    sources: Sources,
    settings: Arc<MapSettings>,
    cache: TopologyCache,
    is_running: Arc<AtomicBool>,
    interval_seconds: Arc<AtomicU64>,
    refresh_count: Arc<AtomicU32>,
    failure_count: Arc<AtomicU32>,
    task: TaskSlot,
}

impl TopologyRefresher {
    pub fn new(sources: Sources, settings: MapSettings, cache: TopologyCache) -> Self {
        let interval = settings
            .refresh_interval
            .as_secs()
            .clamp(MIN_REFRESH_SECONDS, MAX_REFRESH_SECONDS);
        Self {
            sources,
            settings: Arc::new(settings),
            cache,
            is_running: Arc::new(AtomicBool::new(false)),
            interval_seconds: Arc::new(AtomicU64::new(interval)),
            refresh_count: Arc::new(AtomicU32::new(0)),
            failure_count: Arc::new(AtomicU32::new(0)),
            task: TaskSlot::default(),
        }
    }

    pub fn cache(&self) -> &TopologyCache {
        &self.cache
    }

    /// Start the refresh loop. Must be called from within a tokio runtime.
    /// Starting an already running refresher does nothing.
    pub fn start<F>(&self, callback: F)
    where
        F: Fn(MapEvent) + Send + Sync + 'static,
    {
        if self.task.is_occupied() {
            log_debug!("[REFRESH] Refresher already running");
            return;
        }

        let callback: EventCallback = Arc::new(callback);
        let interval_secs = self.interval_seconds.load(Ordering::SeqCst);
        self.is_running.store(true, Ordering::SeqCst);
        self.refresh_count.store(0, Ordering::SeqCst);
        self.failure_count.store(0, Ordering::SeqCst);

        callback(MapEvent::RefresherStarted {
            interval_seconds: interval_secs,
        });

        let token = CancellationToken::new();
        let loop_token = token.clone();
        let sources = self.sources.clone();
        let settings = Arc::clone(&self.settings);
        let cache = self.cache.clone();
        let is_running = Arc::clone(&self.is_running);
        let refresh_count = Arc::clone(&self.refresh_count);
        let failure_count = Arc::clone(&self.failure_count);
        let cb = Arc::clone(&callback);

        let handle = tokio::spawn(async move {
            log_info!("[REFRESH] Topology refresher started (interval: {}s)", interval_secs);

            // First tick fires immediately.
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let current = refresh_count.fetch_add(1, Ordering::SeqCst) + 1;
                (*cb)(MapEvent::RefreshStarted {
                    refresh_number: current,
                });
                let start = Instant::now();

                let pass_sources = sources.clone();
                let pass_settings = Arc::clone(&settings);
                let pass_cache = cache.clone();
                let result = tokio::task::spawn_blocking(move || {
                    refresh_topology(&pass_sources, &pass_settings, &pass_cache, Utc::now())
                })
                .await;

                let outcome = match result {
                    Ok(Ok(snapshot)) => Ok(snapshot),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(e) => Err(format!("refresh task error: {}", e)),
                };

                match outcome {
                    Ok(snapshot) => {
                        let duration = start.elapsed().as_millis() as u64;
                        log_debug!(
                            "[REFRESH] Refresh #{} complete: {} nodes in {}ms",
                            current,
                            snapshot.graph.nodes().len(),
                            duration
                        );
                        (*cb)(MapEvent::RefreshCompleted {
                            refresh_number: current,
                            nodes: snapshot.graph.nodes().len(),
                            edges: snapshot.graph.edges().len(),
                            duration_ms: duration,
                        });
                    }
                    Err(message) => {
                        failure_count.fetch_add(1, Ordering::SeqCst);
                        log_warn!("[REFRESH] Refresh #{} failed: {}", current, message);
                        (*cb)(MapEvent::RefreshFailed {
                            refresh_number: current,
                            message,
                        });
                    }
                }
            }

            is_running.store(false, Ordering::SeqCst);
            log_info!("[REFRESH] Topology refresher stopped");
            (*cb)(MapEvent::RefresherStopped);
        });

        self.task.set(token, handle);
    }

    /// Ask the loop to stop after the pass in flight, if any.
    pub fn stop(&self) {
        self.task.cancel();
    }

    /// Stop and wait for the loop to exit.
    pub async fn shutdown(&self) {
        self.task.shutdown().await;
        self.is_running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> RefresherStatus {
        let snapshot = self.cache.snapshot();
        RefresherStatus {
            is_running: self.is_running(),
            interval_seconds: self.interval_seconds.load(Ordering::SeqCst),
            refresh_count: self.refresh_count.load(Ordering::SeqCst),
            failure_count: self.failure_count.load(Ordering::SeqCst),
            last_refresh_time: snapshot.refreshed_at.map(|t| t.to_rfc3339()),
            nodes: snapshot.graph.nodes().len(),
            edges: snapshot.graph.edges().len(),
        }
    }
}
