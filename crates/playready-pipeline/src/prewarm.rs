//! Background MP4 prewarming for library files that stopped changing.
//!
//! # Design
//! - A scanner observes `(size, mtime)` per file and only queues files that
//!   kept the same pair for the dwell time.
//! - The queue is bounded; a full queue drops the candidate and rolls back its
//!   membership marker so a later scan can retry.
//! - One worker drains the queue and waits for each conversion to finish
//!   before taking the next item.
//! - Scans walk the library on the blocking pool.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use playready_media_core::{JobKey, JobKind, JobState, MediaError};
use playready_telemetry::Metrics;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::orchestrator::ConversionOrchestrator;

/// Scanner and worker tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrewarmSettings {
    /// Delay between library scans.
    pub interval: Duration,
    /// How long a file must stay unchanged before it is queued.
    pub stable_for: Duration,
    /// Bounded queue capacity.
    pub queue_capacity: usize,
    /// Registry poll interval while the worker waits for a conversion.
    pub completion_poll: Duration,
}

impl Default for PrewarmSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(45),
            stable_for: Duration::from_secs(60),
            queue_capacity: 512,
            completion_poll: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Observation {
    size: u64,
    modified_at: DateTime<Utc>,
    first_seen: Instant,
}

#[derive(Debug, Default)]
struct PrewarmState {
    observed: HashMap<String, Observation>,
    queued: HashSet<String>,
}

/// Scanner plus worker feeding the MP4 orchestrator.
#[derive(Clone)]
pub struct Prewarmer {
    inner: Arc<PrewarmInner>,
}

struct PrewarmInner {
    orchestrator: ConversionOrchestrator,
    metrics: Metrics,
    settings: PrewarmSettings,
    state: Mutex<PrewarmState>,
    sender: mpsc::Sender<String>,
    receiver: Mutex<Option<mpsc::Receiver<String>>>,
}

impl Prewarmer {
    /// Build a prewarmer over `orchestrator`.
    #[must_use]
    pub fn new(
        orchestrator: ConversionOrchestrator,
        metrics: Metrics,
        settings: PrewarmSettings,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(settings.queue_capacity.max(1));
        Self {
            inner: Arc::new(PrewarmInner {
                orchestrator,
                metrics,
                settings,
                state: Mutex::new(PrewarmState::default()),
                sender,
                receiver: Mutex::new(Some(receiver)),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, PrewarmState> {
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("prewarm state mutex poisoned; continuing with recovered guard");
                poisoned.into_inner()
            }
        }
    }

    /// Scan the library once at `now`, returning how many files were queued.
    pub fn scan_once(&self, now: Instant) -> usize {
        let resources = match self.inner.orchestrator.catalog().list() {
            Ok(resources) => resources,
            Err(err) => {
                warn!(error = %err.describe(), "prewarm scan failed");
                return 0;
            }
        };

        let mut seen = HashSet::with_capacity(resources.len());
        let mut queued = 0;
        for resource in resources {
            seen.insert(resource.path.clone());
            if resource.extension == "mp4" {
                continue;
            }
            if self.inner.orchestrator.mp4_ready(&resource.path) {
                continue;
            }
            let key = JobKey::new(JobKind::Mp4, resource.path.clone());
            if self.inner.orchestrator.jobs().is_running(&key) {
                continue;
            }
            let Some(first_seen) =
                self.observe(&resource.path, resource.size, resource.modified_at, now)
            else {
                continue;
            };
            if now.saturating_duration_since(first_seen) < self.inner.settings.stable_for {
                continue;
            }
            if self.enqueue(resource.path) {
                queued += 1;
            }
        }

        let mut state = self.state();
        state.observed.retain(|path, _| seen.contains(path));
        state.queued.retain(|path| seen.contains(path));
        queued
    }

    /// Record the current `(size, mtime)` pair. Returns the first-seen instant
    /// when the pair is unchanged since the previous scan.
    fn observe(
        &self,
        path: &str,
        size: u64,
        modified_at: DateTime<Utc>,
        now: Instant,
    ) -> Option<Instant> {
        let mut state = self.state();
        match state.observed.get(path) {
            Some(prev) if prev.size == size && prev.modified_at == modified_at => {
                Some(prev.first_seen)
            }
            _ => {
                state.observed.insert(
                    path.to_string(),
                    Observation {
                        size,
                        modified_at,
                        first_seen: now,
                    },
                );
                None
            }
        }
    }

    fn enqueue(&self, path: String) -> bool {
        if !self.state().queued.insert(path.clone()) {
            return false;
        }
        match self.inner.sender.try_send(path) {
            Ok(()) => {
                self.inner.metrics.inc_prewarm_enqueued();
                true
            }
            Err(TrySendError::Full(path)) => {
                self.state().queued.remove(&path);
                self.inner.metrics.inc_prewarm_dropped();
                warn!(path = %path, "prewarm queue full; skipping");
                false
            }
            Err(TrySendError::Closed(path)) => {
                self.state().queued.remove(&path);
                debug!(path = %path, "prewarm queue closed");
                false
            }
        }
    }

    /// Spawn the periodic scanner. The first scan runs immediately.
    #[must_use]
    pub fn spawn_scanner(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let prewarmer = self.clone();
        tokio::spawn(async move {
            let settings = prewarmer.inner.settings;
            info!(
                interval_secs = settings.interval.as_secs(),
                stable_secs = settings.stable_for.as_secs(),
                "mp4 prewarm scanner started"
            );
            let mut ticker = tokio::time::interval(settings.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    now = ticker.tick() => {
                        let scanner = prewarmer.clone();
                        match tokio::task::spawn_blocking(move || scanner.scan_once(now)).await {
                            Ok(0) => {}
                            Ok(queued) => debug!(queued, "prewarm candidates queued"),
                            Err(err) => warn!(error = %err, "prewarm scan task failed"),
                        }
                    }
                }
            }
            debug!("mp4 prewarm scanner stopped");
        })
    }

    /// Spawn the queue worker. Only the first call receives the queue.
    #[must_use]
    pub fn spawn_worker(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let receiver = match self.inner.receiver.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => {
                error!("prewarm receiver mutex poisoned; continuing with recovered guard");
                poisoned.into_inner().take()
            }
        };
        let prewarmer = self.clone();
        tokio::spawn(async move {
            let Some(mut receiver) = receiver else {
                warn!("prewarm worker already running");
                return;
            };
            loop {
                let path = tokio::select! {
                    () = cancel.cancelled() => break,
                    item = receiver.recv() => match item {
                        Some(path) => path,
                        None => break,
                    },
                };
                prewarmer.process(&path, &cancel).await;
            }
            debug!("mp4 prewarm worker stopped");
        })
    }

    async fn process(&self, path: &str, cancel: &CancellationToken) {
        self.state().queued.remove(path);
        self.inner.metrics.dec_prewarm_queue();

        match self.inner.orchestrator.start_mp4(path).await {
            Ok(status) if status.state == JobState::Processing => {
                info!(path, "mp4 prewarm started");
                self.wait_for_completion(&JobKey::new(JobKind::Mp4, path), cancel)
                    .await;
            }
            Ok(_) | Err(MediaError::NotFound { .. }) => {}
            Err(err) => warn!(path, error = %err.describe(), "mp4 prewarm skipped"),
        }
    }

    async fn wait_for_completion(&self, key: &JobKey, cancel: &CancellationToken) {
        while self.inner.orchestrator.jobs().is_running(key) {
            tokio::select! {
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(self.inner.settings.completion_poll) => {}
            }
        }
    }
}
