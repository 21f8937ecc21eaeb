//! In-memory conversion job registry.
//!
//! # Design
//! - A cloneable handle over one mutex-guarded map; entries live for the process lifetime.
//! - `try_start` is the only way the orchestrator claims a key, so two
//!   concurrent kickoffs cannot both launch a worker.
//! - Progress only moves forward while a job runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use playready_media_core::{JobKey, JobState};
use tracing::error;

/// Point-in-time view of a job entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobSnapshot {
    /// Current state; `Idle` for unknown keys.
    pub state: JobState,
    /// Last failure text.
    pub error: Option<String>,
    /// Progress percentage in `0..=100`.
    pub progress: u8,
}

/// Shared registry of conversion jobs keyed by kind and path.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<Mutex<HashMap<JobKey, JobSnapshot>>>,
}

impl JobRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobKey, JobSnapshot>> {
        match self.jobs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("job registry mutex poisoned; continuing with recovered guard");
                poisoned.into_inner()
            }
        }
    }

    /// Mark `key` as processing with zero progress, clearing any previous error.
    pub fn start(&self, key: &JobKey) {
        self.lock().insert(
            key.clone(),
            JobSnapshot {
                state: JobState::Processing,
                error: None,
                progress: 0,
            },
        );
    }

    /// Atomically start `key` unless it is already processing.
    ///
    /// Returns `false` without touching the entry when another worker owns the key.
    #[must_use]
    pub fn try_start(&self, key: &JobKey) -> bool {
        let mut jobs = self.lock();
        if jobs
            .get(key)
            .is_some_and(|entry| entry.state == JobState::Processing)
        {
            return false;
        }
        jobs.insert(
            key.clone(),
            JobSnapshot {
                state: JobState::Processing,
                error: None,
                progress: 0,
            },
        );
        true
    }

    /// Mark `key` ready with full progress.
    pub fn mark_ready(&self, key: &JobKey) {
        let mut jobs = self.lock();
        let entry = jobs.entry(key.clone()).or_default();
        entry.state = JobState::Ready;
        entry.progress = 100;
    }

    /// Mark `key` failed and record the error text. Progress is kept.
    pub fn mark_failed(&self, key: &JobKey, error: impl Into<String>) {
        let mut jobs = self.lock();
        let entry = jobs.entry(key.clone()).or_default();
        entry.state = JobState::Failed;
        entry.error = Some(error.into());
    }

    /// Raise the stored progress for `key`; lower values are ignored.
    pub fn report_progress(&self, key: &JobKey, percent: i64) {
        let clamped = u8::try_from(percent.clamp(0, 100)).unwrap_or(100);
        let mut jobs = self.lock();
        let entry = jobs.entry(key.clone()).or_default();
        if clamped > entry.progress {
            entry.progress = clamped;
        }
    }

    /// Snapshot of `key`; unknown keys read as idle with no progress.
    #[must_use]
    pub fn status(&self, key: &JobKey) -> JobSnapshot {
        self.lock().get(key).cloned().unwrap_or_default()
    }

    /// Whether a worker currently owns `key`.
    #[must_use]
    pub fn is_running(&self, key: &JobKey) -> bool {
        self.lock()
            .get(key)
            .is_some_and(|entry| entry.state == JobState::Processing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playready_media_core::JobKind;

    fn key() -> JobKey {
        JobKey::new(JobKind::Mp4, "movies/a.mkv")
    }

    #[test]
    fn unknown_keys_are_idle() {
        let registry = JobRegistry::new();
        assert_eq!(registry.status(&key()), JobSnapshot::default());
        assert!(!registry.is_running(&key()));
    }

    #[test]
    fn try_start_admits_one_owner() {
        let registry = JobRegistry::new();
        assert!(registry.try_start(&key()));
        assert!(!registry.try_start(&key()));
        assert!(registry.is_running(&key()));

        registry.mark_failed(&key(), "exit status 1");
        assert!(registry.try_start(&key()));
        assert_eq!(registry.status(&key()).error, None);
    }

    #[test]
    fn progress_is_clamped_and_monotonic() {
        let registry = JobRegistry::new();
        registry.start(&key());
        registry.report_progress(&key(), 40);
        registry.report_progress(&key(), 10);
        assert_eq!(registry.status(&key()).progress, 40);
        registry.report_progress(&key(), 250);
        assert_eq!(registry.status(&key()).progress, 100);
        registry.report_progress(&key(), -5);
        assert_eq!(registry.status(&key()).progress, 100);
    }

    #[test]
    fn ready_forces_full_progress_and_failure_keeps_it() {
        let registry = JobRegistry::new();
        registry.start(&key());
        registry.report_progress(&key(), 37);
        registry.mark_failed(&key(), "boom");
        let snapshot = registry.status(&key());
        assert_eq!(snapshot.state, JobState::Failed);
        assert_eq!(snapshot.progress, 37);
        assert_eq!(snapshot.error.as_deref(), Some("boom"));

        registry.start(&key());
        registry.mark_ready(&key());
        let snapshot = registry.status(&key());
        assert_eq!(snapshot.state, JobState::Ready);
        assert_eq!(snapshot.progress, 100);
    }

    #[test]
    fn concurrent_claims_produce_a_single_winner() {
        let registry = JobRegistry::new();
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.try_start(&key()))
            })
            .collect();
        let winners = handles
            .into_iter()
            .filter_map(|handle| handle.join().ok())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
