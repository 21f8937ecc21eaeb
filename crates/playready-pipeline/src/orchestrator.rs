//! Conversion orchestration for HLS and MP4 artifacts.
//!
//! # Design
//! - Every kickoff resolves the path, probes the artifact, then claims the job
//!   through [`JobRegistry::try_start`] before touching the output location.
//! - Conversions run on spawned tasks; MP4 work additionally waits on a
//!   semaphore so only a bounded number of encodes run at once.
//! - Failed conversions remove partial output so the next status probe reads idle.
//! - Kickoffs probe and prepare output on the blocking pool, off the async workers.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use playready_media_core::{
    Converter, HlsRequest, JobKey, JobKind, JobState, JobStatus, LiveRequest, MediaCatalog,
    MediaError, MediaResult, Mp4Request, OutputPaths, ProgressSink, ResolvedMedia,
};
use playready_telemetry::Metrics;
use tokio::io::AsyncWrite;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::readiness::{probe_hls, probe_mp4};
use crate::registry::JobRegistry;

/// Tunables for the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Maximum concurrent MP4 conversions.
    pub mp4_concurrency: usize,
    /// Idle timeout used when an HLS conversion follows a growing source.
    pub hls_follow_idle: Duration,
    /// Idle timeout for live streams that do not follow the source.
    pub stream_follow_idle: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            mp4_concurrency: 1,
            hls_follow_idle: Duration::from_secs(120),
            stream_follow_idle: Duration::from_secs(600),
        }
    }
}

/// Coordinates conversions across the catalog, the converter, and the job registry.
#[derive(Clone)]
pub struct ConversionOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    catalog: Arc<dyn MediaCatalog>,
    converter: Arc<dyn Converter>,
    jobs: JobRegistry,
    mp4_gate: Arc<Semaphore>,
    metrics: Metrics,
    settings: OrchestratorSettings,
    shutdown: CancellationToken,
}

impl ConversionOrchestrator {
    /// Build an orchestrator. `shutdown` cancels every conversion it spawns.
    #[must_use]
    pub fn new(
        catalog: Arc<dyn MediaCatalog>,
        converter: Arc<dyn Converter>,
        jobs: JobRegistry,
        metrics: Metrics,
        settings: OrchestratorSettings,
        shutdown: CancellationToken,
    ) -> Self {
        let slots = settings.mp4_concurrency.max(1);
        Self {
            inner: Arc::new(Inner {
                catalog,
                converter,
                jobs,
                mp4_gate: Arc::new(Semaphore::new(slots)),
                metrics,
                settings,
                shutdown,
            }),
        }
    }

    /// Catalog backing this orchestrator.
    #[must_use]
    pub fn catalog(&self) -> &Arc<dyn MediaCatalog> {
        &self.inner.catalog
    }

    /// Job registry shared with the prewarmer.
    #[must_use]
    pub fn jobs(&self) -> &JobRegistry {
        &self.inner.jobs
    }

    /// Artifact locations for `kind` and a normalised relative path.
    #[must_use]
    pub fn output_paths(&self, kind: JobKind, relative: &str) -> OutputPaths {
        self.inner.catalog.output_paths(kind, relative)
    }

    /// Whether the MP4 artifact for `relative` is usable right now.
    #[must_use]
    pub fn mp4_ready(&self, relative: &str) -> bool {
        let paths = self.output_paths(JobKind::Mp4, relative);
        probe_mp4(&paths, self.inner.converter.mp4_version())
    }

    /// Ensure an HLS conversion is running or finished for `raw`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`/`InvalidRequest` from path resolution, `Io` when
    /// the output directory cannot be prepared, and `Backend` if the kickoff task dies.
    pub async fn start_hls(&self, raw: &str, follow: bool) -> MediaResult<JobStatus> {
        let orchestrator = self.clone();
        let raw = raw.to_string();
        run_blocking("start_hls", move || orchestrator.kickoff_hls(&raw, follow)).await
    }

    /// Ensure an MP4 conversion is running or finished for `raw`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for sources that are already MP4, resolution
    /// errors, `Io` when the output location cannot be prepared, and `Backend`
    /// if the kickoff task dies.
    pub async fn start_mp4(&self, raw: &str) -> MediaResult<JobStatus> {
        let orchestrator = self.clone();
        let raw = raw.to_string();
        run_blocking("start_mp4", move || orchestrator.kickoff_mp4(&raw)).await
    }

    fn kickoff_hls(&self, raw: &str, follow: bool) -> MediaResult<JobStatus> {
        let resolved = self.inner.catalog.resolve(raw)?;
        let key = JobKey::new(JobKind::Hls, resolved.relative.clone());
        let paths = self.output_paths(JobKind::Hls, &resolved.relative);
        let probe = probe_hls(&paths, self.inner.converter.hls_version());

        if self.inner.jobs.is_running(&key) {
            let progress = self.inner.jobs.status(&key).progress;
            return Ok(JobStatus::processing(paths.url, probe.ready, progress)
                .with_segments(probe.segments));
        }
        if probe.ready {
            return Ok(JobStatus::ready(paths.url, 100).with_segments(probe.segments));
        }
        if !self.inner.jobs.try_start(&key) {
            return Ok(JobStatus::processing(paths.url, probe.ready, 0)
                .with_segments(probe.segments));
        }

        if let Err(err) = prepare_hls_output(&paths, self.inner.converter.hls_version()) {
            self.inner.jobs.mark_failed(&key, err.describe());
            return Err(err);
        }

        info!(path = %resolved.relative, follow, "hls conversion started");
        let url = paths.url.clone();
        self.spawn_hls(key, resolved, paths, follow);
        Ok(JobStatus::processing(url, false, 0).with_segments(0))
    }

    fn kickoff_mp4(&self, raw: &str) -> MediaResult<JobStatus> {
        let resolved = self.resolve_convertible(raw)?;
        let key = JobKey::new(JobKind::Mp4, resolved.relative.clone());
        let paths = self.output_paths(JobKind::Mp4, &resolved.relative);
        let ready = probe_mp4(&paths, self.inner.converter.mp4_version());

        if self.inner.jobs.is_running(&key) {
            let progress = self.inner.jobs.status(&key).progress;
            return Ok(JobStatus::processing(paths.url, ready, progress));
        }
        if ready {
            return Ok(JobStatus::ready(paths.url, 100));
        }
        if !self.inner.jobs.try_start(&key) {
            return Ok(JobStatus::processing(paths.url, ready, 0));
        }

        if let Err(err) = prepare_mp4_output(&paths) {
            self.inner.jobs.mark_failed(&key, err.describe());
            return Err(err);
        }

        info!(path = %resolved.relative, "mp4 conversion started");
        let url = paths.url.clone();
        self.spawn_mp4(key, resolved, paths);
        Ok(JobStatus::processing(url, false, 0))
    }

    /// Current HLS status for `raw`. Never mutates the filesystem.
    ///
    /// # Errors
    ///
    /// Returns resolution errors for missing or malformed paths.
    pub fn hls_status(&self, raw: &str) -> MediaResult<JobStatus> {
        let resolved = self.inner.catalog.resolve(raw)?;
        let key = JobKey::new(JobKind::Hls, resolved.relative.clone());
        let paths = self.output_paths(JobKind::Hls, &resolved.relative);
        let probe = probe_hls(&paths, self.inner.converter.hls_version());
        let job = self.inner.jobs.status(&key);

        let status = match job.state {
            JobState::Failed => {
                JobStatus::failed(paths.url, job.error.unwrap_or_default(), job.progress)
            }
            JobState::Processing => {
                JobStatus::processing(paths.url, probe.ready, job.progress)
            }
            _ if probe.ready => JobStatus::ready(paths.url, 100),
            _ => JobStatus::idle(paths.url, job.progress),
        };
        Ok(status.with_segments(probe.segments))
    }

    /// Current MP4 status for `raw`. Never mutates the filesystem.
    ///
    /// # Errors
    ///
    /// Returns resolution errors for missing or malformed paths.
    pub fn mp4_status(&self, raw: &str) -> MediaResult<JobStatus> {
        let resolved = self.inner.catalog.resolve(raw)?;
        let key = JobKey::new(JobKind::Mp4, resolved.relative.clone());
        let paths = self.output_paths(JobKind::Mp4, &resolved.relative);
        let ready = probe_mp4(&paths, self.inner.converter.mp4_version());
        let job = self.inner.jobs.status(&key);

        Ok(match job.state {
            JobState::Failed => {
                JobStatus::failed(paths.url, job.error.unwrap_or_default(), job.progress)
            }
            JobState::Processing => {
                JobStatus::processing(paths.url, ready, job.progress)
            }
            _ if ready => JobStatus::ready(paths.url, 100),
            _ => JobStatus::idle(paths.url, job.progress),
        })
    }

    /// Whether an MP4 conversion is running for `raw`.
    ///
    /// # Errors
    ///
    /// Returns resolution errors for missing or malformed paths.
    pub fn is_mp4_processing(&self, raw: &str) -> MediaResult<bool> {
        let resolved = self.inner.catalog.resolve(raw)?;
        Ok(self
            .inner
            .jobs
            .is_running(&JobKey::new(JobKind::Mp4, resolved.relative)))
    }

    /// Path of the converted MP4 for `raw`, when it is ready to serve.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for sources that are already MP4 and
    /// resolution errors for missing or malformed paths.
    pub fn mp4_output(&self, raw: &str) -> MediaResult<Option<PathBuf>> {
        let resolved = self.resolve_convertible(raw)?;
        let paths = self.output_paths(JobKind::Mp4, &resolved.relative);
        Ok(probe_mp4(&paths, self.inner.converter.mp4_version()).then_some(paths.artifact))
    }

    /// Stream fragmented MP4 for `raw` into `out` until the source is exhausted.
    ///
    /// Following streams never time out; otherwise the configured stream idle applies.
    ///
    /// # Errors
    ///
    /// Returns resolution errors before any bytes are written and `Backend`
    /// errors when the converter fails.
    pub async fn stream_live(
        &self,
        raw: &str,
        follow: bool,
        out: &mut (dyn AsyncWrite + Send + Unpin),
        cancel: CancellationToken,
    ) -> MediaResult<()> {
        let resolved = self.inner.catalog.resolve(raw)?;
        let idle_timeout = if follow {
            Duration::ZERO
        } else {
            self.inner.settings.stream_follow_idle
        };
        let request = LiveRequest {
            input: resolved.full,
            follow,
            idle_timeout,
        };
        self.inner
            .converter
            .stream_fragmented_mp4(request, out, cancel)
            .await
    }

    fn resolve_convertible(&self, raw: &str) -> MediaResult<ResolvedMedia> {
        let resolved = self.inner.catalog.resolve(raw)?;
        if resolved.extension() == "mp4" {
            return Err(MediaError::invalid(
                "path",
                "unsupported file type",
                resolved.relative,
            ));
        }
        Ok(resolved)
    }

    fn spawn_hls(&self, key: JobKey, resolved: ResolvedMedia, paths: OutputPaths, follow: bool) {
        let inner = Arc::clone(&self.inner);
        inner.metrics.conversion_started(JobKind::Hls.as_str());
        tokio::spawn(async move {
            let request = HlsRequest {
                input: resolved.full,
                output_dir: paths.dir.clone(),
                playlist: paths.artifact,
                follow_idle: follow.then_some(inner.settings.hls_follow_idle),
            };
            let outcome = inner
                .converter
                .convert_hls(request, inner.shutdown.child_token())
                .await;
            match outcome {
                Ok(()) => {
                    info!(path = %key.path, "hls conversion finished");
                    inner.jobs.mark_ready(&key);
                    inner.metrics.conversion_finished(JobKind::Hls.as_str(), "ready");
                }
                Err(err) => {
                    warn!(path = %key.path, error = %err.describe(), "hls conversion failed");
                    remove_quietly(&paths.dir, true);
                    inner.jobs.mark_failed(&key, err.describe());
                    inner.metrics.conversion_finished(JobKind::Hls.as_str(), "failed");
                }
            }
        });
    }

    fn spawn_mp4(&self, key: JobKey, resolved: ResolvedMedia, paths: OutputPaths) {
        let inner = Arc::clone(&self.inner);
        inner.metrics.conversion_started(JobKind::Mp4.as_str());
        tokio::spawn(async move {
            let outcome = run_mp4(&inner, &key, resolved, &paths).await;
            match outcome {
                Ok(()) => {
                    info!(path = %key.path, "mp4 conversion finished");
                    inner.jobs.mark_ready(&key);
                    inner.metrics.conversion_finished(JobKind::Mp4.as_str(), "ready");
                }
                Err(err) => {
                    warn!(path = %key.path, error = %err.describe(), "mp4 conversion failed");
                    remove_quietly(&paths.artifact, false);
                    remove_quietly(&paths.marker, false);
                    inner.jobs.mark_failed(&key, err.describe());
                    inner.metrics.conversion_finished(JobKind::Mp4.as_str(), "failed");
                }
            }
        });
    }
}

async fn run_mp4(
    inner: &Inner,
    key: &JobKey,
    resolved: ResolvedMedia,
    paths: &OutputPaths,
) -> MediaResult<()> {
    let _permit = Arc::clone(&inner.mp4_gate)
        .acquire_owned()
        .await
        .map_err(|_| MediaError::backend("convert_mp4", "conversion gate closed"))?;

    let jobs = inner.jobs.clone();
    let progress_key = key.clone();
    let progress: ProgressSink = Arc::new(move |percent| {
        jobs.report_progress(&progress_key, i64::from(percent));
    });
    let request = Mp4Request {
        input: resolved.full,
        output: paths.artifact.clone(),
    };
    inner
        .converter
        .convert_mp4(request, progress, inner.shutdown.child_token())
        .await?;

    fs::write(&paths.marker, inner.converter.mp4_version())
        .map_err(|source| MediaError::io("write_marker", &paths.marker, source))
}

async fn run_blocking<T, F>(operation: &'static str, work: F) -> MediaResult<T>
where
    F: FnOnce() -> MediaResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|err| {
        warn!(operation, error = %err, "conversion kickoff task failed");
        MediaError::backend(operation, "kickoff task failed")
    })?
}

fn prepare_hls_output(paths: &OutputPaths, version: &str) -> MediaResult<()> {
    remove_quietly(&paths.dir, true);
    fs::create_dir_all(&paths.dir)
        .map_err(|source| MediaError::io("prepare_hls", &paths.dir, source))?;
    fs::write(&paths.marker, version)
        .map_err(|source| MediaError::io("prepare_hls", &paths.marker, source))
}

fn prepare_mp4_output(paths: &OutputPaths) -> MediaResult<()> {
    remove_quietly(&paths.artifact, false);
    remove_quietly(&paths.marker, false);
    fs::create_dir_all(&paths.dir)
        .map_err(|source| MediaError::io("prepare_mp4", &paths.dir, source))
}

fn remove_quietly(path: &Path, directory: bool) {
    let result = if directory {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    if let Err(err) = result
        && err.kind() != io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %err, "failed to remove conversion output");
    }
}
