//! Shared fixtures for pipeline tests.

use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use playready_library::FsCatalog;
use playready_media_core::{
    Converter, HlsRequest, LiveRequest, MediaError, MediaResult, Mp4Request, ProgressSink,
};
use playready_telemetry::Metrics;
use tempfile::TempDir;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::orchestrator::{ConversionOrchestrator, OrchestratorSettings};
use crate::registry::JobRegistry;

/// Converter double that writes plausible artifacts and records concurrency.
#[derive(Default)]
pub(crate) struct StubConverter {
    pub(crate) hls_calls: AtomicUsize,
    pub(crate) mp4_calls: AtomicUsize,
    pub(crate) running: AtomicUsize,
    pub(crate) peak: AtomicUsize,
    pub(crate) fail: AtomicBool,
    pub(crate) hold: AtomicBool,
    pub(crate) release: Notify,
    /// Report `v5` instead of `v4`, as after a converter upgrade.
    pub(crate) bumped: AtomicBool,
}

impl StubConverter {
    pub(crate) fn holding() -> Self {
        let stub = Self::default();
        stub.hold.store(true, Ordering::SeqCst);
        stub
    }

    fn version(&self) -> &'static str {
        if self.bumped.load(Ordering::SeqCst) {
            "v5"
        } else {
            "v4"
        }
    }

    async fn enter(&self) {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if self.hold.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
    }

    fn leave(&self) -> MediaResult<()> {
        self.running.fetch_sub(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(MediaError::backend("stub", "exit status 1"));
        }
        Ok(())
    }
}

#[async_trait]
impl Converter for StubConverter {
    fn hls_version(&self) -> &str {
        self.version()
    }

    fn mp4_version(&self) -> &str {
        self.version()
    }

    async fn convert_hls(&self, request: HlsRequest, _cancel: CancellationToken) -> MediaResult<()> {
        self.hls_calls.fetch_add(1, Ordering::SeqCst);
        self.enter().await;
        fs::write(&request.playlist, "#EXTM3U\n")
            .map_err(|source| MediaError::io("stub", &request.playlist, source))?;
        let segment = request.output_dir.join("segment00000.ts");
        fs::write(&segment, b"ts").map_err(|source| MediaError::io("stub", &segment, source))?;
        self.leave()
    }

    async fn convert_mp4(
        &self,
        request: Mp4Request,
        progress: ProgressSink,
        _cancel: CancellationToken,
    ) -> MediaResult<()> {
        self.mp4_calls.fetch_add(1, Ordering::SeqCst);
        self.enter().await;
        progress(50);
        fs::write(&request.output, vec![0_u8; 600 * 1024])
            .map_err(|source| MediaError::io("stub", &request.output, source))?;
        self.leave()
    }

    async fn stream_fragmented_mp4(
        &self,
        request: LiveRequest,
        out: &mut (dyn AsyncWrite + Send + Unpin),
        _cancel: CancellationToken,
    ) -> MediaResult<()> {
        let label = if request.follow { "follow" } else { "live" };
        out.write_all(label.as_bytes())
            .await
            .map_err(|source| MediaError::io("stub", &request.input, source))
    }
}

pub(crate) struct Fixture {
    pub(crate) _root: TempDir,
    pub(crate) catalog: Arc<FsCatalog>,
    pub(crate) converter: Arc<StubConverter>,
    pub(crate) metrics: Metrics,
    pub(crate) orchestrator: ConversionOrchestrator,
}

impl Fixture {
    pub(crate) fn write_source(&self, relative: &str, bytes: &[u8]) -> Result<()> {
        let path = self.catalog.videos_dir().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)?;
        Ok(())
    }
}

pub(crate) fn fixture(converter: StubConverter, files: &[&str]) -> Result<Fixture> {
    let root = TempDir::new()?;
    let catalog = Arc::new(FsCatalog::new(
        root.path().join("videos"),
        root.path().join("hls"),
        root.path().join("mp4"),
    ));
    catalog.ensure_dirs()?;
    let converter = Arc::new(converter);
    let metrics = Metrics::new()?;
    let orchestrator = ConversionOrchestrator::new(
        catalog.clone(),
        converter.clone(),
        JobRegistry::new(),
        metrics.clone(),
        OrchestratorSettings::default(),
        CancellationToken::new(),
    );
    let fixture = Fixture {
        _root: root,
        catalog,
        converter,
        metrics,
        orchestrator,
    };
    for file in files {
        fixture.write_source(file, b"source")?;
    }
    Ok(fixture)
}

pub(crate) async fn wait_until(mut check: impl FnMut() -> bool) -> Result<()> {
    for _ in 0..300 {
        if check() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    bail!("condition not reached in time")
}
