//! Shared fixtures for handler tests.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use playready_library::FsCatalog;
use playready_media_core::{
    Converter, HlsRequest, LiveRequest, MediaResult, Mp4Request, ProgressSink,
};
use playready_pipeline::{ConversionOrchestrator, JobRegistry, OrchestratorSettings};
use playready_telemetry::Metrics;
use playready_torrent_core::TorrentService;
use tempfile::TempDir;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::state::ApiState;

pub(crate) const LIVE_PAYLOAD: &[u8] = b"fragmented-mp4";

/// Converter double: conversions succeed instantly, live streams emit a fixed payload.
struct QuietConverter;

#[async_trait]
impl Converter for QuietConverter {
    fn hls_version(&self) -> &str {
        "v4"
    }

    fn mp4_version(&self) -> &str {
        "v4"
    }

    async fn convert_hls(&self, _request: HlsRequest, _cancel: CancellationToken) -> MediaResult<()> {
        Ok(())
    }

    async fn convert_mp4(
        &self,
        _request: Mp4Request,
        _progress: ProgressSink,
        _cancel: CancellationToken,
    ) -> MediaResult<()> {
        Ok(())
    }

    async fn stream_fragmented_mp4(
        &self,
        _request: LiveRequest,
        out: &mut (dyn AsyncWrite + Send + Unpin),
        _cancel: CancellationToken,
    ) -> MediaResult<()> {
        let _ = out.write_all(LIVE_PAYLOAD).await;
        let _ = out.shutdown().await;
        Ok(())
    }
}

pub(crate) struct Harness {
    _root: TempDir,
    pub(crate) root: PathBuf,
    pub(crate) state: Arc<ApiState>,
}

pub(crate) fn harness(files: &[(&str, &[u8])]) -> Result<Harness> {
    harness_with_torrents(files, TorrentService::new(None))
}

pub(crate) fn harness_with_torrents(
    files: &[(&str, &[u8])],
    torrents: TorrentService,
) -> Result<Harness> {
    let dir = TempDir::new()?;
    let root = dir.path().to_path_buf();
    let catalog = FsCatalog::new(root.join("videos"), root.join("hls"), root.join("mp4"));
    catalog.ensure_dirs()?;
    for (relative, contents) in files {
        let path = root.join("videos").join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
    }

    let metrics = Metrics::new()?;
    let orchestrator = ConversionOrchestrator::new(
        Arc::new(catalog),
        Arc::new(QuietConverter),
        JobRegistry::new(),
        metrics.clone(),
        OrchestratorSettings::default(),
        CancellationToken::new(),
    );
    let state = Arc::new(ApiState {
        orchestrator,
        torrents,
        telemetry: metrics,
        stream_idle: Duration::from_millis(300),
        shutdown: CancellationToken::new(),
    });
    Ok(Harness {
        _root: dir,
        root,
        state,
    })
}
