//! Shared state handed to every handler.

use std::time::Duration;

use playready_pipeline::ConversionOrchestrator;
use playready_telemetry::Metrics;
use playready_torrent_core::TorrentService;
use tokio_util::sync::CancellationToken;

pub(crate) struct ApiState {
    pub(crate) orchestrator: ConversionOrchestrator,
    pub(crate) torrents: TorrentService,
    pub(crate) telemetry: Metrics,
    /// Idle timeout for growing-file pushes.
    pub(crate) stream_idle: Duration,
    /// Parent token for long-lived response bodies.
    pub(crate) shutdown: CancellationToken,
}
