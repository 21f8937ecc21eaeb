//! Typed configuration models.
//!
//! # Design
//! - Pure data carriers produced by the loader and consumed during bootstrap.
//! - Durations and paths are already parsed so downstream crates never re-read the environment.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Fully resolved application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Source library and output roots.
    pub library: LibraryConfig,
    /// Conversion backend tuning.
    pub conversion: ConversionConfig,
    /// Background prewarm scheduling.
    pub prewarm: PrewarmConfig,
    /// Remote download backend, absent when not configured.
    pub transmission: Option<TransmissionConfig>,
    /// Logging preferences.
    pub logging: LoggingSettings,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Copy)]
pub struct ServerConfig {
    /// Socket address the API binds to.
    pub bind_addr: SocketAddr,
}

/// Library root and kind-specific output roots.
#[derive(Debug, Clone)]
pub struct LibraryConfig {
    /// Directory holding source videos.
    pub videos_dir: PathBuf,
    /// Directory receiving HLS playlists and segments.
    pub hls_dir: PathBuf,
    /// Directory receiving converted MP4 files.
    pub mp4_dir: PathBuf,
}

/// Conversion backend tuning.
#[derive(Debug, Clone)]
pub struct ConversionConfig {
    /// Version string recorded in HLS markers.
    pub hls_version: String,
    /// Version string recorded in MP4 markers.
    pub mp4_version: String,
    /// Target HLS segment duration in seconds.
    pub hls_segment_seconds: u32,
    /// Maximum number of simultaneous MP4 conversions.
    pub mp4_concurrency: usize,
    /// Idle timeout for HLS conversions that tail a growing source.
    pub hls_follow_idle: Duration,
    /// Idle timeout for growing-file pushes and non-following live remuxes.
    pub stream_follow_idle: Duration,
}

/// Background prewarm scheduling.
#[derive(Debug, Clone)]
pub struct PrewarmConfig {
    /// Whether the scanner and worker loops are started.
    pub enabled: bool,
    /// Interval between catalog scans.
    pub interval: Duration,
    /// Dwell time a file must remain unchanged before it is queued.
    pub stable_for: Duration,
    /// Bound on the work queue.
    pub queue_capacity: usize,
    /// Poll cadence while the worker waits on its own job.
    pub completion_poll: Duration,
}

/// Connection details for the Transmission RPC endpoint.
#[derive(Clone)]
pub struct TransmissionConfig {
    /// RPC endpoint URL.
    pub url: String,
    /// Basic-auth user name (may be empty).
    pub username: String,
    /// Basic-auth password (may be empty).
    pub password: String,
    /// Download directory passed on `torrent-add`.
    pub download_dir: String,
}

impl fmt::Debug for TransmissionConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TransmissionConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .field("download_dir", &self.download_dir)
            .finish()
    }
}

/// Logging preferences read from the environment.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is absent.
    pub level: String,
    /// Explicit format override (`json` or `pretty`).
    pub format: Option<String>,
    /// Build identifier recorded in structured logs.
    pub build_sha: String,
}
