//! Fallback values applied when the environment leaves a setting unset.
//!
//! # Design
//! - Keep every default in one place so the loader and tests agree.
//! - Durations are expressed in seconds to match the environment variables.

/// Listen address used when `SERVER_ADDR` is unset.
pub const SERVER_ADDR: &str = ":8080";
/// Library root holding source videos.
pub const VIDEOS_DIR: &str = "./videos";
/// Root for HLS conversion output.
pub const HLS_DIR: &str = "./hls";
/// Root for MP4 conversion output.
pub const MP4_DIR: &str = "./mp4";
/// Download directory handed to the remote download backend.
pub const TRANSMISSION_DOWNLOAD_DIR: &str = "/downloads";
/// Target HLS segment duration in seconds.
pub const HLS_SEGMENT_SECONDS: u64 = 20;
/// Number of MP4 conversions allowed to run at once.
pub const MP4_CONCURRENCY: u64 = 1;
/// Marker value written next to HLS output.
pub const HLS_VERSION: &str = "v4";
/// Marker value written next to MP4 output.
pub const MP4_VERSION: &str = "v4";
/// Idle window after which a following HLS conversion gives up on its source.
pub const HLS_FOLLOW_IDLE_SECS: u64 = 120;
/// Idle window for growing-file pushes and non-following live remuxes.
pub const STREAM_FOLLOW_IDLE_SECS: u64 = 600;
/// Interval between prewarm catalog scans.
pub const PREWARM_INTERVAL_SECS: u64 = 45;
/// Dwell time a file must stay unchanged before it is prewarmed.
pub const PREWARM_STABLE_SECS: u64 = 60;
/// Capacity of the prewarm work queue.
pub const PREWARM_QUEUE_CAPACITY: usize = 512;
/// Poll cadence used by the prewarm worker while its job is running.
pub const PREWARM_COMPLETION_POLL_SECS: u64 = 2;
/// Log level used when neither `RUST_LOG` nor `LOG_LEVEL` is set.
pub const LOG_LEVEL: &str = "info";
/// Build identifier reported when `BUILD_SHA` is unset.
pub const BUILD_SHA: &str = "dev";
