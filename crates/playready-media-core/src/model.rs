//! Jobs, library resources, and artifact locations.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Marker file written inside an HLS output directory once preparation succeeds.
pub const HLS_MARKER_FILE: &str = ".transcoded";
/// Extension of the marker written beside each MP4 artifact after a successful conversion.
pub const MP4_MARKER_EXTENSION: &str = "mp4transcoded";
/// Playlist name inside each HLS output directory.
pub const HLS_PLAYLIST_FILE: &str = "index.m3u8";

/// Kind of conversion tracked by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Segmented HLS output (playlist plus `.ts` segments).
    Hls,
    /// Single seekable MP4 file.
    Mp4,
}

impl JobKind {
    /// Stable label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hls => "hls",
            Self::Mp4 => "mp4",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// No job has run, or the artifact is absent.
    #[default]
    Idle,
    /// A worker is running for this key.
    Processing,
    /// The artifact is usable.
    Ready,
    /// The last attempt failed.
    Failed,
}

impl JobState {
    /// Stable label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

/// Registry key: one job per conversion kind and library-relative path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobKey {
    /// Conversion kind.
    pub kind: JobKind,
    /// Normalised library-relative path.
    pub path: String,
}

impl JobKey {
    /// Build a key for the given kind and path.
    #[must_use]
    pub fn new(kind: JobKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.path)
    }
}

/// Status payload returned by kickoff and status operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    /// Current state.
    pub state: JobState,
    /// Whether the artifact can be played right now.
    pub ready: bool,
    /// Whether a worker is currently running.
    pub processing: bool,
    /// Playback URL for the artifact.
    pub url: String,
    /// Progress percentage in `0..=100`.
    pub progress: u8,
    /// Number of HLS segments on disk; absent for MP4.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments: Option<usize>,
    /// Last failure text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobStatus {
    /// Status for a resource with no usable artifact and no running job.
    #[must_use]
    pub fn idle(url: impl Into<String>, progress: u8) -> Self {
        Self {
            state: JobState::Idle,
            ready: false,
            processing: false,
            url: url.into(),
            progress,
            segments: None,
            error: None,
        }
    }

    /// Status for a running job. `ready` reflects the artifact probe.
    #[must_use]
    pub fn processing(url: impl Into<String>, ready: bool, progress: u8) -> Self {
        Self {
            state: JobState::Processing,
            ready,
            processing: true,
            ..Self::idle(url, progress)
        }
    }

    /// Status for a usable artifact.
    #[must_use]
    pub fn ready(url: impl Into<String>, progress: u8) -> Self {
        Self {
            state: JobState::Ready,
            ready: true,
            ..Self::idle(url, progress)
        }
    }

    /// Status for a failed job.
    #[must_use]
    pub fn failed(url: impl Into<String>, error: impl Into<String>, progress: u8) -> Self {
        Self {
            state: JobState::Failed,
            error: Some(error.into()),
            ..Self::idle(url, progress)
        }
    }

    /// Attach an HLS segment count.
    #[must_use]
    pub fn with_segments(mut self, segments: usize) -> Self {
        self.segments = Some(segments);
        self
    }
}

/// Source file discovered in the library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaResource {
    /// File name without directories.
    pub name: String,
    /// Library-relative path with forward slashes.
    pub path: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time, serialised as unix seconds.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub modified_at: DateTime<Utc>,
    /// Lowercase extension without the dot.
    #[serde(skip)]
    pub extension: String,
}

/// Result of resolving a raw request path against the library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMedia {
    /// Normalised library-relative path.
    pub relative: String,
    /// Absolute (or root-joined) filesystem path.
    pub full: PathBuf,
}

impl ResolvedMedia {
    /// Lowercase extension of the resolved path.
    #[must_use]
    pub fn extension(&self) -> String {
        crate::path::extension_of(&self.relative)
    }
}

/// Where a conversion writes its artifact and how clients reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    /// Directory that holds the artifact.
    pub dir: PathBuf,
    /// Playlist (HLS) or output file (MP4).
    pub artifact: PathBuf,
    /// Version marker owned by this artifact alone.
    pub marker: PathBuf,
    /// URL clients use to play the artifact.
    pub url: String,
}
