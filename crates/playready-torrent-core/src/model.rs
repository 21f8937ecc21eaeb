//! Torrent DTOs shared by backends and the HTTP layer.

use serde::{Deserialize, Serialize};

/// Media file inside a torrent payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentFile {
    /// Index of the file inside the torrent, as the backend numbers it.
    pub index: usize,
    /// Name reported by the backend.
    pub name: String,
    /// Normalised library-relative path.
    pub path: String,
    /// Total size in bytes.
    pub size: i64,
    /// Bytes downloaded so far.
    pub bytes_completed: i64,
    /// Rounded completion percentage.
    pub progress: u8,
    /// Whether playback can start from the library copy.
    pub streamable: bool,
}

/// Torrent with aggregate transfer state and its playable files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentSummary {
    /// Backend identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Status label, see [`status_label`].
    pub status: String,
    /// Completion fraction in `[0, 1]`.
    pub percent_done: f64,
    /// Rounded completion percentage.
    pub progress: u8,
    /// Download rate in bytes per second.
    pub rate_download: i64,
    /// Estimated seconds remaining; negative when unknown.
    pub eta: i64,
    /// Bytes wanted once complete.
    pub size_when_done: i64,
    /// Bytes downloaded over the torrent lifetime.
    pub downloaded_ever: i64,
    /// Unix seconds when the torrent was added.
    pub added_date: i64,
    /// Whether the backend considers the torrent finished.
    pub is_finished: bool,
    /// Files with supported media paths.
    pub files: Vec<TorrentFile>,
}

/// Listing envelope; failures are reported inline rather than as an error status.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TorrentListing {
    /// Whether a backend is configured.
    pub enabled: bool,
    /// Torrents visible to the backend.
    pub items: Vec<TorrentSummary>,
    /// Listing failure text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Validated request to admit a torrent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddTorrent {
    /// Base64-encoded `.torrent` metainfo.
    pub metainfo: String,
}

/// Playback position report used to bias downloading.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusRequest {
    /// Backend torrent identifier.
    #[serde(default)]
    pub torrent_id: i64,
    /// File index within the torrent.
    #[serde(default)]
    pub file_index: i64,
    /// Current playback time in seconds.
    #[serde(default)]
    pub current_time: f64,
    /// Media duration in seconds.
    #[serde(default)]
    pub duration: f64,
}

/// Map a Transmission status code to its label.
#[must_use]
pub const fn status_label(code: i64) -> &'static str {
    match code {
        0 => "stopped",
        1 => "check_wait",
        2 => "checking",
        3 => "download_wait",
        4 => "downloading",
        5 => "seed_wait",
        6 => "seeding",
        _ => "unknown",
    }
}

/// Round a completion fraction to a whole percentage.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn round_percent(fraction: f64) -> u8 {
    if !fraction.is_finite() {
        return 0;
    }
    (fraction * 100.0).round().clamp(0.0, 100.0) as u8
}
