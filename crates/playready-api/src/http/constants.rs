//! Shared HTTP constants (headers, problem URIs, streaming parameters).

use std::time::Duration;

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";
pub(crate) const HEADER_ACCEL_BUFFERING: &str = "x-accel-buffering";

pub(crate) const PROBLEM_INTERNAL: &str = "https://playready.dev/problems/internal";
pub(crate) const PROBLEM_BAD_REQUEST: &str = "https://playready.dev/problems/bad-request";
pub(crate) const PROBLEM_NOT_FOUND: &str = "https://playready.dev/problems/not-found";
pub(crate) const PROBLEM_BAD_GATEWAY: &str = "https://playready.dev/problems/bad-gateway";
pub(crate) const PROBLEM_SERVICE_UNAVAILABLE: &str =
    "https://playready.dev/problems/service-unavailable";

/// Chunk size for growing-file pushes.
pub(crate) const GROWING_CHUNK_BYTES: usize = 32 * 1024;
/// Poll interval while a growing file has no new data.
pub(crate) const GROWING_POLL: Duration = Duration::from_millis(250);
/// Pipe capacity between the live remuxer and the response body.
pub(crate) const LIVE_PIPE_BYTES: usize = 64 * 1024;
/// Request body limit for torrent uploads (base64 of a 5 MiB payload plus JSON framing).
pub(crate) const TORRENT_UPLOAD_LIMIT: usize = 7 * 1024 * 1024;
