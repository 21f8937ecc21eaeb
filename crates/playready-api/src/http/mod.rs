//! HTTP surface modules (router, handlers, middleware).

/// Shared constants and header names.
pub mod constants;
/// Problem response helpers and error types.
pub mod errors;
/// Health and diagnostics endpoints.
pub mod health;
/// Library listing and conversion kickoff/status handlers.
pub mod media;
/// Router construction and server host.
pub mod router;
/// Range, growing-file, and live remux streaming.
pub mod stream;
/// Request metrics and request-id middleware.
pub mod telemetry;
/// Torrent listing, upload, and focus handlers.
pub mod torrents;
