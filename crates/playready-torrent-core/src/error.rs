//! Error types for torrent services.

use thiserror::Error;

use crate::rpc::RpcError;

/// Primary error type for torrent operations.
#[derive(Debug, Error)]
pub enum TorrentError {
    /// Request parameters failed validation.
    #[error("invalid torrent request")]
    InvalidRequest {
        /// Offending field.
        field: &'static str,
        /// Human-readable reason.
        reason: &'static str,
    },
    /// No download backend is configured.
    #[error("torrent backend is not configured")]
    NotConfigured,
    /// The download backend failed or rejected the operation.
    #[error("torrent backend operation failed")]
    Backend {
        /// Operation identifier.
        operation: &'static str,
        /// Backend-provided detail.
        detail: String,
    },
    /// A torrent or one of its files was not found.
    #[error("torrent not found")]
    NotFound {
        /// What was missing.
        what: &'static str,
    },
}

impl TorrentError {
    pub(crate) const fn invalid(field: &'static str, reason: &'static str) -> Self {
        Self::InvalidRequest { field, reason }
    }

    /// Wrap a transport failure for `operation`.
    #[must_use]
    pub fn rpc(operation: &'static str, error: &RpcError) -> Self {
        Self::Backend {
            operation,
            detail: error.detail(),
        }
    }

    /// Text suitable for a client-facing error body.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::InvalidRequest { reason, .. } => (*reason).to_string(),
            Self::NotConfigured => "Transmission is not configured".to_string(),
            Self::Backend { detail, .. } => detail.clone(),
            Self::NotFound { what } => format!("{what} not found"),
        }
    }
}

/// Convenience alias for torrent operation results.
pub type TorrentResult<T> = Result<T, TorrentError>;
