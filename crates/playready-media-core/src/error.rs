//! # Design
//!
//! - Constant-message errors shared by the catalog, the pipeline, and the converter.
//! - Context lives in fields so the HTTP layer can pick a status without parsing text.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors produced while resolving, converting, or serving media.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The requested source file does not exist in the library.
    #[error("media not found")]
    NotFound {
        /// Library-relative path that was requested.
        path: String,
    },
    /// The request was malformed (bad path, unsupported type).
    #[error("invalid media request")]
    InvalidRequest {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// The conversion toolchain failed.
    #[error("media backend failure")]
    Backend {
        /// Operation that failed.
        operation: &'static str,
        /// Diagnostic text reported by the backend.
        detail: String,
    },
    /// Filesystem failures while preparing or reading artifacts.
    #[error("media io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
}

impl MediaError {
    /// Build an [`MediaError::Io`] for the given operation and path.
    #[must_use]
    pub fn io(operation: &'static str, path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Build an [`MediaError::InvalidRequest`] carrying the offending value.
    #[must_use]
    pub fn invalid(field: &'static str, reason: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidRequest {
            field,
            reason,
            value: Some(value.into()),
        }
    }

    /// Build an [`MediaError::Backend`] from a diagnostic message.
    #[must_use]
    pub fn backend(operation: &'static str, detail: impl Into<String>) -> Self {
        Self::Backend {
            operation,
            detail: detail.into(),
        }
    }

    /// Human-readable description suitable for status payloads and logs.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::NotFound { path } => format!("{path}: not found"),
            Self::InvalidRequest { reason, .. } => (*reason).to_string(),
            Self::Backend { operation, detail } => format!("{operation}: {detail}"),
            Self::Io {
                operation,
                path,
                source,
            } => format!("{operation} {}: {source}", path.display()),
        }
    }
}
