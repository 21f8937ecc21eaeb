//! # Design
//!
//! - Centralize bootstrap errors in one enum with constant messages.
//! - Carry the failing operation so the process exit message names the step.
//! - Preserve source errors without re-logging at call sites.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: playready_config::ConfigError,
    },
    /// Telemetry setup failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: playready_telemetry::TelemetryError,
    },
    /// Library directories could not be prepared.
    #[error("library operation failed")]
    Library {
        /// Operation identifier.
        operation: &'static str,
        /// Source media error.
        source: playready_media_core::MediaError,
    },
    /// The Transmission client could not be constructed.
    #[error("transmission client setup failed")]
    Transmission {
        /// Operation identifier.
        operation: &'static str,
        /// Source RPC error.
        source: playready_torrent_core::RpcError,
    },
    /// The API listener failed.
    #[error("api server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source server error.
        source: anyhow::Error,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: playready_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: playready_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn library(
        operation: &'static str,
        source: playready_media_core::MediaError,
    ) -> Self {
        Self::Library { operation, source }
    }

    pub(crate) const fn transmission(
        operation: &'static str,
        source: playready_torrent_core::RpcError,
    ) -> Self {
        Self::Transmission { operation, source }
    }

    pub(crate) const fn api_server(operation: &'static str, source: anyhow::Error) -> Self {
        Self::ApiServer { operation, source }
    }
}
