//! JSON-RPC transport port for remote download backends.

use std::error::Error;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Field names a backend may reject as unknown arguments.
const FOCUS_FIELD_NAMES: [&str; 6] = [
    "sequentialdownload",
    "sequentialdownloadfrompiece",
    "priorityhigh",
    "sequential_download",
    "sequential_download_from_piece",
    "priority_high",
];

/// Failures raised by an [`RpcTransport`].
#[derive(Debug, Error)]
pub enum RpcError {
    /// The request never produced a response.
    #[error("rpc transport failed")]
    Transport {
        /// Underlying client failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The endpoint answered with a non-success HTTP status.
    #[error("rpc endpoint returned an error status")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Trimmed response body.
        body: String,
    },
    /// The endpoint answered but did not report success.
    #[error("rpc request rejected")]
    Rejected {
        /// The `result` text returned by the backend.
        result: String,
    },
    /// Session renegotiation did not converge.
    #[error("rpc session negotiation failed")]
    SessionNegotiation,
    /// A conflict response arrived without a session identifier.
    #[error("rpc session id missing from conflict response")]
    SessionHeaderMissing,
    /// The response body could not be decoded.
    #[error("rpc response could not be decoded")]
    Decode {
        /// Decoder message.
        detail: String,
    },
}

impl RpcError {
    /// Wrap a client failure.
    pub fn transport(source: impl Error + Send + Sync + 'static) -> Self {
        Self::Transport {
            source: Box::new(source),
        }
    }

    /// Backend-facing text for logs and client bodies.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Transport { source } => format!("Transmission request failed: {source}"),
            Self::Status { body, .. } | Self::Rejected { result: body } => {
                format!("Transmission error: {body}")
            }
            Self::SessionNegotiation => "Transmission session negotiation failed".to_string(),
            Self::SessionHeaderMissing => "Transmission session id missing".to_string(),
            Self::Decode { detail } => format!("Transmission response invalid: {detail}"),
        }
    }

    /// Whether the backend rejected one of the focus arguments as unknown.
    #[must_use]
    pub fn is_unsupported_argument(&self) -> bool {
        let text = match self {
            Self::Status { body, .. } => body.to_lowercase(),
            Self::Rejected { result } => result.to_lowercase(),
            _ => return false,
        };
        FOCUS_FIELD_NAMES.iter().any(|name| text.contains(name))
            || (text.contains("unknown") && text.contains("argument"))
    }
}

/// Request/response transport speaking the backend's JSON-RPC dialect.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Invoke `method` with `arguments`, returning the response `arguments` object.
    ///
    /// # Errors
    ///
    /// Returns an [`RpcError`] when the call fails or is rejected.
    async fn call(&self, method: &str, arguments: Value) -> Result<Value, RpcError>;
}
