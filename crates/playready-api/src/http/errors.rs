//! RFC9457-style API error wrapper.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use playready_media_core::MediaError;
use playready_torrent_core::TorrentError;
use serde::Serialize;
use tracing::{error, warn};

use crate::http::constants::{
    PROBLEM_BAD_GATEWAY, PROBLEM_BAD_REQUEST, PROBLEM_INTERNAL, PROBLEM_NOT_FOUND,
    PROBLEM_SERVICE_UNAVAILABLE,
};

/// Problem document returned for failed requests.
#[derive(Debug, Clone, Serialize)]
pub struct ProblemDetails {
    /// URI reference identifying the problem type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Short, human-readable summary of the issue.
    pub title: String,
    /// HTTP status code associated with the error.
    pub status: u16,
    /// Detailed diagnostic message when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Structured API error with optional RFC9457 fields.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) kind: &'static str,
    title: &'static str,
    pub(crate) detail: Option<String>,
}

impl ApiError {
    const fn new(status: StatusCode, kind: &'static str, title: &'static str) -> Self {
        Self {
            status,
            kind,
            title,
            detail: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            PROBLEM_INTERNAL,
            "internal server error",
        )
        .with_detail(message)
    }

    pub(crate) fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, PROBLEM_BAD_REQUEST, "bad request").with_detail(detail)
    }

    pub(crate) fn not_found(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            PROBLEM_NOT_FOUND,
            "resource not found",
        )
        .with_detail(detail)
    }

    pub(crate) fn bad_gateway(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_GATEWAY,
            PROBLEM_BAD_GATEWAY,
            "upstream failure",
        )
        .with_detail(detail)
    }

    pub(crate) fn service_unavailable(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            PROBLEM_SERVICE_UNAVAILABLE,
            "service unavailable",
        )
        .with_detail(detail)
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        match &err {
            MediaError::NotFound { .. } => Self::not_found("video not found"),
            MediaError::InvalidRequest { .. } => Self::bad_request(err.describe()),
            MediaError::Backend { .. } => {
                warn!(error = %err, detail = %err.describe(), "media backend failure");
                Self::bad_gateway(err.describe())
            }
            MediaError::Io { .. } => {
                error!(error = %err, detail = %err.describe(), "media io failure");
                Self::internal("media storage failure")
            }
        }
    }
}

impl From<TorrentError> for ApiError {
    fn from(err: TorrentError) -> Self {
        match &err {
            TorrentError::InvalidRequest { .. } => Self::bad_request(err.describe()),
            TorrentError::NotConfigured => Self::service_unavailable(err.describe()),
            TorrentError::NotFound { .. } => Self::not_found(err.describe()),
            TorrentError::Backend { operation, .. } => {
                warn!(operation = *operation, detail = %err.describe(), "torrent backend failure");
                Self::bad_gateway(err.describe())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ProblemDetails {
            kind: self.kind.to_string(),
            title: self.title.to_string(),
            status: self.status.as_u16(),
            detail: self.detail,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_errors_map_to_statuses() {
        let missing: ApiError = MediaError::NotFound {
            path: "a.mkv".to_string(),
        }
        .into();
        assert_eq!(missing.status, StatusCode::NOT_FOUND);

        let invalid: ApiError = MediaError::invalid("path", "unsupported file type", "a.txt").into();
        assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
        assert_eq!(invalid.detail.as_deref(), Some("unsupported file type"));

        let backend: ApiError = MediaError::backend("ffmpeg", "exit status 1").into();
        assert_eq!(backend.status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn torrent_errors_map_to_statuses() {
        let unconfigured: ApiError = TorrentError::NotConfigured.into();
        assert_eq!(unconfigured.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(unconfigured.kind, PROBLEM_SERVICE_UNAVAILABLE);

        let backend: ApiError = TorrentError::Backend {
            operation: "torrent-set",
            detail: "Transmission error: nope".to_string(),
        }
        .into();
        assert_eq!(backend.status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn problem_body_omits_missing_detail() -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(ProblemDetails {
            kind: PROBLEM_NOT_FOUND.to_string(),
            title: "resource not found".to_string(),
            status: 404,
            detail: None,
        })?;
        assert_eq!(
            value,
            serde_json::json!({
                "type": PROBLEM_NOT_FOUND,
                "title": "resource not found",
                "status": 404
            })
        );
        Ok(())
    }
}
