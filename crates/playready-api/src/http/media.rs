//! Library listing, deletion, and conversion kickoff/status handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use playready_media_core::{JobStatus, MediaResource};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::http::errors::ApiError;
use crate::state::ApiState;

/// `?follow=1` switch shared by kickoff and streaming routes.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct FollowQuery {
    pub(crate) follow: Option<String>,
}

impl FollowQuery {
    pub(crate) fn enabled(&self) -> bool {
        self.follow.as_deref() == Some("1")
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct DeleteResponse {
    pub(crate) ok: bool,
}

pub(crate) async fn list_videos(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<Vec<MediaResource>>, ApiError> {
    let catalog = Arc::clone(state.orchestrator.catalog());
    let listing = tokio::task::spawn_blocking(move || catalog.list())
        .await
        .map_err(|err| {
            error!(error = %err, "library listing task failed");
            ApiError::internal("library listing failed")
        })??;
    Ok(Json(listing))
}

pub(crate) async fn delete_video(
    State(state): State<Arc<ApiState>>,
    Path(path): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let catalog = Arc::clone(state.orchestrator.catalog());
    let target = path.clone();
    tokio::task::spawn_blocking(move || catalog.delete(&target))
        .await
        .map_err(|err| {
            error!(error = %err, "library delete task failed");
            ApiError::internal("library delete failed")
        })??;
    info!(path = %path, "video deleted");
    Ok(Json(DeleteResponse { ok: true }))
}

pub(crate) async fn start_hls(
    State(state): State<Arc<ApiState>>,
    Path(path): Path<String>,
    Query(query): Query<FollowQuery>,
) -> Result<Json<JobStatus>, ApiError> {
    Ok(Json(state.orchestrator.start_hls(&path, query.enabled()).await?))
}

pub(crate) async fn hls_status(
    State(state): State<Arc<ApiState>>,
    Path(path): Path<String>,
) -> Result<Json<JobStatus>, ApiError> {
    Ok(Json(state.orchestrator.hls_status(&path)?))
}

pub(crate) async fn start_mp4(
    State(state): State<Arc<ApiState>>,
    Path(path): Path<String>,
) -> Result<Json<JobStatus>, ApiError> {
    Ok(Json(state.orchestrator.start_mp4(&path).await?))
}

pub(crate) async fn mp4_status(
    State(state): State<Arc<ApiState>>,
    Path(path): Path<String>,
) -> Result<Json<JobStatus>, ApiError> {
    Ok(Json(state.orchestrator.mp4_status(&path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::harness;
    use axum::http::StatusCode;
    use playready_media_core::JobState;

    fn follow(value: Option<&str>) -> Query<FollowQuery> {
        Query(FollowQuery {
            follow: value.map(str::to_string),
        })
    }

    #[test]
    fn follow_flag_requires_literal_one() {
        assert!(follow(Some("1")).0.enabled());
        assert!(!follow(Some("true")).0.enabled());
        assert!(!follow(None).0.enabled());
    }

    #[tokio::test]
    async fn listing_returns_supported_files() -> anyhow::Result<()> {
        let harness = harness(&[("a/movie.mkv", b"123"), ("notes.txt", b"x")])?;
        let Json(items) = list_videos(State(harness.state.clone()))
            .await
            .map_err(|err| anyhow::anyhow!("{err:?}"))?;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].path, "a/movie.mkv");
        Ok(())
    }

    #[tokio::test]
    async fn mp4_kickoff_rejects_mp4_sources() -> anyhow::Result<()> {
        let harness = harness(&[("clip.mp4", b"123")])?;
        let err = start_mp4(State(harness.state.clone()), Path("clip.mp4".to_string()))
            .await
            .expect_err("mp4 sources are served directly");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn status_for_missing_file_is_not_found() -> anyhow::Result<()> {
        let harness = harness(&[])?;
        let err = hls_status(State(harness.state.clone()), Path("gone.mkv".to_string()))
            .await
            .expect_err("missing file");
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn hls_kickoff_reports_processing() -> anyhow::Result<()> {
        let harness = harness(&[("show/ep1.mkv", b"123")])?;
        let Json(status) = start_hls(
            State(harness.state.clone()),
            Path("show/ep1.mkv".to_string()),
            follow(Some("1")),
        )
        .await
        .map_err(|err| anyhow::anyhow!("{err:?}"))?;
        assert_eq!(status.state, JobState::Processing);
        assert_eq!(status.url, "/hls/show/ep1/index.m3u8");

        let Json(idle) = mp4_status(State(harness.state.clone()), Path("show/ep1.mkv".to_string()))
            .await
            .map_err(|err| anyhow::anyhow!("{err:?}"))?;
        assert!(!idle.ready);
        Ok(())
    }

    #[tokio::test]
    async fn delete_removes_source() -> anyhow::Result<()> {
        let harness = harness(&[("old.avi", b"123")])?;
        let Json(body) = delete_video(State(harness.state.clone()), Path("old.avi".to_string()))
            .await
            .map_err(|err| anyhow::anyhow!("{err:?}"))?;
        assert!(body.ok);
        assert!(!harness.state.orchestrator.catalog().contains("old.avi"));
        Ok(())
    }
}
