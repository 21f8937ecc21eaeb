//! Torrent listing, upload, sequential toggle, and playback focus handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};
use playready_torrent_core::{FocusRequest, TorrentListing};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::http::errors::ApiError;
use crate::state::ApiState;

#[derive(Debug, Deserialize)]
pub(crate) struct UploadRequest {
    pub(crate) metainfo: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct StatusResponse {
    pub(crate) status: &'static str,
}

pub(crate) async fn list_torrents(State(state): State<Arc<ApiState>>) -> Json<TorrentListing> {
    Json(state.torrents.list().await)
}

pub(crate) async fn upload_torrent(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<UploadRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    state.torrents.add(&request.metainfo).await?;
    info!("torrent upload queued");
    Ok(Json(StatusResponse { status: "queued" }))
}

pub(crate) async fn enable_streaming(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<Json<StatusResponse>, ApiError> {
    state.torrents.enable_streaming(id).await?;
    info!(torrent_id = id, "sequential download enabled");
    Ok(Json(StatusResponse { status: "ok" }))
}

pub(crate) async fn focus(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<FocusRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    debug!(
        torrent_id = request.torrent_id,
        file_index = request.file_index,
        current_time = request.current_time,
        "playback focus reported"
    );
    state.torrents.focus(request).await?;
    Ok(Json(StatusResponse { status: "ok" }))
}
