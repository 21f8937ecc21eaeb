//! Byte delivery: range reads over complete files, growing-file pushes, and
//! live fragmented MP4.
//!
//! # Design
//! - Complete files honour a single `bytes=S-` or `bytes=S-E` range; anything
//!   unsatisfiable is a plain 416 carrying `Content-Range: bytes */size`.
//! - Growing files ignore `Range` and push whatever the reader produces.
//! - Response bodies own a drop guard, so a client disconnect cancels the
//!   reader or the remux subprocess behind them.

use std::io::SeekFrom;
use std::path::Path as FsPath;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{ACCEPT_RANGES, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE},
    },
    response::{IntoResponse, Response},
};
use futures_util::StreamExt;
use playready_library::{FollowOptions, GrowingFileReader};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, error, warn};

use crate::http::constants::{
    GROWING_CHUNK_BYTES, GROWING_POLL, HEADER_ACCEL_BUFFERING, LIVE_PIPE_BYTES,
};
use crate::http::errors::ApiError;
use crate::http::media::FollowQuery;
use crate::state::ApiState;

const MP4_CONTENT_TYPE: &str = "video/mp4";

fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "mp4" => MP4_CONTENT_TYPE,
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}

/// Inclusive byte range satisfiable against `size`, or `None` for a 416.
fn parse_range(header: &str, size: u64) -> Option<(u64, u64)> {
    let ranges = header.trim().strip_prefix("bytes=")?;
    let (start, end) = ranges.split_once('-')?;
    let start: u64 = start.trim().parse().ok()?;
    if start >= size {
        return None;
    }
    // Unparsable end falls back to the last byte.
    let end = end
        .trim()
        .parse::<u64>()
        .ok()
        .map_or(size - 1, |end| end.min(size - 1));
    (start <= end).then_some((start, end))
}

fn range_not_satisfiable(size: u64) -> Response {
    (
        StatusCode::RANGE_NOT_SATISFIABLE,
        [(CONTENT_RANGE, format!("bytes */{size}"))],
        "Invalid range",
    )
        .into_response()
}

fn build_response(builder: axum::http::response::Builder, body: Body) -> Result<Response, ApiError> {
    builder.body(body).map_err(|err| {
        error!(error = %err, "failed to build stream response");
        ApiError::internal("failed to build stream response")
    })
}

/// Serve a complete file, honouring a single byte range.
async fn serve_file(
    path: &FsPath,
    content_type: &'static str,
    range: Option<&HeaderValue>,
) -> Result<Response, ApiError> {
    let mut file = File::open(path)
        .await
        .map_err(|_| ApiError::not_found("video not found"))?;
    let size = file
        .metadata()
        .await
        .map_err(|err| {
            error!(error = %err, path = %path.display(), "stat failed");
            ApiError::internal("failed to read file metadata")
        })?
        .len();

    let base = Response::builder()
        .header(CONTENT_TYPE, content_type)
        .header(ACCEPT_RANGES, "bytes");

    let Some(range) = range.and_then(|value| value.to_str().ok()) else {
        return build_response(
            base.status(StatusCode::OK).header(CONTENT_LENGTH, size),
            Body::from_stream(ReaderStream::new(file)),
        );
    };

    let Some((start, end)) = parse_range(range, size) else {
        debug!(range, size, "unsatisfiable range");
        return Ok(range_not_satisfiable(size));
    };

    file.seek(SeekFrom::Start(start)).await.map_err(|err| {
        error!(error = %err, path = %path.display(), "seek failed");
        ApiError::internal("failed to seek file")
    })?;
    let length = end - start + 1;
    build_response(
        base.status(StatusCode::PARTIAL_CONTENT)
            .header(CONTENT_LENGTH, length)
            .header(CONTENT_RANGE, format!("bytes {start}-{end}/{size}")),
        Body::from_stream(ReaderStream::new(file.take(length))),
    )
}

/// Push a file that may still be growing until it stops growing.
async fn push_growing(
    state: &ApiState,
    path: &FsPath,
    content_type: &'static str,
) -> Result<Response, ApiError> {
    let cancel = state.shutdown.child_token();
    let options = FollowOptions::with_idle_timeout(state.stream_idle).poll_every(GROWING_POLL);
    let reader = GrowingFileReader::open(path, options, cancel.clone())
        .await
        .map_err(|_| ApiError::not_found("video not found"))?;
    let guard = cancel.drop_guard();
    let chunks = reader.into_stream(GROWING_CHUNK_BYTES);
    let body = async_stream::stream! {
        let _guard = guard;
        let mut chunks = Box::pin(chunks);
        while let Some(chunk) = chunks.next().await {
            yield chunk;
        }
    };

    build_response(
        Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, content_type)
            .header(CACHE_CONTROL, "no-cache"),
        Body::from_stream(body),
    )
}

pub(crate) async fn stream_video(
    State(state): State<Arc<ApiState>>,
    Path(path): Path<String>,
    Query(query): Query<FollowQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let resolved = state.orchestrator.catalog().resolve(&path)?;
    let content_type = content_type_for(&resolved.extension());
    if query.enabled() {
        return push_growing(&state, &resolved.full, content_type).await;
    }
    serve_file(&resolved.full, content_type, headers.get(RANGE)).await
}

pub(crate) async fn stream_mp4(
    State(state): State<Arc<ApiState>>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let Some(artifact) = state.orchestrator.mp4_output(&path)? else {
        return Err(ApiError::not_found("mp4 not ready"));
    };
    serve_file(&artifact, MP4_CONTENT_TYPE, headers.get(RANGE)).await
}

pub(crate) async fn play(
    State(state): State<Arc<ApiState>>,
    Path(path): Path<String>,
    Query(query): Query<FollowQuery>,
) -> Result<Response, ApiError> {
    state.orchestrator.catalog().resolve(&path)?;

    let (reader, mut writer) = tokio::io::duplex(LIVE_PIPE_BYTES);
    let cancel = state.shutdown.child_token();
    let orchestrator = state.orchestrator.clone();
    let follow = query.enabled();
    let task_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(err) = orchestrator
            .stream_live(&path, follow, &mut writer, task_cancel)
            .await
        {
            warn!(path = %path, error = %err.describe(), "live stream ended with error");
        }
    });

    let guard = cancel.drop_guard();
    let body = async_stream::stream! {
        let _guard = guard;
        let mut chunks = ReaderStream::new(reader);
        while let Some(chunk) = chunks.next().await {
            yield chunk;
        }
    };

    build_response(
        Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, MP4_CONTENT_TYPE)
            .header(CACHE_CONTROL, "no-cache")
            .header(HEADER_ACCEL_BUFFERING, "no"),
        Body::from_stream(body),
    )
}
