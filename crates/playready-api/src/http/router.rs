//! Router construction and server host for the API.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{
        HeaderName, Method, Request,
        header::{CONTENT_TYPE, RANGE},
    },
    routing::{get, post},
};
use playready_pipeline::ConversionOrchestrator;
use playready_telemetry::{Metrics, build_sha};
use playready_torrent_core::TorrentService;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::Span;

use crate::http::constants::{HEADER_REQUEST_ID, TORRENT_UPLOAD_LIMIT};
use crate::http::health::{health, metrics};
use crate::http::media::{delete_video, hls_status, list_videos, mp4_status, start_hls, start_mp4};
use crate::http::stream::{play, stream_mp4, stream_video};
use crate::http::telemetry::{
    HttpMetricsLayer, propagate_request_id_layer, set_request_id_layer,
};
use crate::http::torrents::{enable_streaming, focus, list_torrents, upload_torrent};
use crate::state::ApiState;

/// Everything the HTTP surface needs from the rest of the application.
pub struct ApiDependencies {
    /// Conversion orchestrator (also exposes the catalog).
    pub orchestrator: ConversionOrchestrator,
    /// Torrent facade; disabled when no backend is configured.
    pub torrents: TorrentService,
    /// Shared metrics registry.
    pub telemetry: Metrics,
    /// Directory served under `/hls`.
    pub hls_dir: PathBuf,
    /// Idle timeout for growing-file pushes.
    pub stream_idle: Duration,
    /// Cancels long-lived response bodies on shutdown.
    pub shutdown: CancellationToken,
}

/// Axum router wrapper that hosts the playback API.
pub struct ApiServer {
    router: Router,
    shutdown: CancellationToken,
}

impl ApiServer {
    /// Construct the server with shared dependencies wired through application state.
    #[must_use]
    pub fn new(dependencies: ApiDependencies) -> Self {
        let ApiDependencies {
            orchestrator,
            torrents,
            telemetry,
            hls_dir,
            stream_idle,
            shutdown,
        } = dependencies;
        let state = Arc::new(ApiState {
            orchestrator,
            torrents,
            telemetry: telemetry.clone(),
            stream_idle,
            shutdown: shutdown.clone(),
        });

        let cors_layer = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([CONTENT_TYPE, RANGE, HeaderName::from_static(HEADER_REQUEST_ID)]);
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let method = request.method().clone();
                let uri_path = request.uri().path();
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();

                tracing::info_span!(
                    "http.request",
                    method = %method,
                    route = %uri_path,
                    request_id = %request_id,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_request(|_request: &Request<_>, _span: &Span| {})
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    let status = response.status().as_u16();
                    span.record("status_code", status);
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );
        let layered = ServiceBuilder::new()
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
            .layer(trace_layer)
            .layer(HttpMetricsLayer::new(telemetry));

        let router = Self::build_router(hls_dir)
            .layer(cors_layer)
            .route_layer(layered)
            .with_state(state);

        Self { router, shutdown }
    }

    fn build_router(hls_dir: PathBuf) -> Router<Arc<ApiState>> {
        Router::new()
            .route("/health", get(health))
            .route("/metrics", get(metrics))
            .route("/api/videos", get(list_videos))
            .route("/api/videos/{*path}", axum::routing::delete(delete_video))
            .route("/api/stream/{*path}", get(stream_video))
            .route("/api/play/{*path}", get(play))
            .route("/api/stream-mp4/{*path}", get(stream_mp4))
            .route("/api/hls-start/{*path}", post(start_hls))
            .route("/api/hls-status/{*path}", get(hls_status))
            .route("/api/mp4-start/{*path}", post(start_mp4))
            .route("/api/mp4-status/{*path}", get(mp4_status))
            .route(
                "/api/torrents",
                get(list_torrents)
                    .post(upload_torrent)
                    .layer(DefaultBodyLimit::max(TORRENT_UPLOAD_LIMIT)),
            )
            .route("/api/torrents/focus", post(focus))
            .route("/api/torrents/{id}/stream", post(enable_streaming))
            .nest_service("/hls", ServeDir::new(hls_dir))
    }

    /// Serve the API on `addr` until the shutdown token fires.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails to bind or the server terminates unexpectedly.
    pub async fn serve(self, addr: SocketAddr) -> Result<()> {
        tracing::info!("Starting API on {}", addr);
        let listener = TcpListener::bind(addr).await?;
        let shutdown = self.shutdown;
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) const fn router(&self) -> &Router {
        &self.router
    }
}
