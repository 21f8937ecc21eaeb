//! # Design
//!
//! - Build every service from one resolved [`AppConfig`] so tests can drive the wiring.
//! - A single cancellation token fans shutdown out to the listener, conversions, and prewarm loops.
//! - The torrent surface stays disabled unless a Transmission endpoint is configured.

use std::sync::Arc;

use playready_api::{ApiDependencies, ApiServer};
use playready_config::{AppConfig, ConversionConfig, PrewarmConfig};
use playready_ffmpeg::{FfmpegConverter, FfmpegSettings};
use playready_library::FsCatalog;
use playready_media_core::MediaCatalog;
use playready_pipeline::{
    ConversionOrchestrator, JobRegistry, OrchestratorSettings, PrewarmSettings, Prewarmer,
};
use playready_telemetry::{LogFormat, LoggingConfig, Metrics};
use playready_torrent_core::{DownloadBackend, TorrentService};
use playready_transmission::{TransmissionBackend, TransmissionClient};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

/// Entry point for the application boot sequence.
///
/// # Errors
///
/// Returns an error if configuration, telemetry, library setup, or the listener fails.
pub async fn run_app() -> AppResult<()> {
    let config = AppConfig::from_env().map_err(|err| AppError::config("config.from_env", err))?;
    let format = LogFormat::from_setting(config.logging.format.as_deref());
    playready_telemetry::init_logging(&LoggingConfig {
        level: &config.logging.level,
        format,
        build_sha: &config.logging.build_sha,
    })
    .map_err(|err| AppError::telemetry("telemetry.init", err))?;

    info!(
        addr = %config.server.bind_addr,
        videos = %config.library.videos_dir.display(),
        torrents = config.transmission.is_some(),
        "playready bootstrap starting"
    );

    let shutdown = CancellationToken::new();
    let signal_task = spawn_signal_listener(shutdown.clone());
    let result = run_app_with(&config, &shutdown).await;
    shutdown.cancel();
    signal_task.abort();
    result
}

/// Services assembled from configuration, ready to be started.
pub(crate) struct Services {
    pub(crate) orchestrator: ConversionOrchestrator,
    pub(crate) prewarmer: Option<Prewarmer>,
    pub(crate) torrents: TorrentService,
    pub(crate) telemetry: Metrics,
}

/// Construct the service graph without starting any background work.
pub(crate) fn build_services(
    config: &AppConfig,
    shutdown: &CancellationToken,
) -> AppResult<Services> {
    let telemetry = Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;

    let catalog = FsCatalog::new(
        config.library.videos_dir.clone(),
        config.library.hls_dir.clone(),
        config.library.mp4_dir.clone(),
    );
    catalog
        .ensure_dirs()
        .map_err(|err| AppError::library("library.ensure_dirs", err))?;
    let catalog: Arc<dyn MediaCatalog> = Arc::new(catalog);

    let converter = FfmpegConverter::new(ffmpeg_settings(&config.conversion));
    let orchestrator = ConversionOrchestrator::new(
        Arc::clone(&catalog),
        Arc::new(converter),
        JobRegistry::new(),
        telemetry.clone(),
        orchestrator_settings(&config.conversion),
        shutdown.clone(),
    );

    let prewarmer = config.prewarm.enabled.then(|| {
        Prewarmer::new(
            orchestrator.clone(),
            telemetry.clone(),
            prewarm_settings(&config.prewarm),
        )
    });

    let backend = match &config.transmission {
        Some(transmission) => {
            let client = TransmissionClient::new(transmission)
                .map_err(|err| AppError::transmission("transmission.client", err))?;
            let backend: Arc<dyn DownloadBackend> = Arc::new(TransmissionBackend::new(
                Arc::new(client),
                Arc::clone(&catalog),
                telemetry.clone(),
                transmission.download_dir.clone(),
            ));
            Some(backend)
        }
        None => None,
    };

    Ok(Services {
        orchestrator,
        prewarmer,
        torrents: TorrentService::new(backend),
        telemetry,
    })
}

/// Boot sequence over an already-resolved configuration.
pub(crate) async fn run_app_with(
    config: &AppConfig,
    shutdown: &CancellationToken,
) -> AppResult<()> {
    let Services {
        orchestrator,
        prewarmer,
        torrents,
        telemetry,
    } = build_services(config, shutdown)?;

    let mut background: Vec<JoinHandle<()>> = Vec::new();
    if let Some(prewarmer) = &prewarmer {
        background.push(prewarmer.spawn_scanner(shutdown.clone()));
        background.push(prewarmer.spawn_worker(shutdown.clone()));
        info!(
            interval_secs = config.prewarm.interval.as_secs(),
            stable_secs = config.prewarm.stable_for.as_secs(),
            "mp4 prewarm loops started"
        );
    }

    let api = ApiServer::new(ApiDependencies {
        orchestrator,
        torrents,
        telemetry,
        hls_dir: config.library.hls_dir.clone(),
        stream_idle: config.conversion.stream_follow_idle,
        shutdown: shutdown.clone(),
    });

    info!(addr = %config.server.bind_addr, "Launching API listener");
    let serve_result = api.serve(config.server.bind_addr).await;

    shutdown.cancel();
    for handle in background {
        if let Err(err) = handle.await {
            warn!(error = %err, "background task join failed");
        }
    }

    serve_result.map_err(|err| AppError::api_server("api_server.serve", err))?;
    info!("API server shutdown complete");
    Ok(())
}

fn spawn_signal_listener(shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown signal received"),
            Err(err) => warn!(error = %err, "failed to listen for shutdown signal"),
        }
        shutdown.cancel();
    })
}

fn ffmpeg_settings(conversion: &ConversionConfig) -> FfmpegSettings {
    FfmpegSettings {
        hls_version: conversion.hls_version.clone(),
        mp4_version: conversion.mp4_version.clone(),
        hls_segment_seconds: conversion.hls_segment_seconds,
        ..FfmpegSettings::default()
    }
}

const fn orchestrator_settings(conversion: &ConversionConfig) -> OrchestratorSettings {
    OrchestratorSettings {
        mp4_concurrency: conversion.mp4_concurrency,
        hls_follow_idle: conversion.hls_follow_idle,
        stream_follow_idle: conversion.stream_follow_idle,
    }
}

const fn prewarm_settings(prewarm: &PrewarmConfig) -> PrewarmSettings {
    PrewarmSettings {
        interval: prewarm.interval,
        stable_for: prewarm.stable_for,
        queue_capacity: prewarm.queue_capacity,
        completion_poll: prewarm.completion_poll,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn config_for(root: &std::path::Path, extra: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let mut vars: HashMap<String, String> = HashMap::from([
            (
                "VIDEOS_DIR".to_string(),
                root.join("videos").display().to_string(),
            ),
            ("HLS_DIR".to_string(), root.join("hls").display().to_string()),
            ("MP4_DIR".to_string(), root.join("mp4").display().to_string()),
        ]);
        for (key, value) in extra {
            vars.insert((*key).to_string(), (*value).to_string());
        }
        Ok(AppConfig::from_lookup(|key| vars.get(key).cloned())?)
    }

    #[test]
    fn conversion_settings_follow_configuration() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let config = config_for(
            dir.path(),
            &[("MP4_CONCURRENCY", "3"), ("HLS_SEGMENT_SECONDS", "6")],
        )?;

        let ffmpeg = ffmpeg_settings(&config.conversion);
        assert_eq!(ffmpeg.hls_segment_seconds, 6);
        assert_eq!(ffmpeg.ffmpeg, FfmpegSettings::default().ffmpeg);

        let orchestrator = orchestrator_settings(&config.conversion);
        assert_eq!(orchestrator.mp4_concurrency, 3);
        assert_eq!(
            orchestrator.stream_follow_idle,
            config.conversion.stream_follow_idle
        );
        Ok(())
    }

    #[test]
    fn prewarm_settings_copy_schedule() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let config = config_for(
            dir.path(),
            &[("PREWARM_INTERVAL_SECS", "10"), ("PREWARM_STABLE_SECS", "30")],
        )?;
        let settings = prewarm_settings(&config.prewarm);
        assert_eq!(settings.interval, Duration::from_secs(10));
        assert_eq!(settings.stable_for, Duration::from_secs(30));
        Ok(())
    }

    #[test]
    fn services_create_library_roots_and_respect_toggles() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let config = config_for(dir.path(), &[("PREWARM_ENABLED", "0")])?;
        let services = build_services(&config, &CancellationToken::new())?;

        assert!(dir.path().join("videos").is_dir());
        assert!(dir.path().join("hls").is_dir());
        assert!(dir.path().join("mp4").is_dir());
        assert!(services.prewarmer.is_none());
        assert!(!services.torrents.enabled());
        assert!(services.orchestrator.catalog().list()?.is_empty());
        assert_eq!(services.telemetry.snapshot().prewarm_queue_depth, 0);
        Ok(())
    }

    #[test]
    fn transmission_endpoint_enables_torrents() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let config = config_for(
            dir.path(),
            &[("TRANSMISSION_URL", "http://127.0.0.1:9091/transmission/rpc")],
        )?;
        let services = build_services(&config, &CancellationToken::new())?;
        assert!(services.torrents.enabled());
        assert!(services.prewarmer.is_some());
        Ok(())
    }
}
