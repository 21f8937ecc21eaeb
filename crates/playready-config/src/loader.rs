//! Environment lookup that builds an [`AppConfig`].
//!
//! # Design
//! - `from_lookup` takes any key lookup so tests never touch process state.
//! - Numeric settings degrade to defaults with a warning; malformed addresses are hard errors.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    AppConfig, ConversionConfig, LibraryConfig, LoggingSettings, PrewarmConfig, ServerConfig,
    TransmissionConfig,
};
use crate::validate::{flag_or_default, parse_bind_addr, positive_or_default, require_http_url};

impl AppConfig {
    /// Build configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error when a value is present but cannot be interpreted.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error when a value is present but cannot be interpreted.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let string_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let bind_raw = string_or("SERVER_ADDR", defaults::SERVER_ADDR);
        let server = ServerConfig {
            bind_addr: parse_bind_addr("SERVER_ADDR", &bind_raw)?,
        };

        let library = LibraryConfig {
            videos_dir: PathBuf::from(string_or("VIDEOS_DIR", defaults::VIDEOS_DIR)),
            hls_dir: PathBuf::from(string_or("HLS_DIR", defaults::HLS_DIR)),
            mp4_dir: PathBuf::from(string_or("MP4_DIR", defaults::MP4_DIR)),
        };

        let segment_seconds = positive_or_default(
            "HLS_SEGMENT_SECONDS",
            get("HLS_SEGMENT_SECONDS").as_deref(),
            defaults::HLS_SEGMENT_SECONDS,
        );
        let mp4_concurrency = positive_or_default(
            "MP4_CONCURRENCY",
            get("MP4_CONCURRENCY").as_deref(),
            defaults::MP4_CONCURRENCY,
        );
        let conversion = ConversionConfig {
            hls_version: defaults::HLS_VERSION.to_string(),
            mp4_version: defaults::MP4_VERSION.to_string(),
            hls_segment_seconds: u32::try_from(segment_seconds).map_err(|_| {
                ConfigError::invalid("HLS_SEGMENT_SECONDS", "out_of_range", &segment_seconds.to_string())
            })?,
            mp4_concurrency: usize::try_from(mp4_concurrency).map_err(|_| {
                ConfigError::invalid("MP4_CONCURRENCY", "out_of_range", &mp4_concurrency.to_string())
            })?,
            hls_follow_idle: Duration::from_secs(defaults::HLS_FOLLOW_IDLE_SECS),
            stream_follow_idle: Duration::from_secs(defaults::STREAM_FOLLOW_IDLE_SECS),
        };

        let prewarm = PrewarmConfig {
            enabled: flag_or_default(get("PREWARM_ENABLED").as_deref(), true),
            interval: Duration::from_secs(positive_or_default(
                "PREWARM_INTERVAL_SECS",
                get("PREWARM_INTERVAL_SECS").as_deref(),
                defaults::PREWARM_INTERVAL_SECS,
            )),
            stable_for: Duration::from_secs(positive_or_default(
                "PREWARM_STABLE_SECS",
                get("PREWARM_STABLE_SECS").as_deref(),
                defaults::PREWARM_STABLE_SECS,
            )),
            queue_capacity: defaults::PREWARM_QUEUE_CAPACITY,
            completion_poll: Duration::from_secs(defaults::PREWARM_COMPLETION_POLL_SECS),
        };

        let transmission = match get("TRANSMISSION_URL") {
            Some(url) => Some(TransmissionConfig {
                url: require_http_url("TRANSMISSION_URL", &url)?,
                username: lookup("TRANSMISSION_USER").unwrap_or_default(),
                password: lookup("TRANSMISSION_PASS").unwrap_or_default(),
                download_dir: string_or(
                    "TRANSMISSION_DOWNLOAD_DIR",
                    defaults::TRANSMISSION_DOWNLOAD_DIR,
                ),
            }),
            None => None,
        };

        let logging = LoggingSettings {
            level: string_or("LOG_LEVEL", defaults::LOG_LEVEL),
            format: get("LOG_FORMAT").map(|value| value.trim().to_ascii_lowercase()),
            build_sha: string_or("BUILD_SHA", defaults::BUILD_SHA),
        };

        let config = Self {
            server,
            library,
            conversion,
            prewarm,
            transmission,
            logging,
        };
        config.validate();
        Ok(config)
    }

    /// Log configuration combinations that work but defeat their purpose.
    pub fn validate(&self) {
        if self.prewarm.stable_for < self.prewarm.interval {
            warn!(
                interval_secs = self.prewarm.interval.as_secs(),
                stable_secs = self.prewarm.stable_for.as_secs(),
                "prewarm dwell is shorter than the scan interval; files are queued on their second sighting"
            );
        }
        if self.transmission.is_none() {
            info!("transmission integration disabled");
        }
    }
}
