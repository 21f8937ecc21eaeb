//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters and gauges the playback pipeline reports on.

use std::sync::Arc;

use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
    core::Collector,
};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    conversions_started_total: IntCounterVec,
    conversions_finished_total: IntCounterVec,
    conversions_active: IntGaugeVec,
    prewarm_enqueued_total: IntCounter,
    prewarm_dropped_total: IntCounter,
    prewarm_queue_depth: IntGauge,
    focus_requests_total: IntCounterVec,
    focus_downgrades_total: IntCounter,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// HLS conversions currently running.
    pub active_hls_conversions: i64,
    /// MP4 conversions currently running or waiting for a slot.
    pub active_mp4_conversions: i64,
    /// Items waiting in the prewarm queue.
    pub prewarm_queue_depth: i64,
    /// Total prewarm items accepted into the queue.
    pub prewarm_enqueued_total: u64,
    /// Total prewarm items dropped because the queue was full.
    pub prewarm_dropped_total: u64,
    /// Total downgrades of the piece-focus capability.
    pub focus_downgrades_total: u64,
}

fn collector<T: Collector + Clone + 'static>(
    registry: &Registry,
    name: &'static str,
    built: prometheus::Result<T>,
) -> Result<T> {
    let metric = built.map_err(|source| TelemetryError::MetricsCollector { name, source })?;
    registry
        .register(Box::new(metric.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })?;
    Ok(metric)
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = collector(
            &registry,
            "http_requests_total",
            IntCounterVec::new(
                Opts::new("http_requests_total", "Total HTTP requests received"),
                &["route", "code"],
            ),
        )?;
        let conversions_started_total = collector(
            &registry,
            "conversions_started_total",
            IntCounterVec::new(
                Opts::new("conversions_started_total", "Conversions launched by kind"),
                &["kind"],
            ),
        )?;
        let conversions_finished_total = collector(
            &registry,
            "conversions_finished_total",
            IntCounterVec::new(
                Opts::new(
                    "conversions_finished_total",
                    "Conversions finished by kind and outcome",
                ),
                &["kind", "outcome"],
            ),
        )?;
        let conversions_active = collector(
            &registry,
            "conversions_active",
            IntGaugeVec::new(
                Opts::new("conversions_active", "Conversions currently in flight"),
                &["kind"],
            ),
        )?;
        let prewarm_enqueued_total = collector(
            &registry,
            "prewarm_enqueued_total",
            IntCounter::with_opts(Opts::new(
                "prewarm_enqueued_total",
                "Resources accepted into the prewarm queue",
            )),
        )?;
        let prewarm_dropped_total = collector(
            &registry,
            "prewarm_dropped_total",
            IntCounter::with_opts(Opts::new(
                "prewarm_dropped_total",
                "Resources dropped because the prewarm queue was full",
            )),
        )?;
        let prewarm_queue_depth = collector(
            &registry,
            "prewarm_queue_depth",
            IntGauge::with_opts(Opts::new(
                "prewarm_queue_depth",
                "Resources waiting in the prewarm queue",
            )),
        )?;
        let focus_requests_total = collector(
            &registry,
            "focus_requests_total",
            IntCounterVec::new(
                Opts::new(
                    "focus_requests_total",
                    "Piece-focus requests sent to the download backend by mode",
                ),
                &["mode"],
            ),
        )?;
        let focus_downgrades_total = collector(
            &registry,
            "focus_downgrades_total",
            IntCounter::with_opts(Opts::new(
                "focus_downgrades_total",
                "Piece-focus capability downgrades to the basic request form",
            )),
        )?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                conversions_started_total,
                conversions_finished_total,
                conversions_active,
                prewarm_enqueued_total,
                prewarm_dropped_total,
                prewarm_queue_depth,
                focus_requests_total,
                focus_downgrades_total,
            }),
        })
    }

    /// Increment the HTTP request counter for the given route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        let code = status.to_string();
        self.inner
            .http_requests_total
            .with_label_values(&[route, code.as_str()])
            .inc();
    }

    /// Record a conversion launch and raise the in-flight gauge.
    pub fn conversion_started(&self, kind: &str) {
        self.inner
            .conversions_started_total
            .with_label_values(&[kind])
            .inc();
        self.inner.conversions_active.with_label_values(&[kind]).inc();
    }

    /// Record a conversion outcome and lower the in-flight gauge.
    pub fn conversion_finished(&self, kind: &str, outcome: &str) {
        self.inner
            .conversions_finished_total
            .with_label_values(&[kind, outcome])
            .inc();
        self.inner.conversions_active.with_label_values(&[kind]).dec();
    }

    /// Count an item accepted into the prewarm queue.
    pub fn inc_prewarm_enqueued(&self) {
        self.inner.prewarm_enqueued_total.inc();
        self.inner.prewarm_queue_depth.inc();
    }

    /// Count an item taken off the prewarm queue.
    pub fn dec_prewarm_queue(&self) {
        self.inner.prewarm_queue_depth.dec();
    }

    /// Count an item dropped because the prewarm queue was full.
    pub fn inc_prewarm_dropped(&self) {
        self.inner.prewarm_dropped_total.inc();
    }

    /// Count a focus request sent in the given mode (`advanced` or `basic`).
    pub fn inc_focus_request(&self, mode: &str) {
        self.inner
            .focus_requests_total
            .with_label_values(&[mode])
            .inc();
    }

    /// Count a permanent downgrade of the focus capability.
    pub fn inc_focus_downgrade(&self) {
        self.inner.focus_downgrades_total.inc();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode {
                families: metric_families.len(),
                source,
            })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_hls_conversions: self.inner.conversions_active.with_label_values(&["hls"]).get(),
            active_mp4_conversions: self.inner.conversions_active.with_label_values(&["mp4"]).get(),
            prewarm_queue_depth: self.inner.prewarm_queue_depth.get(),
            prewarm_enqueued_total: self.inner.prewarm_enqueued_total.get(),
            prewarm_dropped_total: self.inner.prewarm_dropped_total.get(),
            focus_downgrades_total: self.inner.focus_downgrades_total.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_snapshot_reflects_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_http_request("/health", 200);
        metrics.conversion_started("mp4");
        metrics.conversion_started("hls");
        metrics.conversion_finished("hls", "ready");
        metrics.inc_prewarm_enqueued();
        metrics.inc_prewarm_enqueued();
        metrics.dec_prewarm_queue();
        metrics.inc_prewarm_dropped();
        metrics.inc_focus_request("advanced");
        metrics.inc_focus_downgrade();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.active_mp4_conversions, 1);
        assert_eq!(snapshot.active_hls_conversions, 0);
        assert_eq!(snapshot.prewarm_queue_depth, 1);
        assert_eq!(snapshot.prewarm_enqueued_total, 2);
        assert_eq!(snapshot.prewarm_dropped_total, 1);
        assert_eq!(snapshot.focus_downgrades_total, 1);

        let rendered = metrics.render()?;
        assert!(rendered.contains("http_requests_total"));
        assert!(rendered.contains("conversions_finished_total"));
        assert!(rendered.contains("focus_requests_total"));
        Ok(())
    }

    #[test]
    fn snapshot_serialises_for_health_payloads() -> anyhow::Result<()> {
        let metrics = Metrics::new()?;
        let value = serde_json::to_value(metrics.snapshot())?;
        assert_eq!(value["prewarm_queue_depth"], 0);
        Ok(())
    }
}
