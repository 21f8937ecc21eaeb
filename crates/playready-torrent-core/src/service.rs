//! Download-backend port and the validating facade used by the HTTP layer.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, warn};

use crate::error::{TorrentError, TorrentResult};
use crate::model::{AddTorrent, FocusRequest, TorrentListing, TorrentSummary};

/// Largest accepted `.torrent` payload after base64 decoding.
pub const MAX_METAINFO_BYTES: usize = 5 << 20;

/// Remote download engine consumed as a black box.
#[async_trait]
pub trait DownloadBackend: Send + Sync {
    /// Torrents visible to the backend.
    async fn list(&self) -> TorrentResult<Vec<TorrentSummary>>;

    /// Admit a torrent and start it immediately.
    async fn add(&self, request: AddTorrent) -> TorrentResult<()>;

    /// Toggle sequential download for torrent `id`.
    async fn set_sequential(&self, id: i64, enabled: bool) -> TorrentResult<()>;

    /// Bias downloading of `file_index` toward `ratio` of its length.
    async fn focus(&self, id: i64, file_index: usize, ratio: f64) -> TorrentResult<()>;
}

/// Playback position as a fraction of the duration, `0` when either value is unusable.
#[must_use]
pub fn playback_ratio(current_time: f64, duration: f64) -> f64 {
    let usable = |value: f64| value.is_finite() && value > 0.0;
    if usable(current_time) && usable(duration) {
        (current_time / duration).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Validating facade over an optional [`DownloadBackend`].
#[derive(Clone)]
pub struct TorrentService {
    backend: Option<Arc<dyn DownloadBackend>>,
}

impl TorrentService {
    /// Facade over `backend`; `None` disables every torrent operation.
    #[must_use]
    pub fn new(backend: Option<Arc<dyn DownloadBackend>>) -> Self {
        Self { backend }
    }

    /// Whether a backend is configured.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.backend.is_some()
    }

    fn backend(&self) -> TorrentResult<&Arc<dyn DownloadBackend>> {
        self.backend.as_ref().ok_or(TorrentError::NotConfigured)
    }

    /// List torrents, reporting backend failures inline.
    pub async fn list(&self) -> TorrentListing {
        let Some(backend) = &self.backend else {
            return TorrentListing::default();
        };
        match backend.list().await {
            Ok(items) => TorrentListing {
                enabled: true,
                items,
                error: None,
            },
            Err(err) => {
                warn!(error = %err, detail = %err.describe(), "torrent listing failed");
                TorrentListing {
                    enabled: true,
                    items: Vec::new(),
                    error: Some(err.describe()),
                }
            }
        }
    }

    /// Validate base64 `metainfo` and hand it to the backend.
    ///
    /// # Errors
    ///
    /// Returns [`TorrentError::NotConfigured`] without a backend and
    /// [`TorrentError::InvalidRequest`] for undecodable, empty, or oversized payloads.
    pub async fn add(&self, metainfo: &str) -> TorrentResult<()> {
        let backend = self.backend()?;
        let decoded = STANDARD
            .decode(metainfo.trim())
            .map_err(|_| TorrentError::invalid("metainfo", "metainfo must be base64"))?;
        if decoded.is_empty() {
            return Err(TorrentError::invalid("metainfo", "metainfo is empty"));
        }
        if decoded.len() > MAX_METAINFO_BYTES {
            return Err(TorrentError::invalid(
                "metainfo",
                "metainfo exceeds 5 MiB",
            ));
        }
        debug!(bytes = decoded.len(), "submitting torrent");
        backend
            .add(AddTorrent {
                metainfo: STANDARD.encode(decoded),
            })
            .await
    }

    /// Enable sequential download so playback can start early.
    ///
    /// # Errors
    ///
    /// Returns [`TorrentError::NotConfigured`] without a backend and
    /// [`TorrentError::InvalidRequest`] for a non-positive id.
    pub async fn enable_streaming(&self, id: i64) -> TorrentResult<()> {
        let backend = self.backend()?;
        if id <= 0 {
            return Err(TorrentError::invalid("id", "invalid torrent id"));
        }
        backend.set_sequential(id, true).await
    }

    /// Prioritise downloading around the reported playback position.
    ///
    /// # Errors
    ///
    /// Returns [`TorrentError::NotConfigured`] without a backend and
    /// [`TorrentError::InvalidRequest`] for invalid identifiers.
    pub async fn focus(&self, request: FocusRequest) -> TorrentResult<()> {
        let backend = self.backend()?;
        let file_index = usize::try_from(request.file_index)
            .ok()
            .filter(|_| request.torrent_id > 0)
            .ok_or_else(|| {
                TorrentError::invalid("fileIndex", "invalid torrent or file index")
            })?;
        let ratio = playback_ratio(request.current_time, request.duration);
        backend.focus(request.torrent_id, file_index, ratio).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingBackend {
        added: Mutex<Vec<AddTorrent>>,
        sequential: Mutex<Vec<i64>>,
        focused: Mutex<Vec<(i64, usize, f64)>>,
        fail_list: bool,
    }

    #[async_trait]
    impl DownloadBackend for RecordingBackend {
        async fn list(&self) -> TorrentResult<Vec<TorrentSummary>> {
            if self.fail_list {
                return Err(TorrentError::Backend {
                    operation: "torrent-get",
                    detail: "Transmission error: boom".to_string(),
                });
            }
            Ok(Vec::new())
        }

        async fn add(&self, request: AddTorrent) -> TorrentResult<()> {
            self.added.lock().expect("added lock").push(request);
            Ok(())
        }

        async fn set_sequential(&self, id: i64, _enabled: bool) -> TorrentResult<()> {
            self.sequential.lock().expect("sequential lock").push(id);
            Ok(())
        }

        async fn focus(&self, id: i64, file_index: usize, ratio: f64) -> TorrentResult<()> {
            self.focused
                .lock()
                .expect("focused lock")
                .push((id, file_index, ratio));
            Ok(())
        }
    }

    fn service(backend: &Arc<RecordingBackend>) -> TorrentService {
        let backend: Arc<dyn DownloadBackend> = backend.clone();
        TorrentService::new(Some(backend))
    }

    #[test]
    fn ratio_requires_finite_positive_inputs() {
        assert!((playback_ratio(30.0, 120.0) - 0.25).abs() < f64::EPSILON);
        assert!((playback_ratio(500.0, 120.0) - 1.0).abs() < f64::EPSILON);
        assert!(playback_ratio(f64::NAN, 120.0).abs() < f64::EPSILON);
        assert!(playback_ratio(30.0, f64::INFINITY).abs() < f64::EPSILON);
        assert!(playback_ratio(-4.0, 120.0).abs() < f64::EPSILON);
        assert!(playback_ratio(30.0, 0.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn disabled_service_reports_not_configured() {
        let service = TorrentService::new(None);
        assert!(!service.enabled());
        assert!(matches!(
            service.enable_streaming(1).await,
            Err(TorrentError::NotConfigured)
        ));
        let listing = service.list().await;
        assert!(!listing.enabled);
        assert!(listing.error.is_none());
    }

    #[tokio::test]
    async fn focus_validates_identifiers() -> anyhow::Result<()> {
        let backend = Arc::new(RecordingBackend::default());
        let service = service(&backend);

        for (torrent_id, file_index) in [(0, 0), (-1, 0), (3, -1)] {
            let result = service
                .focus(FocusRequest {
                    torrent_id,
                    file_index,
                    current_time: 1.0,
                    duration: 2.0,
                })
                .await;
            assert!(matches!(result, Err(TorrentError::InvalidRequest { .. })));
        }

        service
            .focus(FocusRequest {
                torrent_id: 3,
                file_index: 1,
                current_time: 50.0,
                duration: 100.0,
            })
            .await?;
        let focused = backend.focused.lock().expect("focused lock").clone();
        assert_eq!(focused.len(), 1);
        assert_eq!((focused[0].0, focused[0].1), (3, 1));
        assert!((focused[0].2 - 0.5).abs() < f64::EPSILON);
        Ok(())
    }

    #[tokio::test]
    async fn add_rejects_bad_payloads() -> anyhow::Result<()> {
        let backend = Arc::new(RecordingBackend::default());
        let service = service(&backend);

        assert!(matches!(
            service.add("***").await,
            Err(TorrentError::InvalidRequest { .. })
        ));
        assert!(matches!(
            service.add("").await,
            Err(TorrentError::InvalidRequest { .. })
        ));
        let oversized = STANDARD.encode(vec![0_u8; MAX_METAINFO_BYTES + 1]);
        assert!(matches!(
            service.add(&oversized).await,
            Err(TorrentError::InvalidRequest { .. })
        ));

        service.add(&STANDARD.encode(b"d4:infoe")).await?;
        let added = backend.added.lock().expect("added lock").clone();
        assert_eq!(added.len(), 1);
        assert_eq!(STANDARD.decode(&added[0].metainfo)?, b"d4:infoe");
        Ok(())
    }

    #[tokio::test]
    async fn listing_failure_is_inline() {
        let backend = Arc::new(RecordingBackend {
            fail_list: true,
            ..RecordingBackend::default()
        });
        let listing = service(&backend).list().await;
        assert!(listing.enabled);
        assert!(listing.items.is_empty());
        assert_eq!(listing.error.as_deref(), Some("Transmission error: boom"));
    }

    #[tokio::test]
    async fn streaming_requires_positive_id() -> anyhow::Result<()> {
        let backend = Arc::new(RecordingBackend::default());
        let service = service(&backend);
        assert!(service.enable_streaming(0).await.is_err());
        service.enable_streaming(4).await?;
        assert_eq!(*backend.sequential.lock().expect("sequential lock"), vec![4]);
        Ok(())
    }
}
