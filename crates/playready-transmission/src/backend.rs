//! [`DownloadBackend`] over a Transmission [`RpcTransport`].

use std::sync::Arc;

use async_trait::async_trait;
use playready_media_core::{MediaCatalog, normalize_media_path};
use playready_telemetry::Metrics;
use playready_torrent_core::{
    AddTorrent, DownloadBackend, PieceFocusNegotiator, RpcTransport, TorrentError, TorrentFile,
    TorrentResult, TorrentSummary, round_percent, status_label,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

const LIST_FIELDS: [&str; 11] = [
    "id",
    "name",
    "status",
    "percentDone",
    "rateDownload",
    "eta",
    "sizeWhenDone",
    "downloadedEver",
    "addedDate",
    "isFinished",
    "files",
];

#[derive(Deserialize)]
struct ListArguments {
    #[serde(default)]
    torrents: Vec<RawTorrent>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawTorrent {
    id: i64,
    name: String,
    status: i64,
    percent_done: f64,
    rate_download: i64,
    eta: i64,
    size_when_done: i64,
    downloaded_ever: i64,
    added_date: i64,
    is_finished: bool,
    files: Vec<RawFile>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawFile {
    bytes_completed: i64,
    length: i64,
    name: String,
}

/// Transmission-backed torrent operations.
pub struct TransmissionBackend {
    transport: Arc<dyn RpcTransport>,
    negotiator: PieceFocusNegotiator,
    catalog: Arc<dyn MediaCatalog>,
    download_dir: String,
}

impl TransmissionBackend {
    /// Adapter over `transport`; `catalog` decides which files are streamable.
    #[must_use]
    pub fn new(
        transport: Arc<dyn RpcTransport>,
        catalog: Arc<dyn MediaCatalog>,
        metrics: Metrics,
        download_dir: impl Into<String>,
    ) -> Self {
        Self {
            negotiator: PieceFocusNegotiator::new(transport.clone(), metrics),
            transport,
            catalog,
            download_dir: download_dir.into(),
        }
    }

    fn summarize(&self, raw: RawTorrent) -> TorrentSummary {
        let files = raw
            .files
            .into_iter()
            .enumerate()
            .filter_map(|(index, file)| {
                let path = normalize_media_path(&file.name).ok()?;
                #[allow(clippy::cast_precision_loss)]
                let fraction = if file.length > 0 {
                    file.bytes_completed as f64 / file.length as f64
                } else {
                    0.0
                };
                Some(TorrentFile {
                    index,
                    streamable: file.bytes_completed > 0 && self.catalog.contains(&path),
                    name: file.name,
                    path,
                    size: file.length,
                    bytes_completed: file.bytes_completed,
                    progress: round_percent(fraction),
                })
            })
            .collect();

        TorrentSummary {
            id: raw.id,
            name: raw.name,
            status: status_label(raw.status).to_string(),
            percent_done: raw.percent_done,
            progress: round_percent(raw.percent_done),
            rate_download: raw.rate_download,
            eta: raw.eta,
            size_when_done: raw.size_when_done,
            downloaded_ever: raw.downloaded_ever,
            added_date: raw.added_date,
            is_finished: raw.is_finished,
            files,
        }
    }
}

#[async_trait]
impl DownloadBackend for TransmissionBackend {
    async fn list(&self) -> TorrentResult<Vec<TorrentSummary>> {
        let arguments = self
            .transport
            .call("torrent-get", json!({ "fields": LIST_FIELDS }))
            .await
            .map_err(|err| TorrentError::rpc("torrent-get", &err))?;
        let parsed: ListArguments =
            serde_json::from_value(arguments).map_err(|err| TorrentError::Backend {
                operation: "torrent-get",
                detail: err.to_string(),
            })?;
        Ok(parsed
            .torrents
            .into_iter()
            .map(|raw| self.summarize(raw))
            .collect())
    }

    async fn add(&self, request: AddTorrent) -> TorrentResult<()> {
        self.transport
            .call(
                "torrent-add",
                json!({
                    "metainfo": request.metainfo,
                    "download-dir": self.download_dir,
                    "paused": false,
                }),
            )
            .await
            .map_err(|err| TorrentError::rpc("torrent-add", &err))?;
        info!(download_dir = %self.download_dir, "torrent queued");
        Ok(())
    }

    async fn set_sequential(&self, id: i64, enabled: bool) -> TorrentResult<()> {
        self.transport
            .call(
                "torrent-set",
                json!({ "ids": [id], "sequentialDownload": enabled }),
            )
            .await
            .map_err(|err| TorrentError::rpc("torrent-set", &err))?;
        debug!(torrent_id = id, enabled, "sequential download updated");
        Ok(())
    }

    async fn focus(&self, id: i64, file_index: usize, ratio: f64) -> TorrentResult<()> {
        self.negotiator.focus(id, file_index, ratio).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransmissionClient;
    use httpmock::prelude::*;
    use playready_config::TransmissionConfig;
    use playready_library::FsCatalog;
    use tempfile::TempDir;

    const RPC_PATH: &str = "/transmission/rpc";

    fn backend(server: &MockServer, root: &TempDir) -> anyhow::Result<TransmissionBackend> {
        let client = TransmissionClient::new(&TransmissionConfig {
            url: server.url(RPC_PATH),
            username: String::new(),
            password: String::new(),
            download_dir: "/downloads".to_string(),
        })?;
        let catalog = FsCatalog::new(
            root.path().join("videos"),
            root.path().join("hls"),
            root.path().join("mp4"),
        );
        catalog.ensure_dirs()?;
        std::fs::create_dir_all(root.path().join("videos/Show"))?;
        std::fs::write(root.path().join("videos/Show/ep1.mkv"), b"partial")?;
        Ok(TransmissionBackend::new(
            Arc::new(client),
            Arc::new(catalog),
            Metrics::new()?,
            "/downloads",
        ))
    }

    #[tokio::test]
    async fn list_maps_status_progress_and_streamable_files() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path(RPC_PATH);
            then.status(200).json_body(json!({
                "result": "success",
                "arguments": {"torrents": [{
                    "id": 4,
                    "name": "Show",
                    "status": 4,
                    "percentDone": 0.426,
                    "rateDownload": 1024,
                    "eta": 90,
                    "sizeWhenDone": 2000,
                    "downloadedEver": 852,
                    "addedDate": 1_700_000_000,
                    "isFinished": false,
                    "files": [
                        {"name": "Show/ep1.mkv", "length": 1000, "bytesCompleted": 505},
                        {"name": "Show/notes.txt", "length": 10, "bytesCompleted": 10},
                        {"name": "Show/ep2.mkv", "length": 990, "bytesCompleted": 0}
                    ]
                }]}
            }));
        });

        let root = TempDir::new()?;
        let items = backend(&server, &root)?.list().await?;
        assert_eq!(items.len(), 1);
        let torrent = &items[0];
        assert_eq!(torrent.status, "downloading");
        assert_eq!(torrent.progress, 43);
        assert_eq!(torrent.files.len(), 2, "unsupported paths are skipped");
        assert_eq!(torrent.files[0].index, 0);
        assert_eq!(torrent.files[0].progress, 51);
        assert!(torrent.files[0].streamable);
        assert_eq!(torrent.files[1].index, 2);
        assert!(!torrent.files[1].streamable);
        Ok(())
    }

    #[tokio::test]
    async fn add_passes_metainfo_and_download_dir() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let add = server.mock(|when, then| {
            when.method(POST).path(RPC_PATH).json_body(json!({
                "method": "torrent-add",
                "arguments": {"metainfo": "ZDQ6aW5mb2U=", "download-dir": "/downloads", "paused": false}
            }));
            then.status(200)
                .json_body(json!({"result": "success", "arguments": {}}));
        });

        let root = TempDir::new()?;
        backend(&server, &root)?
            .add(AddTorrent {
                metainfo: "ZDQ6aW5mb2U=".to_string(),
            })
            .await?;
        add.assert();
        Ok(())
    }

    #[tokio::test]
    async fn backend_rejection_becomes_backend_error() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path(RPC_PATH);
            then.status(200)
                .json_body(json!({"result": "invalid or corrupt torrent file", "arguments": {}}));
        });

        let root = TempDir::new()?;
        let err = backend(&server, &root)?
            .set_sequential(3, true)
            .await
            .expect_err("rejection must surface");
        assert!(matches!(
            err,
            TorrentError::Backend {
                operation: "torrent-set",
                ..
            }
        ));
        Ok(())
    }
}
