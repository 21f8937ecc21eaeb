//! Piece-focus negotiation against a JSON-RPC download backend.
//!
//! # Design
//! - Backends differ in whether they accept a starting piece and in how they spell
//!   argument names; the negotiator learns which shape works and remembers it.
//! - A downgrade to [`FocusMode::Basic`] is permanent for the negotiator instance.
//! - Repeated reports that map to the already focused piece send nothing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use playready_telemetry::Metrics;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use crate::error::{TorrentError, TorrentResult};
use crate::rpc::{RpcError, RpcTransport};

/// Capability negotiated with the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusMode {
    /// Nothing learned yet.
    #[default]
    Unknown,
    /// The backend accepts a starting piece.
    Advanced,
    /// Only sequential download plus file priority is available.
    Basic,
}

impl FocusMode {
    /// Stable label used in metrics and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Advanced => "advanced",
            Self::Basic => "basic",
        }
    }
}

/// Piece layout of one file inside a torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceSpan {
    /// File length in bytes.
    pub length: i64,
    /// Torrent piece size in bytes.
    pub piece_size: i64,
    /// First piece covering the file.
    pub begin: i64,
    /// Last piece covering the file.
    pub end: i64,
}

impl PieceSpan {
    /// Piece holding the byte at `ratio` of the file, clamped to the file's pieces.
    ///
    /// Returns `None` when the layout cannot be mapped.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn piece_for_ratio(&self, ratio: f64) -> Option<i64> {
        if self.length <= 0 || self.piece_size <= 0 || self.end < self.begin {
            return None;
        }
        let ratio = if ratio.is_finite() {
            ratio.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let offset = (((self.length - 1) as f64) * ratio).floor().max(0.0) as i64;
        let piece = self.begin + offset / self.piece_size;
        Some(piece.clamp(self.begin, self.end))
    }
}

/// Spelling of the `torrent-set` arguments.
#[derive(Debug, Clone, Copy)]
struct FieldNaming {
    sequential: &'static str,
    from_piece: &'static str,
    priority_high: &'static str,
}

const NAMINGS: [FieldNaming; 2] = [
    FieldNaming {
        sequential: "sequentialDownload",
        from_piece: "sequentialDownloadFromPiece",
        priority_high: "priorityHigh",
    },
    FieldNaming {
        sequential: "sequential_download",
        from_piece: "sequential_download_from_piece",
        priority_high: "priority_high",
    },
];

#[derive(Debug, Default)]
struct NegotiatorState {
    mode: FocusMode,
    last_piece: HashMap<(i64, usize), i64>,
}

enum SpanFailure {
    /// The backend does not report piece boundaries at all.
    Unavailable,
    Other(TorrentError),
}

#[derive(Deserialize)]
struct PieceArguments {
    #[serde(default)]
    torrents: Vec<PieceTorrent>,
}

#[derive(Deserialize)]
struct PieceTorrent {
    #[serde(rename = "pieceSize")]
    piece_size_camel: Option<i64>,
    #[serde(rename = "piece_size")]
    piece_size_snake: Option<i64>,
    #[serde(default)]
    files: Vec<PieceFile>,
}

#[derive(Deserialize)]
struct PieceFile {
    #[serde(default)]
    length: i64,
    #[serde(rename = "beginPiece")]
    begin_camel: Option<i64>,
    #[serde(rename = "begin_piece")]
    begin_snake: Option<i64>,
    #[serde(rename = "endPiece")]
    end_camel: Option<i64>,
    #[serde(rename = "end_piece")]
    end_snake: Option<i64>,
}

/// Biases a remote download toward the viewer's playback position.
#[derive(Clone)]
pub struct PieceFocusNegotiator {
    transport: Arc<dyn RpcTransport>,
    metrics: Metrics,
    state: Arc<Mutex<NegotiatorState>>,
}

impl PieceFocusNegotiator {
    /// Build a negotiator over `transport` with nothing learned yet.
    #[must_use]
    pub fn new(transport: Arc<dyn RpcTransport>, metrics: Metrics) -> Self {
        Self {
            transport,
            metrics,
            state: Arc::new(Mutex::new(NegotiatorState::default())),
        }
    }

    /// Currently negotiated mode.
    #[must_use]
    pub fn mode(&self) -> FocusMode {
        self.lock_state().mode
    }

    /// Focus file `file_index` of torrent `id` around `ratio` of its length.
    ///
    /// # Errors
    ///
    /// Returns [`TorrentError::Backend`] when the backend rejects the request for a
    /// reason other than an unsupported argument.
    pub async fn focus(&self, id: i64, file_index: usize, ratio: f64) -> TorrentResult<()> {
        if self.mode() == FocusMode::Basic {
            return self.basic_focus(id, file_index).await;
        }

        let span = match self.fetch_span(id, file_index).await {
            Ok(span) => span,
            Err(SpanFailure::Unavailable) => {
                self.downgrade("piece boundaries are unavailable");
                return self.basic_focus(id, file_index).await;
            }
            Err(SpanFailure::Other(err)) => {
                warn!(torrent_id = id, file_index, error = %err, detail = %err.describe(), "piece metadata fetch failed; using basic focus");
                return self.basic_focus(id, file_index).await;
            }
        };

        let Some(piece) = span.piece_for_ratio(ratio) else {
            debug!(torrent_id = id, file_index, "piece layout not mappable; using basic focus");
            return self.basic_focus(id, file_index).await;
        };

        if self.lock_state().last_piece.get(&(id, file_index)) == Some(&piece) {
            debug!(torrent_id = id, file_index, piece, "focus unchanged");
            return Ok(());
        }

        self.metrics.inc_focus_request(FocusMode::Advanced.as_str());
        match self
            .send_variants(|naming| {
                json!({
                    "ids": [id],
                    naming.sequential: true,
                    naming.from_piece: piece,
                    naming.priority_high: [file_index],
                })
            })
            .await
        {
            Ok(()) => {
                let mut state = self.lock_state();
                state.mode = FocusMode::Advanced;
                state.last_piece.insert((id, file_index), piece);
                drop(state);
                debug!(torrent_id = id, file_index, piece, "advanced focus applied");
                Ok(())
            }
            Err(err) if err.is_unsupported_argument() => {
                self.downgrade("starting piece rejected");
                self.basic_focus(id, file_index).await
            }
            Err(err) => Err(TorrentError::rpc("torrent-set", &err)),
        }
    }

    async fn basic_focus(&self, id: i64, file_index: usize) -> TorrentResult<()> {
        self.metrics.inc_focus_request(FocusMode::Basic.as_str());
        self.send_variants(|naming| {
            json!({
                "ids": [id],
                naming.sequential: true,
                naming.priority_high: [file_index],
            })
        })
        .await
        .map_err(|err| TorrentError::rpc("torrent-set", &err))
    }

    /// Send `torrent-set` in each naming convention until one is not rejected as
    /// an unknown argument.
    async fn send_variants<F>(&self, build: F) -> Result<(), RpcError>
    where
        F: Fn(&FieldNaming) -> Value + Send + Sync,
    {
        let mut last = None;
        for naming in &NAMINGS {
            match self.transport.call("torrent-set", build(naming)).await {
                Ok(_) => return Ok(()),
                Err(err) if err.is_unsupported_argument() => {
                    debug!(naming = naming.sequential, detail = %err.detail(), "focus arguments rejected");
                    last = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last.unwrap_or_else(|| RpcError::Rejected {
            result: "no argument naming accepted".to_string(),
        }))
    }

    async fn fetch_span(&self, id: i64, file_index: usize) -> Result<PieceSpan, SpanFailure> {
        let arguments = self
            .transport
            .call(
                "torrent-get",
                json!({"ids": [id], "fields": ["pieceSize", "files"]}),
            )
            .await
            .map_err(|err| SpanFailure::Other(TorrentError::rpc("torrent-get", &err)))?;
        let parsed: PieceArguments = serde_json::from_value(arguments).map_err(|err| {
            SpanFailure::Other(TorrentError::Backend {
                operation: "torrent-get",
                detail: err.to_string(),
            })
        })?;

        let torrent = parsed
            .torrents
            .into_iter()
            .next()
            .ok_or(SpanFailure::Other(TorrentError::NotFound { what: "torrent" }))?;
        let file = torrent
            .files
            .get(file_index)
            .ok_or(SpanFailure::Other(TorrentError::NotFound {
                what: "torrent file",
            }))?;

        let (Some(begin), Some(end)) = (
            file.begin_camel.or(file.begin_snake),
            file.end_camel.or(file.end_snake),
        ) else {
            return Err(SpanFailure::Unavailable);
        };
        let piece_size = torrent
            .piece_size_camel
            .filter(|size| *size > 0)
            .or(torrent.piece_size_snake)
            .unwrap_or_default();
        if piece_size <= 0 {
            return Err(SpanFailure::Unavailable);
        }

        Ok(PieceSpan {
            length: file.length,
            piece_size,
            begin,
            end,
        })
    }

    fn downgrade(&self, reason: &'static str) {
        let mut state = self.lock_state();
        if state.mode != FocusMode::Basic {
            state.mode = FocusMode::Basic;
            drop(state);
            self.metrics.inc_focus_downgrade();
            info!(reason, "piece focus downgraded to basic mode");
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, NegotiatorState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("focus state mutex poisoned; continuing with recovered guard");
                poisoned.into_inner()
            }
        }
    }
}
