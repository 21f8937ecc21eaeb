#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Backend-agnostic torrent interfaces, DTOs, and the piece-focus negotiator.

pub mod error;
pub mod focus;
pub mod model;
pub mod rpc;
pub mod service;

pub use error::{TorrentError, TorrentResult};
pub use focus::{FocusMode, PieceFocusNegotiator, PieceSpan};
pub use model::{
    AddTorrent, FocusRequest, TorrentFile, TorrentListing, TorrentSummary, round_percent,
    status_label,
};
pub use rpc::{RpcError, RpcTransport};
pub use service::{DownloadBackend, MAX_METAINFO_BYTES, TorrentService, playback_ratio};
