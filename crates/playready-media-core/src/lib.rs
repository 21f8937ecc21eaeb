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

//! Media domain types and ports shared by the catalog, the pipeline, and the HTTP layer.
//!
//! Layout: `model.rs` (jobs, resources, output paths), `path.rs` (request path
//! normalisation), `ports.rs` (catalog and converter traits), `error.rs`.

pub mod error;
pub mod model;
pub mod path;
pub mod ports;

pub use error::{MediaError, MediaResult};
pub use model::{
    HLS_MARKER_FILE, HLS_PLAYLIST_FILE, JobKey, JobKind, JobState, JobStatus,
    MP4_MARKER_EXTENSION, MediaResource, OutputPaths, ResolvedMedia,
};
pub use path::{SUPPORTED_EXTENSIONS, extension_of, is_supported_extension, normalize_media_path};
pub use ports::{Converter, HlsRequest, LiveRequest, MediaCatalog, Mp4Request, ProgressSink};
