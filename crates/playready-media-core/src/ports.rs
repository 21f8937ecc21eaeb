//! Ports implemented by the filesystem catalog and the conversion toolchain.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

use crate::error::MediaResult;
use crate::model::{JobKind, MediaResource, OutputPaths, ResolvedMedia};

/// Callback receiving conversion progress percentages.
pub type ProgressSink = Arc<dyn Fn(u8) + Send + Sync>;

/// Source library and artifact layout.
pub trait MediaCatalog: Send + Sync {
    /// Normalise `raw` and confirm the source file exists under the library root.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for malformed or escaping paths and `NotFound`
    /// when the file is missing.
    fn resolve(&self, raw: &str) -> MediaResult<ResolvedMedia>;

    /// List supported source files, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the library root cannot be read.
    fn list(&self) -> MediaResult<Vec<MediaResource>>;

    /// Artifact locations for the given conversion kind and relative path.
    fn output_paths(&self, kind: JobKind, relative: &str) -> OutputPaths;

    /// Whether a regular file exists at `relative` under the library root.
    fn contains(&self, relative: &str) -> bool;

    /// Remove a source file and its derived artifacts.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the source is missing and `Io` on removal failures.
    fn delete(&self, relative: &str) -> MediaResult<()>;
}

/// HLS conversion request.
#[derive(Debug, Clone)]
pub struct HlsRequest {
    /// Source file.
    pub input: PathBuf,
    /// Directory receiving segments.
    pub output_dir: PathBuf,
    /// Playlist path inside `output_dir`.
    pub playlist: PathBuf,
    /// Tail the source while it grows, ending after this idle period.
    pub follow_idle: Option<Duration>,
}

/// MP4 conversion request.
#[derive(Debug, Clone)]
pub struct Mp4Request {
    /// Source file.
    pub input: PathBuf,
    /// Final output file.
    pub output: PathBuf,
}

/// Live fragmented MP4 request.
#[derive(Debug, Clone)]
pub struct LiveRequest {
    /// Source file.
    pub input: PathBuf,
    /// Tail the source while it grows.
    pub follow: bool,
    /// Idle period after which a followed source is treated as complete; zero follows forever.
    pub idle_timeout: Duration,
}

/// Conversion toolchain consumed as a black box.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Version string written into HLS markers.
    fn hls_version(&self) -> &str;

    /// Version string written into MP4 markers.
    fn mp4_version(&self) -> &str;

    /// Produce an HLS playlist and segments.
    async fn convert_hls(&self, request: HlsRequest, cancel: CancellationToken) -> MediaResult<()>;

    /// Produce a seekable MP4, reporting progress through `progress`.
    async fn convert_mp4(
        &self,
        request: Mp4Request,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> MediaResult<()>;

    /// Remux or transcode into fragmented MP4 written to `out` as it is produced.
    async fn stream_fragmented_mp4(
        &self,
        request: LiveRequest,
        out: &mut (dyn AsyncWrite + Send + Unpin),
        cancel: CancellationToken,
    ) -> MediaResult<()>;
}
