//! Reader that follows a file while another process is still writing it.
//!
//! # Design
//! - End of file is not the end of the stream: the reader re-stats and polls
//!   until the file grows again or the idle timeout elapses.
//! - A zero idle timeout follows forever; only cancellation stops it.
//! - Polling sleeps race the cancellation token so disconnects stop promptly.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use futures_util::Stream;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Default interval between size checks at end of file.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Polling and idle behaviour for a [`GrowingFileReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowOptions {
    /// Sleep between size checks when no new data is available.
    pub poll: Duration,
    /// Report end of stream after this long without growth; zero follows forever.
    pub idle_timeout: Duration,
}

impl FollowOptions {
    /// Options with the default poll interval and the given idle timeout.
    #[must_use]
    pub const fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            poll: DEFAULT_POLL_INTERVAL,
            idle_timeout,
        }
    }

    /// Override the poll interval.
    #[must_use]
    pub const fn poll_every(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }
}

impl Default for FollowOptions {
    fn default() -> Self {
        Self::with_idle_timeout(Duration::ZERO)
    }
}

/// Failures surfaced while following a file.
#[derive(Debug, Error)]
pub enum FollowError {
    /// IO failure while opening, reading, or forwarding the file.
    #[error("growing file io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// File being followed.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The cancellation token fired while waiting for more data.
    #[error("growing file read cancelled")]
    Cancelled,
}

impl FollowError {
    fn io(operation: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Async reader over a file that may still be growing.
#[derive(Debug)]
pub struct GrowingFileReader {
    path: PathBuf,
    file: File,
    last_size: u64,
    last_growth: Instant,
    options: FollowOptions,
    cancel: CancellationToken,
}

impl GrowingFileReader {
    /// Open `path` for following.
    ///
    /// # Errors
    ///
    /// Returns [`FollowError::Io`] if the file cannot be opened or stat'ed.
    pub async fn open(
        path: impl AsRef<Path>,
        options: FollowOptions,
        cancel: CancellationToken,
    ) -> Result<Self, FollowError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .await
            .map_err(|source| FollowError::io("follow.open", &path, source))?;
        let last_size = file
            .metadata()
            .await
            .map_err(|source| FollowError::io("follow.stat", &path, source))?
            .len();
        Ok(Self {
            path,
            file,
            last_size,
            last_growth: Instant::now(),
            options,
            cancel,
        })
    }

    /// Read into `buf`, waiting for growth at end of file.
    ///
    /// Returns `Ok(0)` once the idle timeout has elapsed without growth.
    ///
    /// # Errors
    ///
    /// Returns [`FollowError::Cancelled`] if the token fires while waiting and
    /// [`FollowError::Io`] on read or stat failures.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, FollowError> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let read = self
                .file
                .read(buf)
                .await
                .map_err(|source| FollowError::io("follow.read", &self.path, source))?;
            if read > 0 {
                self.last_growth = Instant::now();
                return Ok(read);
            }

            let size = self
                .file
                .metadata()
                .await
                .map_err(|source| FollowError::io("follow.stat", &self.path, source))?
                .len();
            if size > self.last_size {
                self.last_size = size;
                continue;
            }
            if !self.options.idle_timeout.is_zero()
                && self.last_growth.elapsed() >= self.options.idle_timeout
            {
                trace!(path = %self.path.display(), "growing file went idle");
                return Ok(0);
            }
            tokio::select! {
                () = self.cancel.cancelled() => return Err(FollowError::Cancelled),
                () = tokio::time::sleep(self.options.poll) => {}
            }
        }
    }

    /// Adapt the reader into a byte stream suitable for an HTTP body.
    pub fn into_stream(
        self,
        chunk_size: usize,
    ) -> impl Stream<Item = Result<Bytes, FollowError>> + Send + 'static {
        let mut reader = self;
        async_stream::try_stream! {
            let mut buf = vec![0_u8; chunk_size.max(1)];
            loop {
                let read = reader.read(&mut buf).await?;
                if read == 0 {
                    break;
                }
                yield Bytes::copy_from_slice(&buf[..read]);
            }
        }
    }

    /// Copy everything the reader produces into `writer`, returning the byte count.
    ///
    /// # Errors
    ///
    /// Returns an error when reading fails, the token fires, or `writer` rejects data.
    pub async fn pump_into<W>(mut self, writer: &mut W) -> Result<u64, FollowError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut buf = vec![0_u8; 32 * 1024];
        let mut total = 0_u64;
        loop {
            let read = self.read(&mut buf).await?;
            if read == 0 {
                break;
            }
            writer
                .write_all(&buf[..read])
                .await
                .map_err(|source| FollowError::io("follow.forward", &self.path, source))?;
            total += read as u64;
        }
        writer
            .flush()
            .await
            .map_err(|source| FollowError::io("follow.forward", &self.path, source))?;
        Ok(total)
    }
}
