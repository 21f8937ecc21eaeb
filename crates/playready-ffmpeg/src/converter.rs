//! [`Converter`] implementation that shells out to `ffmpeg` and `ffprobe`.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use playready_library::{FollowOptions, GrowingFileReader};
use playready_media_core::{
    Converter, HlsRequest, LiveRequest, MediaError, MediaResult, Mp4Request, ProgressSink,
};
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::args::{
    hls_args, live_args, mp4_args, needs_transcode, probe_codec_args, probe_duration_args,
};
use crate::process::{Output, capture, run};
use crate::progress::{ProgressTracker, parse_duration};

/// Binary locations and marker versions for the toolchain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfmpegSettings {
    /// `ffmpeg` executable.
    pub ffmpeg: PathBuf,
    /// `ffprobe` executable.
    pub ffprobe: PathBuf,
    /// Version written into HLS markers.
    pub hls_version: String,
    /// Version written into MP4 markers.
    pub mp4_version: String,
    /// HLS segment length in seconds.
    pub hls_segment_seconds: u32,
}

impl Default for FfmpegSettings {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            hls_version: "v4".to_string(),
            mp4_version: "v4".to_string(),
            hls_segment_seconds: 20,
        }
    }
}

/// Converter backed by `ffmpeg` subprocesses.
#[derive(Debug, Clone)]
pub struct FfmpegConverter {
    settings: FfmpegSettings,
}

impl FfmpegConverter {
    /// Build a converter from settings.
    #[must_use]
    pub const fn new(settings: FfmpegSettings) -> Self {
        Self { settings }
    }

    async fn probe_codec(&self, input: &Path) -> Option<String> {
        match capture("probe_codec", &self.settings.ffprobe, &probe_codec_args(input)).await {
            Ok(codec) if !codec.is_empty() => Some(codec),
            Ok(_) => None,
            Err(err) => {
                debug!(error = %err.describe(), "codec probe failed; transcoding");
                None
            }
        }
    }

    async fn probe_duration(&self, input: &Path) -> f64 {
        match capture(
            "probe_duration",
            &self.settings.ffprobe,
            &probe_duration_args(input),
        )
        .await
        {
            Ok(raw) => parse_duration(&raw).unwrap_or(0.0),
            Err(err) => {
                debug!(error = %err.describe(), "duration probe failed; progress disabled");
                0.0
            }
        }
    }
}

fn temp_output(output: &Path) -> PathBuf {
    let mut name = OsString::from(output.as_os_str());
    name.push(".tmp.mp4");
    PathBuf::from(name)
}

fn remove_if_present(path: &Path) {
    if let Err(err) = fs::remove_file(path)
        && err.kind() != io::ErrorKind::NotFound
    {
        debug!(path = %path.display(), error = %err, "failed to remove stale output");
    }
}

#[async_trait]
impl Converter for FfmpegConverter {
    fn hls_version(&self) -> &str {
        &self.settings.hls_version
    }

    fn mp4_version(&self) -> &str {
        &self.settings.mp4_version
    }

    async fn convert_hls(&self, request: HlsRequest, cancel: CancellationToken) -> MediaResult<()> {
        fs::create_dir_all(&request.output_dir)
            .map_err(|source| MediaError::io("convert_hls", &request.output_dir, source))?;

        let follow = request.follow_idle.is_some();
        let args = hls_args(
            &request.input,
            &request.output_dir,
            &request.playlist,
            self.settings.hls_segment_seconds,
            follow,
        );
        let stdin = match request.follow_idle {
            Some(idle) => Some(
                GrowingFileReader::open(
                    &request.input,
                    FollowOptions::with_idle_timeout(idle),
                    cancel.clone(),
                )
                .await
                .map_err(|err| MediaError::backend("convert_hls", err.to_string()))?,
            ),
            None => None,
        };
        run(
            "convert_hls",
            &self.settings.ffmpeg,
            &args,
            stdin,
            Output::Discard,
            &cancel,
        )
        .await
    }

    async fn convert_mp4(
        &self,
        request: Mp4Request,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> MediaResult<()> {
        if let Some(parent) = request.output.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| MediaError::io("convert_mp4", parent, source))?;
        }

        let duration = self.probe_duration(&request.input).await;
        let codec = self.probe_codec(&request.input).await;
        let transcode = needs_transcode(codec.as_deref());
        let tmp = temp_output(&request.output);
        remove_if_present(&tmp);

        let args = mp4_args(&request.input, &tmp, transcode);
        let mut tracker = ProgressTracker::new(duration);
        let sink = progress.clone();
        let mut on_line = move |line: &str| {
            if let Some(percent) = tracker.observe(line) {
                sink(percent);
            }
        };
        let result = run(
            "convert_mp4",
            &self.settings.ffmpeg,
            &args,
            None,
            Output::Lines(&mut on_line),
            &cancel,
        )
        .await;
        if let Err(err) = result {
            remove_if_present(&tmp);
            return Err(err);
        }

        remove_if_present(&request.output);
        fs::rename(&tmp, &request.output)
            .map_err(|source| MediaError::io("convert_mp4.rename", &request.output, source))?;
        progress(100);
        Ok(())
    }

    async fn stream_fragmented_mp4(
        &self,
        request: LiveRequest,
        out: &mut (dyn AsyncWrite + Send + Unpin),
        cancel: CancellationToken,
    ) -> MediaResult<()> {
        let codec = self.probe_codec(&request.input).await;
        let args = live_args(&request.input, request.follow, needs_transcode(codec.as_deref()));
        let stdin = if request.follow {
            Some(
                GrowingFileReader::open(
                    &request.input,
                    FollowOptions::with_idle_timeout(request.idle_timeout),
                    cancel.clone(),
                )
                .await
                .map_err(|err| MediaError::backend("stream_mp4", err.to_string()))?,
            )
        } else {
            None
        };
        run(
            "stream_mp4",
            &self.settings.ffmpeg,
            &args,
            stdin,
            Output::Forward(out),
            &cancel,
        )
        .await
    }
}
