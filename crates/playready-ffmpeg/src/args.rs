//! Command-line builders for the conversion toolchain.

use std::path::Path;

/// Input placeholder used when the source is fed through stdin.
pub const STDIN_INPUT: &str = "pipe:0";

fn push_all(args: &mut Vec<String>, items: &[&str]) {
    args.extend(items.iter().map(|item| (*item).to_string()));
}

fn stereo_aac(args: &mut Vec<String>) {
    push_all(args, &["-c:a", "aac", "-ac", "2", "-b:a", "192k", "-ar", "48000"]);
}

fn h264_video(args: &mut Vec<String>, transcode: bool) {
    if transcode {
        push_all(args, &["-c:v", "libx264", "-preset", "veryfast", "-crf", "20"]);
    } else {
        push_all(args, &["-c:v", "copy"]);
    }
}

/// Whether a probed codec name requires re-encoding to H.264.
#[must_use]
pub fn needs_transcode(codec: Option<&str>) -> bool {
    codec.is_none_or(|name| name.trim() != "h264")
}

/// Arguments producing an HLS event playlist with fixed-length segments.
///
/// When `follow` is set the source is read from stdin.
#[must_use]
pub fn hls_args(
    input: &Path,
    output_dir: &Path,
    playlist: &Path,
    segment_seconds: u32,
    follow: bool,
) -> Vec<String> {
    let gop = (segment_seconds * 30).to_string();
    let mut args = vec!["-y".to_string()];
    if follow {
        push_all(&mut args, &["-fflags", "+genpts", "-i", STDIN_INPUT]);
    } else {
        args.push("-i".to_string());
        args.push(input.display().to_string());
    }
    push_all(&mut args, &["-sn"]);
    h264_video(&mut args, true);
    args.extend([
        "-g".to_string(),
        gop.clone(),
        "-keyint_min".to_string(),
        gop,
        "-sc_threshold".to_string(),
        "0".to_string(),
        "-force_key_frames".to_string(),
        format!("expr:gte(t,n_forced*{segment_seconds})"),
    ]);
    stereo_aac(&mut args);
    args.extend([
        "-f".to_string(),
        "hls".to_string(),
        "-hls_time".to_string(),
        segment_seconds.to_string(),
    ]);
    push_all(
        &mut args,
        &[
            "-hls_list_size",
            "0",
            "-hls_playlist_type",
            "event",
            "-hls_flags",
            "independent_segments+temp_file",
            "-hls_segment_filename",
        ],
    );
    args.push(output_dir.join("segment%05d.ts").display().to_string());
    args.push(playlist.display().to_string());
    args
}

/// Arguments producing a faststart MP4 at `output`, with progress on stdout.
#[must_use]
pub fn mp4_args(input: &Path, output: &Path, transcode: bool) -> Vec<String> {
    let mut args = vec!["-y".to_string(), "-i".to_string(), input.display().to_string()];
    push_all(
        &mut args,
        &["-sn", "-map", "0:v:0?", "-map", "0:a:0?", "-progress", "pipe:1", "-nostats"],
    );
    h264_video(&mut args, transcode);
    stereo_aac(&mut args);
    push_all(&mut args, &["-f", "mp4", "-movflags", "+faststart"]);
    args.push(output.display().to_string());
    args
}

/// Arguments producing fragmented MP4 on stdout.
#[must_use]
pub fn live_args(input: &Path, follow: bool, transcode: bool) -> Vec<String> {
    let mut args = vec!["-i".to_string()];
    if follow {
        args.push(STDIN_INPUT.to_string());
    } else {
        args.push(input.display().to_string());
    }
    push_all(
        &mut args,
        &["-fflags", "+genpts", "-sn", "-map", "0:v:0?", "-map", "0:a:0?"],
    );
    h264_video(&mut args, transcode);
    if transcode {
        push_all(&mut args, &["-pix_fmt", "yuv420p"]);
    }
    stereo_aac(&mut args);
    push_all(
        &mut args,
        &[
            "-movflags",
            "frag_keyframe+empty_moov+default_base_moof",
            "-f",
            "mp4",
            "pipe:1",
        ],
    );
    args
}

/// `ffprobe` arguments printing the first video stream's codec name.
#[must_use]
pub fn probe_codec_args(input: &Path) -> Vec<String> {
    let mut args = Vec::new();
    push_all(
        &mut args,
        &[
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=codec_name",
            "-of",
            "default=nokey=1:noprint_wrappers=1",
        ],
    );
    args.push(input.display().to_string());
    args
}

/// `ffprobe` arguments printing the container duration in seconds.
#[must_use]
pub fn probe_duration_args(input: &Path) -> Vec<String> {
    let mut args = Vec::new();
    push_all(
        &mut args,
        &[
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=nokey=1:noprint_wrappers=1",
        ],
    );
    args.push(input.display().to_string());
    args
}
