//! Artifact readiness checks.
//!
//! Pure filesystem reads: a marker whose trimmed content matches the converter
//! version, plus an artifact that looks playable.

use std::fs;
use std::path::Path;

use playready_media_core::OutputPaths;

/// Smallest MP4 output treated as playable.
pub const MP4_READY_MIN_BYTES: u64 = 512 * 1024;

/// Result of probing an HLS output directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HlsProbe {
    /// Playlist and at least one segment are present under a matching marker.
    pub ready: bool,
    /// Number of `.ts` segments; zero when the marker or playlist check fails.
    pub segments: usize,
}

/// Probe an HLS output directory.
#[must_use]
pub fn probe_hls(paths: &OutputPaths, version: &str) -> HlsProbe {
    if !marker_matches(&paths.marker, version) {
        return HlsProbe::default();
    }
    match fs::metadata(&paths.artifact) {
        Ok(meta) if meta.len() > 0 => {}
        _ => return HlsProbe::default(),
    }
    let segments = fs::read_dir(&paths.dir).map_or(0, |entries| {
        entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".ts"))
            .count()
    });
    HlsProbe {
        ready: segments > 0,
        segments,
    }
}

/// Probe an MP4 output file.
#[must_use]
pub fn probe_mp4(paths: &OutputPaths, version: &str) -> bool {
    marker_matches(&paths.marker, version)
        && fs::metadata(&paths.artifact).is_ok_and(|meta| meta.len() >= MP4_READY_MIN_BYTES)
}

fn marker_matches(marker: &Path, version: &str) -> bool {
    fs::read_to_string(marker).is_ok_and(|content| content.trim() == version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    fn hls_paths(root: &TempDir) -> OutputPaths {
        let dir = root.path().join("movie");
        OutputPaths {
            artifact: dir.join("index.m3u8"),
            marker: dir.join(".transcoded"),
            dir,
            url: "/hls/movie/index.m3u8".to_string(),
        }
    }

    #[test]
    fn hls_requires_marker_playlist_and_segments() -> Result<()> {
        let root = TempDir::new()?;
        let paths = hls_paths(&root);
        fs::create_dir_all(&paths.dir)?;
        assert_eq!(probe_hls(&paths, "v4"), HlsProbe::default());

        fs::write(&paths.marker, "v4\n")?;
        fs::write(&paths.artifact, "")?;
        fs::write(paths.dir.join("segment00000.ts"), b"ts")?;
        assert_eq!(probe_hls(&paths, "v4"), HlsProbe::default());

        fs::write(&paths.artifact, "#EXTM3U\n")?;
        fs::write(paths.dir.join("segment00001.ts"), b"ts")?;
        assert_eq!(
            probe_hls(&paths, "v4"),
            HlsProbe {
                ready: true,
                segments: 2
            }
        );
        Ok(())
    }

    #[test]
    fn version_change_invalidates_artifacts() -> Result<()> {
        let root = TempDir::new()?;
        let paths = hls_paths(&root);
        fs::create_dir_all(&paths.dir)?;
        fs::write(&paths.marker, "v3")?;
        fs::write(&paths.artifact, "#EXTM3U\n")?;
        fs::write(paths.dir.join("segment00000.ts"), b"ts")?;
        assert!(!probe_hls(&paths, "v4").ready);

        let mp4 = OutputPaths {
            dir: root.path().to_path_buf(),
            artifact: root.path().join("movie.mp4"),
            marker: root.path().join("movie.mp4transcoded"),
            url: "/api/stream-mp4/movie.mkv".to_string(),
        };
        fs::write(&mp4.artifact, vec![0_u8; 600 * 1024])?;
        fs::write(&mp4.marker, "v3")?;
        assert!(!probe_mp4(&mp4, "v4"));
        fs::write(&mp4.marker, " v4 ")?;
        assert!(probe_mp4(&mp4, "v4"));
        Ok(())
    }

    #[test]
    fn small_mp4_is_not_ready() -> Result<()> {
        let root = TempDir::new()?;
        let mp4 = OutputPaths {
            dir: root.path().to_path_buf(),
            artifact: root.path().join("movie.mp4"),
            marker: root.path().join("movie.mp4transcoded"),
            url: String::new(),
        };
        fs::write(&mp4.marker, "v4")?;
        fs::write(&mp4.artifact, vec![0_u8; 1024])?;
        assert!(!probe_mp4(&mp4, "v4"));
        Ok(())
    }
}
