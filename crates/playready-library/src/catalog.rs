//! Filesystem-backed media catalog.
//!
//! # Design
//! - Source files live under one library root; HLS and MP4 artifacts mirror
//!   the relative layout under their own roots.
//! - Unreadable entries are skipped during listing; only an unreadable root is an error.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use playready_media_core::{
    HLS_MARKER_FILE, HLS_PLAYLIST_FILE, JobKind, MP4_MARKER_EXTENSION, MediaCatalog, MediaError, MediaResource, MediaResult,
    OutputPaths, ResolvedMedia, extension_of, is_supported_extension, normalize_media_path,
};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Catalog rooted at a videos directory with sibling artifact roots.
#[derive(Debug, Clone)]
pub struct FsCatalog {
    videos_dir: PathBuf,
    hls_dir: PathBuf,
    mp4_dir: PathBuf,
}

impl FsCatalog {
    /// Build a catalog over the given roots.
    #[must_use]
    pub fn new(
        videos_dir: impl Into<PathBuf>,
        hls_dir: impl Into<PathBuf>,
        mp4_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            videos_dir: videos_dir.into(),
            hls_dir: hls_dir.into(),
            mp4_dir: mp4_dir.into(),
        }
    }

    /// Library root holding source files.
    #[must_use]
    pub fn videos_dir(&self) -> &Path {
        &self.videos_dir
    }

    /// Root directory served under `/hls`.
    #[must_use]
    pub fn hls_dir(&self) -> &Path {
        &self.hls_dir
    }

    /// Create the library and artifact roots if they are missing.
    ///
    /// # Errors
    ///
    /// Returns an IO error if any root cannot be created.
    pub fn ensure_dirs(&self) -> MediaResult<()> {
        for dir in [&self.videos_dir, &self.hls_dir, &self.mp4_dir] {
            fs::create_dir_all(dir)
                .map_err(|source| MediaError::io("ensure_dirs", dir, source))?;
        }
        Ok(())
    }

    fn source_path(&self, relative: &str) -> PathBuf {
        self.videos_dir.join(relative)
    }

    fn to_resource(&self, path: &Path, metadata: &fs::Metadata) -> Option<MediaResource> {
        let relative = path.strip_prefix(&self.videos_dir).ok()?;
        let relative = relative
            .components()
            .map(|part| part.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let name = path.file_name()?.to_string_lossy().into_owned();
        let modified_at =
            DateTime::<Utc>::from(metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH));
        Some(MediaResource {
            extension: extension_of(&name),
            name,
            path: relative,
            size: metadata.len(),
            modified_at,
        })
    }
}

impl MediaCatalog for FsCatalog {
    fn resolve(&self, raw: &str) -> MediaResult<ResolvedMedia> {
        let relative = normalize_media_path(raw)?;
        let full = self.source_path(&relative);
        if !is_within(&self.videos_dir, &full) {
            return Err(MediaError::invalid("path", "invalid file path", raw));
        }
        match fs::metadata(&full) {
            Ok(meta) if meta.is_file() => Ok(ResolvedMedia { relative, full }),
            Ok(_) => Err(MediaError::NotFound { path: relative }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(MediaError::NotFound { path: relative })
            }
            Err(err) => Err(MediaError::io("resolve", &full, err)),
        }
    }

    fn list(&self) -> MediaResult<Vec<MediaResource>> {
        fs::metadata(&self.videos_dir)
            .map_err(|source| MediaError::io("list", &self.videos_dir, source))?;

        let mut resources = Vec::new();
        for entry in WalkDir::new(&self.videos_dir).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!(error = %err, "skipping unreadable library entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if !is_supported_extension(&extension_of(&entry.file_name().to_string_lossy())) {
                continue;
            }
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if let Some(resource) = self.to_resource(entry.path(), &metadata) {
                resources.push(resource);
            }
        }
        resources.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
        Ok(resources)
    }

    fn output_paths(&self, kind: JobKind, relative: &str) -> OutputPaths {
        let base = strip_extension(relative);
        match kind {
            JobKind::Hls => {
                let dir = self.hls_dir.join(base);
                OutputPaths {
                    artifact: dir.join(HLS_PLAYLIST_FILE),
                    marker: dir.join(HLS_MARKER_FILE),
                    dir,
                    url: format!("/hls/{base}/{HLS_PLAYLIST_FILE}"),
                }
            }
            JobKind::Mp4 => {
                let artifact = self.mp4_dir.join(format!("{base}.mp4"));
                let dir = artifact
                    .parent()
                    .map_or_else(|| self.mp4_dir.clone(), Path::to_path_buf);
                OutputPaths {
                    marker: artifact.with_extension(MP4_MARKER_EXTENSION),
                    dir,
                    artifact,
                    url: format!("/api/stream-mp4/{relative}"),
                }
            }
        }
    }

    fn contains(&self, relative: &str) -> bool {
        let full = self.source_path(relative);
        is_within(&self.videos_dir, &full) && full.is_file()
    }

    fn delete(&self, relative: &str) -> MediaResult<()> {
        let resolved = self.resolve(relative)?;
        fs::remove_file(&resolved.full)
            .map_err(|source| MediaError::io("delete.source", &resolved.full, source))?;

        let hls = self.output_paths(JobKind::Hls, &resolved.relative);
        remove_if_present(&hls.dir, true)?;
        let mp4 = self.output_paths(JobKind::Mp4, &resolved.relative);
        remove_if_present(&mp4.artifact, false)?;
        remove_if_present(&mp4.marker, false)?;

        info!(path = %resolved.relative, "deleted media and derived artifacts");
        Ok(())
    }
}

fn remove_if_present(path: &Path, directory: bool) -> MediaResult<()> {
    let result = if directory {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(MediaError::io("delete.artifact", path, err)),
    }
}

fn strip_extension(relative: &str) -> &str {
    let name_start = relative.rfind('/').map_or(0, |idx| idx + 1);
    relative[name_start..]
        .rfind('.')
        .map_or(relative, |dot| &relative[..name_start + dot])
}

fn is_within(root: &Path, target: &Path) -> bool {
    let (Ok(root), Ok(target)) = (std::path::absolute(root), std::path::absolute(target)) else {
        return false;
    };
    target.starts_with(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::time::Duration;
    use tempfile::TempDir;

    fn catalog(root: &TempDir) -> FsCatalog {
        FsCatalog::new(
            root.path().join("videos"),
            root.path().join("hls"),
            root.path().join("mp4"),
        )
    }

    fn write_with_mtime(path: &Path, bytes: &[u8], age: Duration) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)?;
        let file = fs::File::options().write(true).open(path)?;
        file.set_modified(SystemTime::now() - age)?;
        Ok(())
    }

    #[test]
    fn output_paths_mirror_the_relative_layout() {
        let catalog = FsCatalog::new("/v", "/h", "/m");
        let hls = catalog.output_paths(JobKind::Hls, "a/b/movie.mkv");
        assert_eq!(hls.dir, PathBuf::from("/h/a/b/movie"));
        assert_eq!(hls.artifact, PathBuf::from("/h/a/b/movie/index.m3u8"));
        assert_eq!(hls.url, "/hls/a/b/movie/index.m3u8");
        assert_eq!(hls.marker, PathBuf::from("/h/a/b/movie/.transcoded"));

        let mp4 = catalog.output_paths(JobKind::Mp4, "a/b/movie.mkv");
        assert_eq!(mp4.artifact, PathBuf::from("/m/a/b/movie.mp4"));
        assert_eq!(mp4.dir, PathBuf::from("/m/a/b"));
        assert_eq!(mp4.url, "/api/stream-mp4/a/b/movie.mkv");
        assert_eq!(mp4.marker, PathBuf::from("/m/a/b/movie.mp4transcoded"));

        let sibling = catalog.output_paths(JobKind::Mp4, "a/b/other.mkv");
        assert_eq!(sibling.dir, mp4.dir);
        assert_ne!(sibling.marker, mp4.marker);
    }

    #[test]
    fn resolve_distinguishes_missing_and_invalid() -> Result<()> {
        let root = TempDir::new()?;
        let catalog = catalog(&root);
        catalog.ensure_dirs()?;
        fs::write(catalog.videos_dir().join("clip.mkv"), b"data")?;

        let resolved = catalog.resolve("/clip.mkv")?;
        assert_eq!(resolved.relative, "clip.mkv");
        assert_eq!(resolved.extension(), "mkv");

        assert!(matches!(
            catalog.resolve("missing.mkv"),
            Err(MediaError::NotFound { .. })
        ));
        assert!(matches!(
            catalog.resolve("clip.txt"),
            Err(MediaError::InvalidRequest { .. })
        ));
        Ok(())
    }

    #[test]
    fn list_skips_unsupported_files_and_sorts_newest_first() -> Result<()> {
        let root = TempDir::new()?;
        let catalog = catalog(&root);
        let videos = root.path().join("videos");
        write_with_mtime(&videos.join("old.mkv"), b"old", Duration::from_secs(600))?;
        write_with_mtime(&videos.join("nested/new.MP4"), b"new!", Duration::from_secs(5))?;
        write_with_mtime(&videos.join("notes.txt"), b"skip", Duration::from_secs(1))?;

        let listed = catalog.list()?;
        let paths: Vec<_> = listed.iter().map(|item| item.path.as_str()).collect();
        assert_eq!(paths, vec!["nested/new.MP4", "old.mkv"]);
        assert_eq!(listed[0].extension, "mp4");
        assert_eq!(listed[0].size, 4);
        assert!(catalog.contains("old.mkv"));
        assert!(!catalog.contains("notes.mkv"));
        Ok(())
    }

    #[test]
    fn delete_removes_source_and_artifacts() -> Result<()> {
        let root = TempDir::new()?;
        let catalog = catalog(&root);
        catalog.ensure_dirs()?;
        fs::write(catalog.videos_dir().join("show.mkv"), b"data")?;
        let hls = catalog.output_paths(JobKind::Hls, "show.mkv");
        fs::create_dir_all(&hls.dir)?;
        fs::write(&hls.artifact, b"#EXTM3U")?;
        let mp4 = catalog.output_paths(JobKind::Mp4, "show.mkv");
        fs::write(&mp4.artifact, b"mp4")?;
        fs::write(&mp4.marker, b"v4")?;

        catalog.delete("show.mkv")?;
        assert!(!catalog.contains("show.mkv"));
        assert!(!hls.dir.exists());
        assert!(!mp4.artifact.exists());
        assert!(!mp4.marker.exists());
        assert!(matches!(
            catalog.delete("show.mkv"),
            Err(MediaError::NotFound { .. })
        ));
        Ok(())
    }
}
