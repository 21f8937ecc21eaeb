//! Request path normalisation for library resources.
//!
//! # Design
//! - Paths are cleaned lexically as if rooted at `/`, so `..` can never climb out.
//! - Only a fixed set of container extensions is accepted.

use crate::error::{MediaError, MediaResult};

/// Container extensions accepted by the library (lowercase, no dot).
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["mp4", "mkv", "avi", "mov"];

/// Lowercase extension of a slash-separated path, without the dot.
#[must_use]
pub fn extension_of(path: &str) -> String {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.rfind('.')
        .map(|idx| name[idx + 1..].to_ascii_lowercase())
        .unwrap_or_default()
}

/// Whether `extension` (with or without a leading dot) names a supported container.
#[must_use]
pub fn is_supported_extension(extension: &str) -> bool {
    let ext = extension.trim().trim_start_matches('.').to_ascii_lowercase();
    SUPPORTED_EXTENSIONS.contains(&ext.as_str())
}

/// Normalise a raw request path into a library-relative path.
///
/// # Errors
///
/// Returns [`MediaError::InvalidRequest`] when the path is empty after
/// cleaning or its extension is not supported.
pub fn normalize_media_path(raw: &str) -> MediaResult<String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(MediaError::invalid("path", "invalid file name", raw));
    }
    let cleaned = clean_rooted(&value.replace('\\', "/"));
    if cleaned.is_empty() || cleaned == "." {
        return Err(MediaError::invalid("path", "invalid file name", raw));
    }
    if !is_supported_extension(&extension_of(&cleaned)) {
        return Err(MediaError::invalid("path", "unsupported file type", raw));
    }
    Ok(cleaned)
}

fn clean_rooted(value: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in value.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}
