//! Media records and source-directory discovery.
//!
//! A [`MediaRecord`] is one ingested item: display name, source path, the
//! base64-encoded payload, and its kind. Records are created per discovered
//! file and never mutated afterwards; they only go away when the owning
//! collection is deleted.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Supported image file extensions, matched case-insensitively.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];
/// Supported video file extensions, matched case-insensitively.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv", "webm"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Field name the payload is stored under; also the vectorized field.
    pub fn payload_field(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            MediaKind::Image => IMAGE_EXTENSIONS,
            MediaKind::Video => VIDEO_EXTENSIONS,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ingested item, tagged by kind. The payload is already encoded for
/// transport.
#[derive(Debug, Clone)]
pub struct MediaRecord {
    pub name: String,
    pub path: String,
    pub payload: String,
    pub kind: MediaKind,
}

impl MediaRecord {
    /// Read a file and encode it into a record of the given kind.
    pub fn from_file(path: &Path, kind: MediaKind) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| Error::Ingest(format!("no file name: {}", path.display())))?;

        let bytes = std::fs::read(path)
            .map_err(|e| Error::Ingest(format!("failed to read {}: {}", path.display(), e)))?;

        Ok(Self {
            name,
            path: path.display().to_string(),
            payload: BASE64.encode(bytes),
            kind,
        })
    }

    /// Record properties as sent to the store. The payload lives under the
    /// kind's field so it matches the collection's vectorizable fields;
    /// `mediaType` is always populated since aggregation groups by it.
    pub fn to_properties(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "path": self.path,
            self.kind.payload_field(): self.payload,
            "mediaType": self.kind.as_str(),
        })
    }
}

/// Base64-encode a file for use as a query payload.
pub fn file_to_base64(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(BASE64.encode(bytes))
}

/// Scan a source directory (non-recursive) for files of the given kind.
/// Returns paths sorted by file name for deterministic ordering. A missing
/// directory yields an empty list; filtering is case-insensitive on the
/// extension.
pub fn discover(dir: &Path, kind: MediaKind) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let include_set = extension_globset(kind.extensions())?;
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| Error::Ingest(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().to_string();
        if include_set.is_match(&file_name) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

fn extension_globset(extensions: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for ext in extensions {
        let glob = GlobBuilder::new(&format!("*.{}", ext))
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::Ingest(e.to_string()))?;
        builder.add(glob);
    }
    builder.build().map_err(|e| Error::Ingest(e.to_string()))
}
