//! Media library: sources, entry classification and path helpers.
//!
//! A source is a content root on disk identified by its source key. The key
//! prefix decides what kind of media the root holds.

pub mod jobs;
pub mod scanner;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

pub use jobs::{ScanJob, ScanJobs};
pub use scanner::scan_namespace;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("Unknown source: {0}")]
    UnknownSource(String),
    #[error("Source {key} is not a {expected} source")]
    WrongKind { key: String, expected: MediaKind },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

pub type LibraryResult<T> = Result<T, LibraryError>;

// =============================================================================
// Media kinds
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Manga,
    Movie,
    Music,
}

impl MediaKind {
    /// `ROOT_*` is manga, `V_*` is movie, `M_*` is music.
    pub fn from_source_key(key: &str) -> Option<Self> {
        if key.starts_with("ROOT_") {
            Some(MediaKind::Manga)
        } else if key.starts_with("V_") {
            Some(MediaKind::Movie)
        } else if key.starts_with("M_") {
            Some(MediaKind::Music)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Manga => "manga",
            MediaKind::Movie => "movie",
            MediaKind::Music => "music",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Type of a folder entry as shown to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Folder,
    Video,
    Audio,
    File,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Folder => "folder",
            EntryKind::Video => "video",
            EntryKind::Audio => "audio",
            EntryKind::File => "file",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "folder" => EntryKind::Folder,
            "video" => EntryKind::Video,
            "audio" => EntryKind::Audio,
            _ => EntryKind::File,
        }
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "avif", "bmp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "avi", "mov", "m4v", "wmv", "ts"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "m4a", "aac", "ogg", "opus", "wav", "wma"];

/// Basenames (without extension) that mark a folder cover image
pub const COVER_NAMES: &[&str] = &["cover", "folder", "poster", "thumb"];

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

pub fn is_image(path: &Path) -> bool {
    extension_of(path).is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
}

pub fn is_video(path: &Path) -> bool {
    extension_of(path).is_some_and(|e| VIDEO_EXTENSIONS.contains(&e.as_str()))
}

pub fn is_audio(path: &Path) -> bool {
    extension_of(path).is_some_and(|e| AUDIO_EXTENSIONS.contains(&e.as_str()))
}

pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

// =============================================================================
// Sources
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub key: String,
    pub kind: MediaKind,
    pub path: PathBuf,
}

impl Source {
    /// Directory that entry paths are relative to. Manga entries live below
    /// a root folder; movie and music entries below the source itself.
    pub fn namespace_dir(&self, root: &str) -> LibraryResult<PathBuf> {
        if root.is_empty() {
            return Ok(self.path.clone());
        }
        let rel = relative_path(root)?;
        Ok(self.path.join(rel))
    }

    /// Resolve a slash-separated relative path under this source, refusing
    /// anything that would land outside the source directory.
    pub fn resolve(&self, rel: &str) -> LibraryResult<PathBuf> {
        Ok(self.path.join(relative_path(rel)?))
    }
}

/// Configured sources, looked up by key
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Source>,
}

impl SourceRegistry {
    pub fn new(sources: Vec<Source>) -> Self {
        Self { sources }
    }

    pub fn all(&self) -> &[Source] {
        &self.sources
    }

    pub fn get(&self, key: &str) -> LibraryResult<&Source> {
        self.sources
            .iter()
            .find(|s| s.key == key)
            .ok_or_else(|| LibraryError::UnknownSource(key.to_string()))
    }

    /// Look up a source and check it holds the expected kind of media
    pub fn get_kind(&self, key: &str, expected: MediaKind) -> LibraryResult<&Source> {
        let source = self.get(key)?;
        if source.kind != expected {
            return Err(LibraryError::WrongKind {
                key: key.to_string(),
                expected,
            });
        }
        Ok(source)
    }
}

// =============================================================================
// Path helpers
// =============================================================================

/// Turn a client supplied relative path into a `PathBuf` made only of
/// normal components. Empty segments and `.` are dropped.
pub fn relative_path(rel: &str) -> LibraryResult<PathBuf> {
    if rel.contains('\0') || rel.contains('\\') || rel.chars().any(|c| c.is_control()) {
        return Err(LibraryError::InvalidPath(rel.to_string()));
    }
    let mut out = PathBuf::new();
    for segment in rel.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(LibraryError::InvalidPath(rel.to_string())),
            s => out.push(s),
        }
    }
    if out
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(LibraryError::InvalidPath(rel.to_string()));
    }
    Ok(out)
}

/// Slash-separated path of `path` relative to `base`, empty for `base` itself
pub fn to_rel_string(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

/// Parent of a slash-separated relative path ("" for top-level entries)
pub fn parent_of(rel: &str) -> &str {
    match rel.rfind('/') {
        Some(pos) => &rel[..pos],
        None => "",
    }
}

/// Compare names the way people expect: "2" sorts before "10", case is
/// ignored for letters.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();

    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) if ca.is_ascii_digit() && cb.is_ascii_digit() => {
                let mut na = String::new();
                while let Some(c) = ai.peek().copied().filter(|c| c.is_ascii_digit()) {
                    na.push(c);
                    ai.next();
                }
                let mut nb = String::new();
                while let Some(c) = bi.peek().copied().filter(|c| c.is_ascii_digit()) {
                    nb.push(c);
                    bi.next();
                }
                let ta = na.trim_start_matches('0');
                let tb = nb.trim_start_matches('0');
                let ord = ta
                    .len()
                    .cmp(&tb.len())
                    .then_with(|| ta.cmp(tb))
                    .then_with(|| na.len().cmp(&nb.len()));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(ca), Some(cb)) => {
                let ord = ca.to_lowercase().cmp(cb.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                ai.next();
                bi.next();
            }
        }
    }
}
