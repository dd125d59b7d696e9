//! Database models for the Kura library index
//!
//! These structs map directly to the database schema.

use crate::library::EntryKind;
use serde::Serialize;

// =============================================================================
// Entry
// =============================================================================

/// A folder or media file below a source. Identity is
/// (source_key, root_folder, path).
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Entry {
    pub id: i64,
    pub source_key: String,
    pub root_folder: String,
    pub path: String,
    pub parent: String,
    pub name: String,
    pub kind: String,
    pub thumbnail: Option<String>,
    pub size_bytes: i64,
    pub image_count: i64,
    pub view_count: i64,
    pub is_favorite: bool,
    pub last_viewed_at: Option<i64>,
    pub modified_at: i64,
    pub scanned_at: i64,
}

impl Entry {
    pub fn entry_kind(&self) -> EntryKind {
        EntryKind::parse(&self.kind)
    }
}

/// Entry produced by the scanner, before it gets an id
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub path: String,
    pub parent: String,
    pub name: String,
    pub kind: EntryKind,
    /// Thumbnail path, relative to the namespace directory
    pub thumbnail: Option<String>,
    pub size_bytes: i64,
    pub image_count: i64,
    pub modified_at: i64,
}

// =============================================================================
// Playlist
// =============================================================================

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Playlist {
    pub id: i64,
    pub source_key: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlaylistTrack {
    pub path: String,
    pub position: i64,
    pub added_at: i64,
}
