//! Shared types for REST API
//!
//! Common request/response structs used across the manga, movie and music
//! endpoint modules. Field names are camelCase on the wire.

use super::error::media_url;
use crate::db::Entry;
use crate::library::EntryKind;
use serde::{Deserialize, Serialize};

/// Default size of random / top lists
pub const DEFAULT_SLIDER_COUNT: usize = 20;
/// Upper bound for any client supplied count
pub const MAX_LIST_COUNT: usize = 500;

// ============================================================================
// FOLDER ENTRIES
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderEntryResponse {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub is_favorite: bool,
    pub view_count: i64,
    pub size: i64,
    pub image_count: i64,
    pub modified_at: i64,
}

impl FolderEntryResponse {
    pub fn from_entry(entry: Entry) -> Self {
        let thumbnail = entry
            .thumbnail
            .as_deref()
            .map(|t| media_url(&entry.source_key, &[&entry.root_folder, t]));
        Self {
            kind: entry.entry_kind(),
            name: entry.name,
            path: entry.path,
            thumbnail,
            is_favorite: entry.is_favorite,
            view_count: entry.view_count,
            size: entry.size_bytes,
            image_count: entry.image_count,
            modified_at: entry.modified_at,
        }
    }

    pub fn from_entries(entries: Vec<Entry>) -> Vec<Self> {
        entries.into_iter().map(Self::from_entry).collect()
    }
}

#[derive(Serialize)]
pub struct FolderListingResponse {
    pub key: String,
    pub root: String,
    pub path: String,
    pub entries: Vec<FolderEntryResponse>,
}

#[derive(Serialize)]
pub struct EntryListResponse {
    pub entries: Vec<FolderEntryResponse>,
}

// ============================================================================
// QUERIES
// ============================================================================

#[derive(Deserialize)]
pub struct ListingQuery {
    pub key: String,
    #[serde(default)]
    pub root: String,
    #[serde(default)]
    pub path: String,
}

#[derive(Deserialize)]
pub struct SliderQuery {
    pub key: String,
    #[serde(default)]
    pub root: String,
    pub count: Option<usize>,
}

impl SliderQuery {
    pub fn count(&self) -> usize {
        self.count.unwrap_or(DEFAULT_SLIDER_COUNT).clamp(1, MAX_LIST_COUNT)
    }
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub key: String,
    #[serde(default)]
    pub root: String,
    pub q: String,
    pub count: Option<usize>,
}

#[derive(Deserialize)]
pub struct SourceQuery {
    pub key: String,
}

// ============================================================================
// FAVORITES AND VIEWS
// ============================================================================

#[derive(Deserialize)]
pub struct FavoriteRequest {
    pub key: String,
    #[serde(default)]
    pub root: String,
    pub path: String,
    pub value: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteResponse {
    pub path: String,
    pub is_favorite: bool,
}

#[derive(Deserialize)]
pub struct ViewRequest {
    pub key: String,
    #[serde(default)]
    pub root: String,
    pub path: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewResponse {
    pub path: String,
    pub view_count: i64,
}
