//! Manga-only routes
//!
//! Root folder discovery and the flat image list the reader pages through.

use crate::api::AppState;
use crate::library::{relative_path, scanner, MediaKind};
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use super::error::{media_url, validate_path, AppError};
use super::library::{library_routes, resolve_namespace};
use super::types::{ListingQuery, SourceQuery};

// ============================================================================
// ROUTES
// ============================================================================

pub fn manga_routes() -> Router<AppState> {
    Router::new()
        .route("/api/manga/roots", get(list_roots))
        .route("/api/manga/images", get(list_images))
        .merge(library_routes(MediaKind::Manga, "folder-cache"))
}

// ============================================================================
// TYPES
// ============================================================================

#[derive(Serialize)]
struct RootsResponse {
    key: String,
    roots: Vec<String>,
}

#[derive(Serialize)]
struct ImagesResponse {
    key: String,
    root: String,
    path: String,
    total: usize,
    images: Vec<String>,
}

// ============================================================================
// HANDLERS
// ============================================================================

async fn list_roots(
    State(state): State<AppState>,
    Query(query): Query<SourceQuery>,
) -> Result<Json<RootsResponse>, AppError> {
    let source = state.sources.get_kind(&query.key, MediaKind::Manga)?.clone();

    let roots = tokio::task::spawn_blocking(move || scanner::root_folders(&source))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(Json(RootsResponse {
        key: query.key,
        roots,
    }))
}

/// Every image of a folder as a streaming URL, in reading order
async fn list_images(
    State(state): State<AppState>,
    Query(query): Query<ListingQuery>,
) -> Result<Json<ImagesResponse>, AppError> {
    let (source, root) = resolve_namespace(&state, MediaKind::Manga, &query.key, &query.root)?;
    let path = validate_path(&query.path)?;

    let base = source.namespace_dir(&root)?;
    let folder = base.join(relative_path(&path)?);
    if !folder.is_dir() {
        return Err(AppError::NotFound("Folder not found".into()));
    }

    let rel_images = tokio::task::spawn_blocking(move || scanner::folder_images(&base, &folder))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    let images: Vec<String> = rel_images
        .iter()
        .map(|img| media_url(&source.key, &[&root, img]))
        .collect();

    Ok(Json(ImagesResponse {
        key: source.key,
        root,
        path,
        total: images.len(),
        images,
    }))
}
