//! Library routes shared by manga, movie and music
//!
//! Each media kind gets the same set of endpoints under `/api/{kind}/`:
//! folder listing, random / top / favorite sliders, search, favorite toggle
//! and view counting.

use crate::api::AppState;
use crate::db::entries;
use crate::library::{scan_namespace, MediaKind, Source};
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};

use super::error::{validate_path, AppError};
use super::types::{
    EntryListResponse, FavoriteRequest, FavoriteResponse, FolderEntryResponse,
    FolderListingResponse, ListingQuery, SearchQuery, SliderQuery, ViewRequest, ViewResponse,
    MAX_LIST_COUNT,
};

// ============================================================================
// ROUTES
// ============================================================================

/// Routes for one media kind. `listing` is the path segment of the folder
/// listing endpoint, which differs per kind.
pub fn library_routes(kind: MediaKind, listing: &str) -> Router<AppState> {
    let base = format!("/api/{}", kind.as_str());
    Router::new()
        .route(
            &format!("{base}/{listing}"),
            get(move |State(state): State<AppState>, Query(q): Query<ListingQuery>| async move {
                list_folder(&state, kind, q).await
            }),
        )
        .route(
            &format!("{base}/random"),
            get(move |State(state): State<AppState>, Query(q): Query<SliderQuery>| async move {
                random(&state, kind, q).await
            }),
        )
        .route(
            &format!("{base}/top"),
            get(move |State(state): State<AppState>, Query(q): Query<SliderQuery>| async move {
                top(&state, kind, q).await
            }),
        )
        .route(
            &format!("{base}/favorites"),
            get(move |State(state): State<AppState>, Query(q): Query<SliderQuery>| async move {
                favorites(&state, kind, q).await
            }),
        )
        .route(
            &format!("{base}/search"),
            get(move |State(state): State<AppState>, Query(q): Query<SearchQuery>| async move {
                search(&state, kind, q).await
            }),
        )
        .route(
            &format!("{base}/favorite"),
            post(move |State(state): State<AppState>, Json(req): Json<FavoriteRequest>| async move {
                set_favorite(&state, kind, req).await
            }),
        )
        .route(
            &format!("{base}/view"),
            post(move |State(state): State<AppState>, Json(req): Json<ViewRequest>| async move {
                increase_view(&state, kind, req).await
            }),
        )
}

// ============================================================================
// NAMESPACE RESOLUTION
// ============================================================================

/// Look up the source and normalize the root folder for its kind.
/// Manga requires a root folder, movie and music have none.
pub fn resolve_namespace(
    state: &AppState,
    kind: MediaKind,
    key: &str,
    root: &str,
) -> Result<(Source, String), AppError> {
    let source = state.sources.get_kind(key, kind)?.clone();
    let root = match kind {
        MediaKind::Manga => {
            let root = validate_path(root)?;
            if root.is_empty() {
                return Err(AppError::BadRequest("Root folder is required".into()));
            }
            if root.contains('/') {
                return Err(AppError::BadRequest("Root folder must be a single folder".into()));
            }
            root
        }
        MediaKind::Movie | MediaKind::Music => String::new(),
    };
    Ok((source, root))
}

/// Index a namespace the first time it is used
async fn ensure_scanned(state: &AppState, source: &Source, root: &str) -> Result<(), AppError> {
    if !entries::has_scan(&state.db, &source.key, root).await? {
        tracing::info!(source = %source.key, root = %root, "first use, scanning");
        scan_namespace(&state.db, source, root).await?;
    }
    Ok(())
}

// ============================================================================
// HANDLERS
// ============================================================================

pub async fn list_folder(
    state: &AppState,
    kind: MediaKind,
    query: ListingQuery,
) -> Result<Json<FolderListingResponse>, AppError> {
    let (source, root) = resolve_namespace(state, kind, &query.key, &query.root)?;
    let path = validate_path(&query.path)?;
    ensure_scanned(state, &source, &root).await?;

    if !path.is_empty() && entries::get_entry(&state.db, &source.key, &root, &path).await?.is_none() {
        return Err(AppError::NotFound("Folder not found".into()));
    }

    let children = entries::list_children(&state.db, &source.key, &root, &path).await?;

    Ok(Json(FolderListingResponse {
        key: source.key,
        root,
        path,
        entries: FolderEntryResponse::from_entries(children),
    }))
}

pub async fn random(
    state: &AppState,
    kind: MediaKind,
    query: SliderQuery,
) -> Result<Json<EntryListResponse>, AppError> {
    let (source, root) = resolve_namespace(state, kind, &query.key, &query.root)?;
    ensure_scanned(state, &source, &root).await?;

    let picked =
        entries::random_entries(&state.db, kind, &source.key, &root, query.count()).await?;
    Ok(Json(EntryListResponse {
        entries: FolderEntryResponse::from_entries(picked),
    }))
}

pub async fn top(
    state: &AppState,
    kind: MediaKind,
    query: SliderQuery,
) -> Result<Json<EntryListResponse>, AppError> {
    let (source, root) = resolve_namespace(state, kind, &query.key, &query.root)?;
    ensure_scanned(state, &source, &root).await?;

    let top = entries::top_viewed(&state.db, &source.key, &root, query.count() as i64).await?;
    Ok(Json(EntryListResponse {
        entries: FolderEntryResponse::from_entries(top),
    }))
}

pub async fn favorites(
    state: &AppState,
    kind: MediaKind,
    query: SliderQuery,
) -> Result<Json<EntryListResponse>, AppError> {
    let (source, root) = resolve_namespace(state, kind, &query.key, &query.root)?;
    ensure_scanned(state, &source, &root).await?;

    let favs = entries::list_favorites(&state.db, &source.key, &root).await?;
    Ok(Json(EntryListResponse {
        entries: FolderEntryResponse::from_entries(favs),
    }))
}

pub async fn search(
    state: &AppState,
    kind: MediaKind,
    query: SearchQuery,
) -> Result<Json<EntryListResponse>, AppError> {
    let (source, root) = resolve_namespace(state, kind, &query.key, &query.root)?;
    let needle = query.q.trim();
    if needle.is_empty() {
        return Err(AppError::BadRequest("Search query cannot be empty".into()));
    }
    let limit = query.count.unwrap_or(100).clamp(1, MAX_LIST_COUNT) as i64;
    ensure_scanned(state, &source, &root).await?;

    let hits = entries::search(&state.db, &source.key, &root, needle, limit).await?;
    Ok(Json(EntryListResponse {
        entries: FolderEntryResponse::from_entries(hits),
    }))
}

pub async fn set_favorite(
    state: &AppState,
    kind: MediaKind,
    req: FavoriteRequest,
) -> Result<Json<FavoriteResponse>, AppError> {
    let (source, root) = resolve_namespace(state, kind, &req.key, &req.root)?;
    let path = validate_path(&req.path)?;

    if !entries::set_favorite(&state.db, &source.key, &root, &path, req.value).await? {
        return Err(AppError::NotFound("Entry not found".into()));
    }

    tracing::debug!(source = %source.key, path = %path, value = req.value, "favorite set");
    Ok(Json(FavoriteResponse {
        path,
        is_favorite: req.value,
    }))
}

pub async fn increase_view(
    state: &AppState,
    kind: MediaKind,
    req: ViewRequest,
) -> Result<Json<ViewResponse>, AppError> {
    let (source, root) = resolve_namespace(state, kind, &req.key, &req.root)?;
    let path = validate_path(&req.path)?;
    let now = chrono::Utc::now().timestamp_millis();

    let view_count = entries::increase_view(&state.db, &source.key, &root, &path, now)
        .await?
        .ok_or_else(|| AppError::NotFound("Entry not found".into()))?;

    Ok(Json(ViewResponse { path, view_count }))
}
