//! Music routes
//!
//! The shared library endpoints plus playlist management. Playlists belong
//! to a music source; tracks are paths relative to that source.

use crate::api::AppState;
use crate::db::{entries, playlists, Playlist};
use crate::library::MediaKind;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::error::{validate_path, AppError};
use super::library::library_routes;
use super::types::SourceQuery;

// ============================================================================
// ROUTES
// ============================================================================

pub fn music_routes() -> Router<AppState> {
    Router::new()
        .route("/api/music/playlists", get(list_playlists))
        .route("/api/music/playlist", axum::routing::post(create_playlist))
        .route("/api/music/playlist/containing", get(playlists_containing))
        .route(
            "/api/music/playlist/:id",
            get(get_playlist).put(update_playlist).delete(delete_playlist),
        )
        .route(
            "/api/music/playlist/:id/tracks",
            axum::routing::post(add_track).delete(remove_track),
        )
        .merge(library_routes(MediaKind::Music, "music-folder"))
}

// ============================================================================
// TYPES
// ============================================================================

#[derive(Serialize)]
struct PlaylistSummary {
    id: i64,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(rename = "updatedAt")]
    updated_at: i64,
}

impl From<Playlist> for PlaylistSummary {
    fn from(p: Playlist) -> Self {
        Self {
            id: p.id,
            name: p.name,
            description: p.description,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Serialize)]
struct PlaylistResponse {
    id: i64,
    key: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    tracks: Vec<String>,
}

#[derive(Serialize)]
struct PlaylistListResponse {
    playlists: Vec<PlaylistSummary>,
}

#[derive(Deserialize)]
struct CreatePlaylistRequest {
    key: String,
    name: String,
    description: Option<String>,
    #[serde(default)]
    tracks: Vec<String>,
}

#[derive(Deserialize)]
struct UpdatePlaylistRequest {
    name: Option<String>,
    description: Option<String>,
    /// Full track order; replaces the current list when present
    tracks: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct TrackRequest {
    path: String,
}

#[derive(Serialize)]
struct TrackChangeResponse {
    changed: bool,
}

#[derive(Deserialize)]
struct ContainingQuery {
    key: String,
    path: String,
}

#[derive(Serialize)]
struct ContainingResponse {
    path: String,
    playlists: Vec<i64>,
}

// ============================================================================
// HANDLERS
// ============================================================================

fn validate_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Playlist name cannot be empty".into()));
    }
    if name.chars().count() > 200 {
        return Err(AppError::BadRequest("Playlist name is too long".into()));
    }
    Ok(name.to_string())
}

fn validate_tracks(tracks: &[String]) -> Result<Vec<String>, AppError> {
    tracks
        .iter()
        .map(|t| {
            let path = validate_path(t)?;
            if path.is_empty() {
                return Err(AppError::BadRequest("Track path cannot be empty".into()));
            }
            Ok(path)
        })
        .collect()
}

/// A track must be an indexed audio file of the playlist's source
async fn require_track(state: &AppState, source_key: &str, path: &str) -> Result<(), AppError> {
    let known = entries::get_entry(&state.db, source_key, "", path).await?;
    if !known.is_some_and(|e| e.kind == "audio") {
        return Err(AppError::NotFound(format!("Track not found: {}", path)));
    }
    Ok(())
}

async fn require_tracks(state: &AppState, source_key: &str, paths: &[String]) -> Result<(), AppError> {
    for path in paths {
        require_track(state, source_key, path).await?;
    }
    Ok(())
}

async fn load_playlist(state: &AppState, id: i64) -> Result<Playlist, AppError> {
    playlists::get_playlist(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Playlist not found".into()))
}

async fn playlist_response(state: &AppState, playlist: Playlist) -> Result<PlaylistResponse, AppError> {
    let tracks = playlists::list_tracks(&state.db, playlist.id).await?;
    Ok(PlaylistResponse {
        id: playlist.id,
        key: playlist.source_key,
        name: playlist.name,
        description: playlist.description,
        tracks: tracks.into_iter().map(|t| t.path).collect(),
    })
}

async fn list_playlists(
    State(state): State<AppState>,
    Query(query): Query<SourceQuery>,
) -> Result<Json<PlaylistListResponse>, AppError> {
    state.sources.get_kind(&query.key, MediaKind::Music)?;

    let list = playlists::list_playlists(&state.db, &query.key).await?;
    Ok(Json(PlaylistListResponse {
        playlists: list.into_iter().map(PlaylistSummary::from).collect(),
    }))
}

async fn create_playlist(
    State(state): State<AppState>,
    Json(req): Json<CreatePlaylistRequest>,
) -> Result<(StatusCode, Json<PlaylistResponse>), AppError> {
    state.sources.get_kind(&req.key, MediaKind::Music)?;
    let name = validate_name(&req.name)?;
    let tracks = validate_tracks(&req.tracks)?;
    require_tracks(&state, &req.key, &tracks).await?;
    let now = chrono::Utc::now().timestamp_millis();

    let playlist = playlists::create_playlist(
        &state.db,
        &req.key,
        &name,
        req.description.as_deref(),
        &tracks,
        now,
    )
    .await?;

    tracing::info!(id = playlist.id, name = %playlist.name, "playlist created");
    let response = playlist_response(&state, playlist).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn get_playlist(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PlaylistResponse>, AppError> {
    let playlist = load_playlist(&state, id).await?;
    Ok(Json(playlist_response(&state, playlist).await?))
}

async fn update_playlist(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdatePlaylistRequest>,
) -> Result<Json<PlaylistResponse>, AppError> {
    let name = req.name.as_deref().map(validate_name).transpose()?;
    let tracks = req.tracks.as_deref().map(validate_tracks).transpose()?;
    let current = load_playlist(&state, id).await?;
    if let Some(tracks) = &tracks {
        require_tracks(&state, &current.source_key, tracks).await?;
    }
    let now = chrono::Utc::now().timestamp_millis();

    let playlist = playlists::update_playlist(
        &state.db,
        id,
        name.as_deref(),
        req.description.as_deref(),
        tracks.as_deref(),
        now,
    )
    .await?
    .ok_or_else(|| AppError::NotFound("Playlist not found".into()))?;

    Ok(Json(playlist_response(&state, playlist).await?))
}

async fn delete_playlist(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if !playlists::delete_playlist(&state.db, id).await? {
        return Err(AppError::NotFound("Playlist not found".into()));
    }
    tracing::info!(id, "playlist deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn add_track(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<TrackRequest>,
) -> Result<Json<TrackChangeResponse>, AppError> {
    let playlist = load_playlist(&state, id).await?;
    let path = validate_path(&req.path)?;

    require_track(&state, &playlist.source_key, &path).await?;

    let now = chrono::Utc::now().timestamp_millis();
    let changed = playlists::add_track(&state.db, id, &path, now).await?;
    Ok(Json(TrackChangeResponse { changed }))
}

async fn remove_track(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<TrackRequest>,
) -> Result<Json<TrackChangeResponse>, AppError> {
    load_playlist(&state, id).await?;
    let path = validate_path(&req.path)?;

    let now = chrono::Utc::now().timestamp_millis();
    let changed = playlists::remove_track(&state.db, id, &path, now).await?;
    Ok(Json(TrackChangeResponse { changed }))
}

/// Playlist ids containing a track, for checkmarks in "add to playlist" menus
async fn playlists_containing(
    State(state): State<AppState>,
    Query(query): Query<ContainingQuery>,
) -> Result<Json<ContainingResponse>, AppError> {
    state.sources.get_kind(&query.key, MediaKind::Music)?;
    let path = validate_path(&query.path)?;

    let ids = playlists::playlists_containing(&state.db, &query.key, &path).await?;
    Ok(Json(ContainingResponse {
        path,
        playlists: ids,
    }))
}
