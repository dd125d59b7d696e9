//! Admin routes
//!
//! Health, server info, statistics, configured sources and scan jobs.

use crate::api::AppState;
use crate::library::{MediaKind, ScanJob};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::AppError;
use super::library::resolve_namespace;

// ============================================================================
// ROUTES
// ============================================================================

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/server/info", get(get_server_info))
        .route("/admin/stats", get(get_stats))
        .route("/api/sources", get(list_sources))
        .route("/api/scan", post(start_scan))
        .route("/api/scan/:id", get(get_scan))
}

// ============================================================================
// TYPES
// ============================================================================

#[derive(Serialize)]
struct ServerInfo {
    name: String,
    version: String,
}

#[derive(Serialize)]
struct StatsResponse {
    total_entries: i64,
    total_favorites: i64,
    total_views: i64,
    total_playlists: i64,
}

#[derive(Serialize)]
struct SourceInfo {
    key: String,
    kind: MediaKind,
}

#[derive(Serialize)]
struct SourcesResponse {
    manga: Vec<SourceInfo>,
    movie: Vec<SourceInfo>,
    music: Vec<SourceInfo>,
}

#[derive(Deserialize)]
struct ScanRequest {
    key: String,
    #[serde(default)]
    root: String,
}

// ============================================================================
// HANDLERS
// ============================================================================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn get_server_info(State(state): State<AppState>) -> Json<ServerInfo> {
    Json(ServerInfo {
        name: state.config.server_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, AppError> {
    let stats = crate::db::get_stats(&state.db).await?;
    Ok(Json(StatsResponse {
        total_entries: stats.total_entries,
        total_favorites: stats.total_favorites,
        total_views: stats.total_views,
        total_playlists: stats.total_playlists,
    }))
}

async fn list_sources(State(state): State<AppState>) -> Json<SourcesResponse> {
    let of_kind = |kind: MediaKind| -> Vec<SourceInfo> {
        state
            .sources
            .all()
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| SourceInfo {
                key: s.key.clone(),
                kind: s.kind,
            })
            .collect()
    };

    Json(SourcesResponse {
        manga: of_kind(MediaKind::Manga),
        movie: of_kind(MediaKind::Movie),
        music: of_kind(MediaKind::Music),
    })
}

async fn start_scan(
    State(state): State<AppState>,
    Json(req): Json<ScanRequest>,
) -> Result<(StatusCode, Json<ScanJob>), AppError> {
    let kind = state.sources.get(&req.key)?.kind;
    let (source, root) = resolve_namespace(&state, kind, &req.key, &req.root)?;

    let job = state.scans.start(state.db.clone(), source, root);
    tracing::info!(id = %job.id, source = %job.source_key, root = %job.root_folder, "scan started");
    Ok((StatusCode::ACCEPTED, Json(job)))
}

async fn get_scan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScanJob>, AppError> {
    state
        .scans
        .get(id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Scan job not found".into()))
}
