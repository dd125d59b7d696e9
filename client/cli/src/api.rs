use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::library::{MediaKind, Namespace};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API error ({status}): {message}")]
    Status {
        status: reqwest::StatusCode,
        message: String,
    },
}

pub type ApiResult<T> = Result<T, ApiError>;

pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

// --- Server info ---

#[derive(Debug, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct SourceInfo {
    pub key: String,
    pub kind: MediaKind,
}

#[derive(Debug, Deserialize)]
pub struct Sources {
    pub manga: Vec<SourceInfo>,
    pub movie: Vec<SourceInfo>,
    pub music: Vec<SourceInfo>,
}

// --- Library types ---

/// One item of a folder listing or slider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderEntry {
    pub name: String,
    pub path: String,
    /// folder, video, audio or file
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub view_count: i64,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub image_count: i64,
    #[serde(default)]
    pub modified_at: i64,
}

impl FolderEntry {
    pub fn is_folder(&self) -> bool {
        self.kind == "folder"
    }
}

#[derive(Debug, Deserialize)]
struct FolderListing {
    entries: Vec<FolderEntry>,
}

#[derive(Debug, Deserialize)]
struct EntryList {
    entries: Vec<FolderEntry>,
}

#[derive(Debug, Deserialize)]
struct RootsResponse {
    roots: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    images: Vec<String>,
}

#[derive(Debug, Serialize)]
struct FavoriteRequest<'a> {
    key: &'a str,
    root: &'a str,
    path: &'a str,
    value: bool,
}

#[derive(Debug, Serialize)]
struct ViewRequest<'a> {
    key: &'a str,
    root: &'a str,
    path: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ViewResponse {
    view_count: i64,
}

// --- Scan jobs ---

#[derive(Debug, Serialize)]
struct ScanRequest<'a> {
    key: &'a str,
    root: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanJob {
    pub id: String,
    pub source_key: String,
    pub root_folder: String,
    /// running, done or failed
    pub state: String,
    pub indexed: Option<usize>,
    pub pruned: Option<u64>,
    pub message: Option<String>,
}

impl ScanJob {
    pub fn is_running(&self) -> bool {
        self.state == "running"
    }
}

// --- Playlists ---

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSummary {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
struct PlaylistListResponse {
    playlists: Vec<PlaylistSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Playlist {
    pub id: i64,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub tracks: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CreatePlaylistRequest<'a> {
    key: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

#[derive(Debug, Default, Serialize)]
pub struct PlaylistUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracks: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct TrackRequest<'a> {
    path: &'a str,
}

#[derive(Debug, Deserialize)]
struct TrackChangeResponse {
    changed: bool,
}

#[derive(Debug, Deserialize)]
struct ContainingResponse {
    playlists: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check response status; on error, read body for detail message.
    async fn ensure_ok(resp: reqwest::Response) -> ApiResult<reqwest::Response> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            Err(ApiError::Status { status, message })
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn kind_url(&self, kind: MediaKind, endpoint: &str) -> String {
        format!("{}/api/{}/{}", self.base_url, kind.as_str(), endpoint)
    }

    /// Absolute URL for a server-relative media path such as a thumbnail
    pub fn absolute(&self, media_path: &str) -> String {
        if media_path.starts_with("http://") || media_path.starts_with("https://") {
            media_path.to_string()
        } else {
            self.url(media_path)
        }
    }

    pub async fn get_server_info(&self) -> ApiResult<ServerInfo> {
        let resp = self.client.get(self.url("/server/info")).send().await?;
        Ok(Self::ensure_ok(resp).await?.json().await?)
    }

    pub async fn sources(&self) -> ApiResult<Sources> {
        let resp = self.client.get(self.url("/api/sources")).send().await?;
        Ok(Self::ensure_ok(resp).await?.json().await?)
    }

    pub async fn start_scan(&self, key: &str, root: &str) -> ApiResult<ScanJob> {
        let resp = self
            .client
            .post(self.url("/api/scan"))
            .json(&ScanRequest { key, root })
            .send()
            .await?;
        Ok(Self::ensure_ok(resp).await?.json().await?)
    }

    pub async fn get_scan(&self, id: &str) -> ApiResult<ScanJob> {
        let resp = self
            .client
            .get(self.url(&format!("/api/scan/{}", id)))
            .send()
            .await?;
        Ok(Self::ensure_ok(resp).await?.json().await?)
    }

    // --- Library ---

    pub async fn manga_roots(&self, key: &str) -> ApiResult<Vec<String>> {
        let resp = self
            .client
            .get(self.url("/api/manga/roots"))
            .query(&[("key", key)])
            .send()
            .await?;
        let roots: RootsResponse = Self::ensure_ok(resp).await?.json().await?;
        Ok(roots.roots)
    }

    pub async fn list_folder(&self, ns: &Namespace, path: &str) -> ApiResult<Vec<FolderEntry>> {
        let resp = self
            .client
            .get(self.kind_url(ns.kind, ns.kind.listing_endpoint()))
            .query(&[("key", ns.source.as_str()), ("root", ns.root.as_str()), ("path", path)])
            .send()
            .await?;
        let listing: FolderListing = Self::ensure_ok(resp).await?.json().await?;
        Ok(listing.entries)
    }

    /// Image URLs of a manga folder in reading order
    pub async fn manga_images(&self, ns: &Namespace, path: &str) -> ApiResult<Vec<String>> {
        let resp = self
            .client
            .get(self.url("/api/manga/images"))
            .query(&[("key", ns.source.as_str()), ("root", ns.root.as_str()), ("path", path)])
            .send()
            .await?;
        let images: ImagesResponse = Self::ensure_ok(resp).await?.json().await?;
        Ok(images.images)
    }

    async fn entry_list(
        &self,
        ns: &Namespace,
        endpoint: &str,
        extra: &[(&str, String)],
    ) -> ApiResult<Vec<FolderEntry>> {
        let resp = self
            .client
            .get(self.kind_url(ns.kind, endpoint))
            .query(&[("key", ns.source.as_str()), ("root", ns.root.as_str())])
            .query(extra)
            .send()
            .await?;
        let list: EntryList = Self::ensure_ok(resp).await?.json().await?;
        Ok(list.entries)
    }

    pub async fn random(&self, ns: &Namespace, count: usize) -> ApiResult<Vec<FolderEntry>> {
        self.entry_list(ns, "random", &[("count", count.to_string())])
            .await
    }

    pub async fn top(&self, ns: &Namespace, count: usize) -> ApiResult<Vec<FolderEntry>> {
        self.entry_list(ns, "top", &[("count", count.to_string())])
            .await
    }

    pub async fn favorites(&self, ns: &Namespace) -> ApiResult<Vec<FolderEntry>> {
        self.entry_list(ns, "favorites", &[]).await
    }

    pub async fn search(&self, ns: &Namespace, query: &str) -> ApiResult<Vec<FolderEntry>> {
        self.entry_list(ns, "search", &[("q", query.to_string())])
            .await
    }

    pub async fn set_favorite(&self, ns: &Namespace, path: &str, value: bool) -> ApiResult<()> {
        let resp = self
            .client
            .post(self.kind_url(ns.kind, "favorite"))
            .json(&FavoriteRequest {
                key: &ns.source,
                root: &ns.root,
                path,
                value,
            })
            .send()
            .await?;
        Self::ensure_ok(resp).await?;
        Ok(())
    }

    /// Count one more view; returns the new count
    pub async fn increase_view(&self, ns: &Namespace, path: &str) -> ApiResult<i64> {
        let resp = self
            .client
            .post(self.kind_url(ns.kind, "view"))
            .json(&ViewRequest {
                key: &ns.source,
                root: &ns.root,
                path,
            })
            .send()
            .await?;
        let view: ViewResponse = Self::ensure_ok(resp).await?.json().await?;
        Ok(view.view_count)
    }

    // --- Playlists ---

    pub async fn list_playlists(&self, key: &str) -> ApiResult<Vec<PlaylistSummary>> {
        let resp = self
            .client
            .get(self.url("/api/music/playlists"))
            .query(&[("key", key)])
            .send()
            .await?;
        let list: PlaylistListResponse = Self::ensure_ok(resp).await?.json().await?;
        Ok(list.playlists)
    }

    pub async fn get_playlist(&self, id: i64) -> ApiResult<Playlist> {
        let resp = self
            .client
            .get(self.url(&format!("/api/music/playlist/{}", id)))
            .send()
            .await?;
        Ok(Self::ensure_ok(resp).await?.json().await?)
    }

    pub async fn create_playlist(
        &self,
        key: &str,
        name: &str,
        description: Option<&str>,
    ) -> ApiResult<Playlist> {
        let resp = self
            .client
            .post(self.url("/api/music/playlist"))
            .json(&CreatePlaylistRequest {
                key,
                name,
                description,
            })
            .send()
            .await?;
        Ok(Self::ensure_ok(resp).await?.json().await?)
    }

    pub async fn update_playlist(&self, id: i64, update: &PlaylistUpdate) -> ApiResult<Playlist> {
        let resp = self
            .client
            .put(self.url(&format!("/api/music/playlist/{}", id)))
            .json(update)
            .send()
            .await?;
        Ok(Self::ensure_ok(resp).await?.json().await?)
    }

    pub async fn delete_playlist(&self, id: i64) -> ApiResult<()> {
        let resp = self
            .client
            .delete(self.url(&format!("/api/music/playlist/{}", id)))
            .send()
            .await?;
        Self::ensure_ok(resp).await?;
        Ok(())
    }

    pub async fn add_track(&self, id: i64, path: &str) -> ApiResult<bool> {
        let resp = self
            .client
            .post(self.url(&format!("/api/music/playlist/{}/tracks", id)))
            .json(&TrackRequest { path })
            .send()
            .await?;
        let change: TrackChangeResponse = Self::ensure_ok(resp).await?.json().await?;
        Ok(change.changed)
    }

    pub async fn remove_track(&self, id: i64, path: &str) -> ApiResult<bool> {
        let resp = self
            .client
            .delete(self.url(&format!("/api/music/playlist/{}/tracks", id)))
            .json(&TrackRequest { path })
            .send()
            .await?;
        let change: TrackChangeResponse = Self::ensure_ok(resp).await?.json().await?;
        Ok(change.changed)
    }

    pub async fn playlists_containing(&self, key: &str, path: &str) -> ApiResult<Vec<i64>> {
        let resp = self
            .client
            .get(self.url("/api/music/playlist/containing"))
            .query(&[("key", key), ("path", path)])
            .send()
            .await?;
        let containing: ContainingResponse = Self::ensure_ok(resp).await?.json().await?;
        Ok(containing.playlists)
    }
}
