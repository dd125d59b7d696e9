//! Playlist membership of tracks
//!
//! Only used for checkmarks in "add to playlist" menus, so it is cached
//! briefly and dropped whenever this client changes a playlist.

use crate::api::ApiClient;
use crate::cache::{key, Cache, CachePurpose};
use crate::library::Namespace;

pub async fn membership(
    api: &ApiClient,
    cache: &Cache,
    ns: &Namespace,
    path: &str,
    refresh: bool,
) -> anyhow::Result<Vec<i64>> {
    let key = key(ns, CachePurpose::Playlist, Some(path));
    cache
        .get_or_fetch(&key, CachePurpose::Playlist, refresh, move || async move {
            Ok(api.playlists_containing(&ns.source, path).await?)
        })
        .await
}

pub fn forget_membership(cache: &Cache, ns: &Namespace, path: &str) -> anyhow::Result<()> {
    cache.remove(&key(ns, CachePurpose::Playlist, Some(path)))
}

/// Membership of every track is unknown after a playlist is deleted
pub fn forget_all_memberships(cache: &Cache, ns: &Namespace) -> anyhow::Result<usize> {
    cache.clear(&key(ns, CachePurpose::Playlist, None))
}

pub async fn add_track(
    api: &ApiClient,
    cache: &Cache,
    ns: &Namespace,
    playlist: i64,
    path: &str,
) -> anyhow::Result<bool> {
    let changed = api.add_track(playlist, path).await?;
    forget_membership(cache, ns, path)?;
    Ok(changed)
}

pub async fn remove_track(
    api: &ApiClient,
    cache: &Cache,
    ns: &Namespace,
    playlist: i64,
    path: &str,
) -> anyhow::Result<bool> {
    let changed = api.remove_track(playlist, path).await?;
    forget_membership(cache, ns, path)?;
    Ok(changed)
}

pub async fn delete_playlist(
    api: &ApiClient,
    cache: &Cache,
    ns: &Namespace,
    playlist: i64,
) -> anyhow::Result<()> {
    api.delete_playlist(playlist).await?;
    forget_all_memberships(cache, ns)?;
    Ok(())
}
