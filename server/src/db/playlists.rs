//! Database operations for music playlists
//!
//! Tracks are stored by path relative to the music source and keep an
//! explicit position so reordering survives.

use super::models::{Playlist, PlaylistTrack};
use super::DbPool;
use std::collections::{HashMap, HashSet};

const PLAYLIST_COLUMNS: &str = "id, source_key, name, description, created_at, updated_at";

/// Create a playlist with an initial track list, in one transaction
pub async fn create_playlist(
    pool: &DbPool,
    source_key: &str,
    name: &str,
    description: Option<&str>,
    tracks: &[String],
    now: i64,
) -> anyhow::Result<Playlist> {
    let mut tx = pool.begin().await?;

    let playlist = sqlx::query_as::<_, Playlist>(&format!(
        "INSERT INTO playlists (source_key, name, description, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)
         RETURNING {PLAYLIST_COLUMNS}"
    ))
    .bind(source_key)
    .bind(name)
    .bind(description)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    if !tracks.is_empty() {
        replace_tracks(&mut tx, playlist.id, tracks, now).await?;
    }

    tx.commit().await?;
    Ok(playlist)
}

/// Get a playlist by ID
pub async fn get_playlist(pool: &DbPool, id: i64) -> anyhow::Result<Option<Playlist>> {
    let playlist = sqlx::query_as::<_, Playlist>(&format!(
        "SELECT {PLAYLIST_COLUMNS} FROM playlists WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(playlist)
}

/// List the playlists of a music source, most recently changed first
pub async fn list_playlists(pool: &DbPool, source_key: &str) -> anyhow::Result<Vec<Playlist>> {
    let playlists = sqlx::query_as::<_, Playlist>(&format!(
        "SELECT {PLAYLIST_COLUMNS} FROM playlists
         WHERE source_key = ?1
         ORDER BY updated_at DESC, id DESC"
    ))
    .bind(source_key)
    .fetch_all(pool)
    .await?;

    Ok(playlists)
}

/// Rename, re-describe or reorder a playlist. `None` leaves a field
/// unchanged; all changes apply together or not at all.
pub async fn update_playlist(
    pool: &DbPool,
    id: i64,
    name: Option<&str>,
    description: Option<&str>,
    tracks: Option<&[String]>,
    now: i64,
) -> anyhow::Result<Option<Playlist>> {
    let mut tx = pool.begin().await?;

    let playlist = sqlx::query_as::<_, Playlist>(&format!(
        "UPDATE playlists
         SET name = COALESCE(?2, name),
             description = COALESCE(?3, description),
             updated_at = ?4
         WHERE id = ?1
         RETURNING {PLAYLIST_COLUMNS}"
    ))
    .bind(id)
    .bind(name)
    .bind(description)
    .bind(now)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(playlist) = playlist else {
        tx.rollback().await?;
        return Ok(None);
    };

    if let Some(tracks) = tracks {
        replace_tracks(&mut tx, id, tracks, now).await?;
    }

    tx.commit().await?;
    Ok(Some(playlist))
}

/// Delete a playlist and its tracks. Returns false when it did not exist.
pub async fn delete_playlist(pool: &DbPool, id: i64) -> anyhow::Result<bool> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM playlist_tracks WHERE playlist_id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query("DELETE FROM playlists WHERE id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}

/// Tracks of a playlist in play order
pub async fn list_tracks(pool: &DbPool, playlist_id: i64) -> anyhow::Result<Vec<PlaylistTrack>> {
    let tracks = sqlx::query_as::<_, PlaylistTrack>(
        r#"
        SELECT path, position, added_at
        FROM playlist_tracks
        WHERE playlist_id = ?1
        ORDER BY position
        "#,
    )
    .bind(playlist_id)
    .fetch_all(pool)
    .await?;

    Ok(tracks)
}

/// Append a track. Adding a path that is already present is a no-op and
/// returns false.
pub async fn add_track(
    pool: &DbPool,
    playlist_id: i64,
    path: &str,
    now: i64,
) -> anyhow::Result<bool> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        INSERT INTO playlist_tracks (playlist_id, path, position, added_at)
        VALUES (
            ?1, ?2,
            (SELECT COALESCE(MAX(position), -1) + 1 FROM playlist_tracks WHERE playlist_id = ?1),
            ?3
        )
        ON CONFLICT (playlist_id, path) DO NOTHING
        "#,
    )
    .bind(playlist_id)
    .bind(path)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let added = result.rows_affected() > 0;
    if added {
        touch(&mut tx, playlist_id, now).await?;
    }

    tx.commit().await?;
    Ok(added)
}

/// Remove a track and close the gap in positions
pub async fn remove_track(
    pool: &DbPool,
    playlist_id: i64,
    path: &str,
    now: i64,
) -> anyhow::Result<bool> {
    let mut tx = pool.begin().await?;

    let removed: Option<(i64,)> = sqlx::query_as(
        "DELETE FROM playlist_tracks WHERE playlist_id = ?1 AND path = ?2 RETURNING position",
    )
    .bind(playlist_id)
    .bind(path)
    .fetch_optional(&mut *tx)
    .await?;

    let Some((position,)) = removed else {
        tx.rollback().await?;
        return Ok(false);
    };

    sqlx::query(
        "UPDATE playlist_tracks SET position = position - 1 WHERE playlist_id = ?1 AND position > ?2",
    )
    .bind(playlist_id)
    .bind(position)
    .execute(&mut *tx)
    .await?;

    touch(&mut tx, playlist_id, now).await?;
    tx.commit().await?;
    Ok(true)
}

/// Replace the track list with `paths` in the given order.
/// Duplicate paths keep their first position.
async fn replace_tracks(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    playlist_id: i64,
    paths: &[String],
    now: i64,
) -> anyhow::Result<()> {
    let existing: Vec<(String, i64)> = sqlx::query_as(
        "SELECT path, added_at FROM playlist_tracks WHERE playlist_id = ?1",
    )
    .bind(playlist_id)
    .fetch_all(&mut **tx)
    .await?;
    let added_at: HashMap<String, i64> = existing.into_iter().collect();

    sqlx::query("DELETE FROM playlist_tracks WHERE playlist_id = ?1")
        .bind(playlist_id)
        .execute(&mut **tx)
        .await?;

    let mut seen = HashSet::new();
    let mut position = 0i64;
    for path in paths {
        if !seen.insert(path.as_str()) {
            continue;
        }
        sqlx::query(
            "INSERT INTO playlist_tracks (playlist_id, path, position, added_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(playlist_id)
        .bind(path)
        .bind(position)
        .bind(added_at.get(path).copied().unwrap_or(now))
        .execute(&mut **tx)
        .await?;
        position += 1;
    }

    touch(tx, playlist_id, now).await
}

/// IDs of the playlists of a source that contain a track
pub async fn playlists_containing(
    pool: &DbPool,
    source_key: &str,
    path: &str,
) -> anyhow::Result<Vec<i64>> {
    let ids: Vec<(i64,)> = sqlx::query_as(
        r#"
        SELECT p.id
        FROM playlists p
        JOIN playlist_tracks t ON t.playlist_id = p.id
        WHERE p.source_key = ?1 AND t.path = ?2
        ORDER BY p.id
        "#,
    )
    .bind(source_key)
    .bind(path)
    .fetch_all(pool)
    .await?;

    Ok(ids.into_iter().map(|r| r.0).collect())
}

async fn touch(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    playlist_id: i64,
    now: i64,
) -> anyhow::Result<()> {
    sqlx::query("UPDATE playlists SET updated_at = ?2 WHERE id = ?1")
        .bind(playlist_id)
        .bind(now)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    fn paths(tracks: &[PlaylistTrack]) -> Vec<&str> {
        tracks.iter().map(|t| t.path.as_str()).collect()
    }

    #[tokio::test]
    async fn test_playlist_lifecycle() {
        let pool = memory_pool().await;
        let playlist = create_playlist(&pool, "M_SONGS", "Road trip", None, &[], 10).await.unwrap();
        assert_eq!(playlist.name, "Road trip");
        assert_eq!(playlist.created_at, 10);

        let renamed = update_playlist(&pool, playlist.id, Some("Drive"), Some("summer"), None, 20)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(renamed.name, "Drive");
        assert_eq!(renamed.description.as_deref(), Some("summer"));
        assert_eq!(renamed.updated_at, 20);

        let listed = list_playlists(&pool, "M_SONGS").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(list_playlists(&pool, "M_OTHER").await.unwrap().is_empty());

        assert!(delete_playlist(&pool, playlist.id).await.unwrap());
        assert!(get_playlist(&pool, playlist.id).await.unwrap().is_none());
        assert!(!delete_playlist(&pool, playlist.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_tracks_keep_order_without_duplicates() {
        let pool = memory_pool().await;
        let p = create_playlist(&pool, "M_SONGS", "Mix", None, &[], 1).await.unwrap();

        assert!(add_track(&pool, p.id, "a/1.mp3", 2).await.unwrap());
        assert!(add_track(&pool, p.id, "a/2.mp3", 3).await.unwrap());
        assert!(add_track(&pool, p.id, "b/3.mp3", 4).await.unwrap());
        assert!(!add_track(&pool, p.id, "a/1.mp3", 5).await.unwrap());

        let tracks = list_tracks(&pool, p.id).await.unwrap();
        assert_eq!(paths(&tracks), vec!["a/1.mp3", "a/2.mp3", "b/3.mp3"]);

        assert!(remove_track(&pool, p.id, "a/2.mp3", 6).await.unwrap());
        assert!(!remove_track(&pool, p.id, "a/2.mp3", 7).await.unwrap());
        let tracks = list_tracks(&pool, p.id).await.unwrap();
        assert_eq!(paths(&tracks), vec!["a/1.mp3", "b/3.mp3"]);
        assert_eq!(tracks[1].position, 1);

        assert!(add_track(&pool, p.id, "c/4.mp3", 8).await.unwrap());
        let tracks = list_tracks(&pool, p.id).await.unwrap();
        assert_eq!(tracks[2].position, 2);
    }

    #[tokio::test]
    async fn test_update_reorders_tracks() {
        let pool = memory_pool().await;
        let p = create_playlist(&pool, "M_SONGS", "Mix", None, &[], 1).await.unwrap();
        add_track(&pool, p.id, "x.mp3", 2).await.unwrap();
        add_track(&pool, p.id, "y.mp3", 3).await.unwrap();

        let order = vec!["y.mp3".to_string(), "x.mp3".to_string(), "y.mp3".to_string()];
        let updated = update_playlist(&pool, p.id, None, None, Some(order.as_slice()), 9)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Mix");

        let tracks = list_tracks(&pool, p.id).await.unwrap();
        assert_eq!(paths(&tracks), vec!["y.mp3", "x.mp3"]);
        assert_eq!(tracks[1].added_at, 2);
    }

    #[tokio::test]
    async fn test_create_with_tracks() {
        let pool = memory_pool().await;
        let tracks = vec!["b.mp3".to_string(), "a.mp3".to_string()];
        let p = create_playlist(&pool, "M_SONGS", "Mix", Some("new"), &tracks, 5)
            .await
            .unwrap();

        let stored = list_tracks(&pool, p.id).await.unwrap();
        assert_eq!(paths(&stored), vec!["b.mp3", "a.mp3"]);
        assert_eq!(stored[0].added_at, 5);
    }

    #[tokio::test]
    async fn test_update_missing_playlist() {
        let pool = memory_pool().await;
        let tracks = vec!["a.mp3".to_string()];
        let missing = update_playlist(&pool, 42, Some("x"), None, Some(tracks.as_slice()), 1)
            .await
            .unwrap();
        assert!(missing.is_none());
        assert!(list_tracks(&pool, 42).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_playlists_containing() {
        let pool = memory_pool().await;
        let a = create_playlist(&pool, "M_SONGS", "A", None, &[], 1).await.unwrap();
        let b = create_playlist(&pool, "M_SONGS", "B", None, &[], 1).await.unwrap();
        let other = create_playlist(&pool, "M_OTHER", "C", None, &[], 1).await.unwrap();
        add_track(&pool, a.id, "song.mp3", 2).await.unwrap();
        add_track(&pool, other.id, "song.mp3", 2).await.unwrap();
        add_track(&pool, b.id, "else.mp3", 2).await.unwrap();

        let ids = playlists_containing(&pool, "M_SONGS", "song.mp3").await.unwrap();
        assert_eq!(ids, vec![a.id]);
    }
}
