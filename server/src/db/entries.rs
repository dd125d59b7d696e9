//! Database operations for library entries

use super::models::{Entry, NewEntry};
use super::DbPool;
use crate::library::{natural_cmp, MediaKind};
use rand::seq::IndexedRandom;

const ENTRY_COLUMNS: &str = "id, source_key, root_folder, path, parent, name, kind, thumbnail, \
     size_bytes, image_count, view_count, is_favorite, last_viewed_at, modified_at, scanned_at";

/// Entries that can be opened directly: a readable manga folder, a video, a track
fn playable_clause(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Manga => "kind = 'folder' AND image_count > 0",
        MediaKind::Movie => "kind = 'video'",
        MediaKind::Music => "kind = 'audio'",
    }
}

/// Folders first, then natural name order
pub fn sort_listing(entries: &mut [Entry]) {
    entries.sort_by(|a, b| {
        let a_folder = a.kind == "folder";
        let b_folder = b.kind == "folder";
        b_folder
            .cmp(&a_folder)
            .then_with(|| natural_cmp(&a.name, &b.name))
    });
}

/// Insert or refresh scanned entries. Favorites and view counts survive.
pub async fn upsert_entries(
    pool: &DbPool,
    source_key: &str,
    root_folder: &str,
    entries: &[NewEntry],
    scanned_at: i64,
) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;

    for entry in entries {
        sqlx::query(
            r#"
            INSERT INTO entries
                (source_key, root_folder, path, parent, name, kind, thumbnail,
                 size_bytes, image_count, modified_at, scanned_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT (source_key, root_folder, path)
            DO UPDATE SET
                parent = excluded.parent,
                name = excluded.name,
                kind = excluded.kind,
                thumbnail = excluded.thumbnail,
                size_bytes = excluded.size_bytes,
                image_count = excluded.image_count,
                modified_at = excluded.modified_at,
                scanned_at = excluded.scanned_at
            "#,
        )
        .bind(source_key)
        .bind(root_folder)
        .bind(&entry.path)
        .bind(&entry.parent)
        .bind(&entry.name)
        .bind(entry.kind.as_str())
        .bind(&entry.thumbnail)
        .bind(entry.size_bytes)
        .bind(entry.image_count)
        .bind(entry.modified_at)
        .bind(scanned_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Remove entries that the last scan did not see
pub async fn prune_entries(
    pool: &DbPool,
    source_key: &str,
    root_folder: &str,
    scanned_at: i64,
) -> anyhow::Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM entries
        WHERE source_key = ?1 AND root_folder = ?2 AND scanned_at < ?3
        "#,
    )
    .bind(source_key)
    .bind(root_folder)
    .bind(scanned_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Remember that a namespace has been scanned
pub async fn record_scan(
    pool: &DbPool,
    source_key: &str,
    root_folder: &str,
    finished_at: i64,
    entry_count: i64,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO scans (source_key, root_folder, finished_at, entry_count)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT (source_key, root_folder)
        DO UPDATE SET finished_at = excluded.finished_at, entry_count = excluded.entry_count
        "#,
    )
    .bind(source_key)
    .bind(root_folder)
    .bind(finished_at)
    .bind(entry_count)
    .execute(pool)
    .await?;

    Ok(())
}

/// Whether a namespace was scanned at least once
pub async fn has_scan(pool: &DbPool, source_key: &str, root_folder: &str) -> anyhow::Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT finished_at FROM scans WHERE source_key = ?1 AND root_folder = ?2",
    )
    .bind(source_key)
    .bind(root_folder)
    .fetch_optional(pool)
    .await?;

    Ok(row.is_some())
}

/// Direct children of a folder ("" lists the top level)
pub async fn list_children(
    pool: &DbPool,
    source_key: &str,
    root_folder: &str,
    parent: &str,
) -> anyhow::Result<Vec<Entry>> {
    let mut entries = sqlx::query_as::<_, Entry>(&format!(
        "SELECT {ENTRY_COLUMNS} FROM entries
         WHERE source_key = ?1 AND root_folder = ?2 AND parent = ?3"
    ))
    .bind(source_key)
    .bind(root_folder)
    .bind(parent)
    .fetch_all(pool)
    .await?;

    sort_listing(&mut entries);
    Ok(entries)
}

/// Get a single entry by path
pub async fn get_entry(
    pool: &DbPool,
    source_key: &str,
    root_folder: &str,
    path: &str,
) -> anyhow::Result<Option<Entry>> {
    let entry = sqlx::query_as::<_, Entry>(&format!(
        "SELECT {ENTRY_COLUMNS} FROM entries
         WHERE source_key = ?1 AND root_folder = ?2 AND path = ?3"
    ))
    .bind(source_key)
    .bind(root_folder)
    .bind(path)
    .fetch_optional(pool)
    .await?;

    Ok(entry)
}

/// Set the favorite flag. Returns false when the entry does not exist.
pub async fn set_favorite(
    pool: &DbPool,
    source_key: &str,
    root_folder: &str,
    path: &str,
    value: bool,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE entries SET is_favorite = ?4
        WHERE source_key = ?1 AND root_folder = ?2 AND path = ?3
        "#,
    )
    .bind(source_key)
    .bind(root_folder)
    .bind(path)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Bump the view counter, returning the new count
pub async fn increase_view(
    pool: &DbPool,
    source_key: &str,
    root_folder: &str,
    path: &str,
    viewed_at: i64,
) -> anyhow::Result<Option<i64>> {
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        UPDATE entries
        SET view_count = view_count + 1, last_viewed_at = ?4
        WHERE source_key = ?1 AND root_folder = ?2 AND path = ?3
        RETURNING view_count
        "#,
    )
    .bind(source_key)
    .bind(root_folder)
    .bind(path)
    .bind(viewed_at)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.0))
}

/// Most viewed entries, highest first
pub async fn top_viewed(
    pool: &DbPool,
    source_key: &str,
    root_folder: &str,
    limit: i64,
) -> anyhow::Result<Vec<Entry>> {
    let entries = sqlx::query_as::<_, Entry>(&format!(
        "SELECT {ENTRY_COLUMNS} FROM entries
         WHERE source_key = ?1 AND root_folder = ?2 AND view_count > 0
         ORDER BY view_count DESC, last_viewed_at DESC, name
         LIMIT ?3"
    ))
    .bind(source_key)
    .bind(root_folder)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(entries)
}

/// Favorite entries in listing order
pub async fn list_favorites(
    pool: &DbPool,
    source_key: &str,
    root_folder: &str,
) -> anyhow::Result<Vec<Entry>> {
    let mut entries = sqlx::query_as::<_, Entry>(&format!(
        "SELECT {ENTRY_COLUMNS} FROM entries
         WHERE source_key = ?1 AND root_folder = ?2 AND is_favorite"
    ))
    .bind(source_key)
    .bind(root_folder)
    .fetch_all(pool)
    .await?;

    sort_listing(&mut entries);
    Ok(entries)
}

/// Case-insensitive substring search on entry names
pub async fn search(
    pool: &DbPool,
    source_key: &str,
    root_folder: &str,
    query: &str,
    limit: i64,
) -> anyhow::Result<Vec<Entry>> {
    let pattern = format!("%{}%", escape_like(query));
    let mut entries = sqlx::query_as::<_, Entry>(&format!(
        "SELECT {ENTRY_COLUMNS} FROM entries
         WHERE source_key = ?1 AND root_folder = ?2 AND name LIKE ?3 ESCAPE '\\'
         LIMIT ?4"
    ))
    .bind(source_key)
    .bind(root_folder)
    .bind(pattern)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    sort_listing(&mut entries);
    Ok(entries)
}

fn escape_like(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Random sample of playable entries
pub async fn random_entries(
    pool: &DbPool,
    kind: MediaKind,
    source_key: &str,
    root_folder: &str,
    count: usize,
) -> anyhow::Result<Vec<Entry>> {
    let candidates = sqlx::query_as::<_, Entry>(&format!(
        "SELECT {ENTRY_COLUMNS} FROM entries
         WHERE source_key = ?1 AND root_folder = ?2 AND {}",
        playable_clause(kind)
    ))
    .bind(source_key)
    .bind(root_folder)
    .fetch_all(pool)
    .await?;

    Ok(sample(&candidates, count))
}

fn sample<T: Clone>(items: &[T], count: usize) -> Vec<T> {
    let mut rng = rand::rng();
    items.choose_multiple(&mut rng, count).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use crate::library::EntryKind;

    fn folder(path: &str, images: i64) -> NewEntry {
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        NewEntry {
            path: path.to_string(),
            parent: crate::library::parent_of(path).to_string(),
            name,
            kind: EntryKind::Folder,
            thumbnail: None,
            size_bytes: 0,
            image_count: images,
            modified_at: 0,
        }
    }

    async fn seeded() -> DbPool {
        let pool = memory_pool().await;
        let entries = vec![
            folder("Berserk", 0),
            folder("Berserk/Vol 10", 20),
            folder("Berserk/Vol 2", 18),
            folder("Monster", 30),
        ];
        upsert_entries(&pool, "ROOT_A", "Seinen", &entries, 100).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_list_children_natural_order() {
        let pool = seeded().await;
        let top = list_children(&pool, "ROOT_A", "Seinen", "").await.unwrap();
        let names: Vec<&str> = top.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Berserk", "Monster"]);

        let vols = list_children(&pool, "ROOT_A", "Seinen", "Berserk").await.unwrap();
        let names: Vec<&str> = vols.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Vol 2", "Vol 10"]);

        let other_root = list_children(&pool, "ROOT_A", "Shonen", "").await.unwrap();
        assert!(other_root.is_empty());
    }

    #[tokio::test]
    async fn test_rescan_keeps_favorite_and_views() {
        let pool = seeded().await;
        assert!(set_favorite(&pool, "ROOT_A", "Seinen", "Monster", true).await.unwrap());
        assert_eq!(
            increase_view(&pool, "ROOT_A", "Seinen", "Monster", 5).await.unwrap(),
            Some(1)
        );

        let mut updated = folder("Monster", 31);
        updated.thumbnail = Some("Monster/001.jpg".into());
        upsert_entries(&pool, "ROOT_A", "Seinen", &[updated], 200).await.unwrap();
        let pruned = prune_entries(&pool, "ROOT_A", "Seinen", 200).await.unwrap();
        assert_eq!(pruned, 3);

        let monster = get_entry(&pool, "ROOT_A", "Seinen", "Monster").await.unwrap().unwrap();
        assert!(monster.is_favorite);
        assert_eq!(monster.view_count, 1);
        assert_eq!(monster.image_count, 31);
        assert_eq!(monster.thumbnail.as_deref(), Some("Monster/001.jpg"));
        assert!(get_entry(&pool, "ROOT_A", "Seinen", "Berserk").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_path_updates_nothing() {
        let pool = seeded().await;
        assert!(!set_favorite(&pool, "ROOT_A", "Seinen", "Nope", true).await.unwrap());
        assert_eq!(increase_view(&pool, "ROOT_A", "Seinen", "Nope", 1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_top_viewed_order() {
        let pool = seeded().await;
        for _ in 0..3 {
            increase_view(&pool, "ROOT_A", "Seinen", "Berserk/Vol 2", 10).await.unwrap();
        }
        increase_view(&pool, "ROOT_A", "Seinen", "Monster", 11).await.unwrap();

        let top = top_viewed(&pool, "ROOT_A", "Seinen", 10).await.unwrap();
        let paths: Vec<&str> = top.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["Berserk/Vol 2", "Monster"]);

        let top_one = top_viewed(&pool, "ROOT_A", "Seinen", 1).await.unwrap();
        assert_eq!(top_one.len(), 1);
    }

    #[tokio::test]
    async fn test_random_only_playable() {
        let pool = seeded().await;
        let picked = random_entries(&pool, MediaKind::Manga, "ROOT_A", "Seinen", 10)
            .await
            .unwrap();
        assert_eq!(picked.len(), 3);
        assert!(picked.iter().all(|e| e.image_count > 0));

        let two = random_entries(&pool, MediaKind::Manga, "ROOT_A", "Seinen", 2)
            .await
            .unwrap();
        assert_eq!(two.len(), 2);
    }

    #[tokio::test]
    async fn test_search_and_favorites() {
        let pool = seeded().await;
        let hits = search(&pool, "ROOT_A", "Seinen", "vol", 10).await.unwrap();
        assert_eq!(hits.len(), 2);

        let none = search(&pool, "ROOT_A", "Seinen", "100%", 10).await.unwrap();
        assert!(none.is_empty());

        set_favorite(&pool, "ROOT_A", "Seinen", "Berserk/Vol 10", true).await.unwrap();
        let favs = list_favorites(&pool, "ROOT_A", "Seinen").await.unwrap();
        assert_eq!(favs.len(), 1);
        assert_eq!(favs[0].path, "Berserk/Vol 10");
    }

    #[tokio::test]
    async fn test_scan_record() {
        let pool = memory_pool().await;
        assert!(!has_scan(&pool, "V_FILMS", "").await.unwrap());
        record_scan(&pool, "V_FILMS", "", 1, 0).await.unwrap();
        assert!(has_scan(&pool, "V_FILMS", "").await.unwrap());
    }
}
