//! Recent, random and top lists shown at the top of each library.

use crate::api::{ApiClient, FolderEntry};
use crate::cache::{key, Cache, CacheEnvelope, CachePurpose};
use crate::library::Namespace;

/// Entries kept in the recent list
pub const RECENT_LIMIT: usize = 20;
/// Entries requested for random and top lists
pub const SLIDER_COUNT: usize = 20;

/// Move `entry` to the front of `list`, dropping an older copy of the same
/// path and anything past `limit`.
pub fn push_front_unique(list: &mut Vec<FolderEntry>, entry: FolderEntry, limit: usize) {
    list.retain(|e| e.path != entry.path);
    list.insert(0, entry);
    list.truncate(limit);
}

pub fn recent(cache: &Cache, ns: &Namespace) -> anyhow::Result<Vec<FolderEntry>> {
    let recent = cache.read(&key(ns, CachePurpose::Recent, None), CachePurpose::Recent)?;
    Ok(recent.unwrap_or_default())
}

/// Record that an entry was opened
pub fn push_recent(
    cache: &Cache,
    ns: &Namespace,
    entry: FolderEntry,
) -> anyhow::Result<Vec<FolderEntry>> {
    let mut list = recent(cache, ns)?;
    push_front_unique(&mut list, entry, RECENT_LIMIT);
    cache.write(&key(ns, CachePurpose::Recent, None), &list)?;
    Ok(list)
}

pub fn clear_recent(cache: &Cache, ns: &Namespace) -> anyhow::Result<()> {
    cache.remove(&key(ns, CachePurpose::Recent, None))
}

pub async fn random(
    api: &ApiClient,
    cache: &Cache,
    ns: &Namespace,
    refresh: bool,
) -> anyhow::Result<Vec<FolderEntry>> {
    let key = key(ns, CachePurpose::Random, None);
    cache
        .get_or_fetch(&key, CachePurpose::Random, refresh, move || async move {
            Ok(api.random(ns, SLIDER_COUNT).await?)
        })
        .await
}

pub async fn top(
    api: &ApiClient,
    cache: &Cache,
    ns: &Namespace,
    refresh: bool,
) -> anyhow::Result<Vec<FolderEntry>> {
    let key = key(ns, CachePurpose::Top, None);
    cache
        .get_or_fetch(&key, CachePurpose::Top, refresh, move || async move {
            Ok(api.top(ns, SLIDER_COUNT).await?)
        })
        .await
}

/// Age of a cached slider in whole minutes, for display
pub fn snapshot_age_minutes(cache: &Cache, key: &str, now: i64) -> anyhow::Result<Option<i64>> {
    let envelope: Option<CacheEnvelope<serde_json::Value>> = cache.read_envelope(key)?;
    Ok(envelope.map(|e| (now - e.timestamp).max(0) / 60_000))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str) -> FolderEntry {
        FolderEntry {
            name: path.to_string(),
            path: path.to_string(),
            kind: "video".to_string(),
            thumbnail: None,
            is_favorite: false,
            view_count: 0,
            size: 0,
            image_count: 0,
            modified_at: 0,
        }
    }

    fn paths(list: &[FolderEntry]) -> Vec<&str> {
        list.iter().map(|e| e.path.as_str()).collect()
    }

    #[test]
    fn test_push_front_dedupes() {
        let mut list = vec![entry("a"), entry("b"), entry("c")];
        push_front_unique(&mut list, entry("c"), 10);
        assert_eq!(paths(&list), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_push_front_bounded() {
        let mut list = Vec::new();
        for i in 0..5 {
            push_front_unique(&mut list, entry(&i.to_string()), 3);
        }
        assert_eq!(paths(&list), vec!["4", "3", "2"]);
    }

    #[test]
    fn test_recent_is_persisted_and_bounded() {
        let cache = Cache::open_memory();
        let ns = Namespace::new("V_FILMS", None).unwrap();
        let other = Namespace::new("V_SHOWS", None).unwrap();

        for i in 0..(RECENT_LIMIT + 5) {
            push_recent(&cache, &ns, entry(&format!("m{i}.mkv"))).unwrap();
        }
        push_recent(&cache, &ns, entry("m10.mkv")).unwrap();

        let list = recent(&cache, &ns).unwrap();
        assert_eq!(list.len(), RECENT_LIMIT);
        assert_eq!(list[0].path, "m10.mkv");
        assert_eq!(list[1].path, format!("m{}.mkv", RECENT_LIMIT + 4));
        assert_eq!(list.iter().filter(|e| e.path == "m10.mkv").count(), 1);

        assert!(recent(&cache, &other).unwrap().is_empty());

        clear_recent(&cache, &ns).unwrap();
        assert!(recent(&cache, &ns).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cached_random_skips_network() {
        let cache = Cache::open_memory();
        let ns = Namespace::new("M_SONGS", None).unwrap();
        cache
            .write(&key(&ns, CachePurpose::Random, None), &vec![entry("x.mp3")])
            .unwrap();

        // Unreachable server: a fresh snapshot must be served from cache
        let api = ApiClient::new("http://127.0.0.1:9");
        let list = random(&api, &cache, &ns, false).await.unwrap();
        assert_eq!(paths(&list), vec!["x.mp3"]);

        assert!(random(&api, &cache, &ns, true).await.is_err());
    }

    #[test]
    fn test_snapshot_age() {
        let cache = Cache::open_memory();
        cache.write_at("k", &vec![entry("a")], 0).unwrap();
        assert_eq!(snapshot_age_minutes(&cache, "k", 125_000).unwrap(), Some(2));
        assert_eq!(snapshot_age_minutes(&cache, "missing", 0).unwrap(), None);
    }
}
