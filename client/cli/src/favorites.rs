//! Favorite toggling
//!
//! A favorite flag lives on the server, but copies of the entry sit in
//! several cached snapshots of the same library (folder listings, random,
//! recent and top lists). After a toggle every copy is rewritten so that
//! the next cached read agrees with the server.

use crate::api::{ApiClient, FolderEntry};
use crate::cache::{self, Cache, CacheEnvelope};
use crate::library::Namespace;

/// Rewrite `isFavorite` of `path` in every entry snapshot of the namespace.
/// Snapshots keep their timestamps. Returns the number of snapshots changed.
pub fn propagate_favorite(
    cache: &Cache,
    ns: &Namespace,
    path: &str,
    value: bool,
) -> anyhow::Result<usize> {
    let mut changed = 0;

    for key in cache.store().keys_with_prefix(&cache::namespace_prefix(ns))? {
        let Some(purpose) = cache::purpose_of(ns, &key) else {
            continue;
        };
        if !purpose.holds_entries() {
            continue;
        }

        let Some(mut envelope): Option<EntrySnapshot> = cache.read_envelope(&key)? else {
            continue;
        };

        let mut touched = false;
        for entry in envelope.data.iter_mut().filter(|e| e.path == path) {
            if entry.is_favorite != value {
                entry.is_favorite = value;
                touched = true;
            }
        }

        if touched {
            cache.write_envelope(&key, &envelope)?;
            changed += 1;
        }
    }

    tracing::debug!(source = %ns.source, path, value, changed, "favorite propagated");
    Ok(changed)
}

/// Persist a favorite on the server and mirror it into the local caches.
///
/// The caches are updated even when the request fails; the failure is
/// logged and returned to the caller.
pub async fn toggle_favorite(
    api: &ApiClient,
    cache: &Cache,
    ns: &Namespace,
    path: &str,
    value: bool,
) -> anyhow::Result<usize> {
    let persisted = api.set_favorite(ns, path, value).await;

    let changed = propagate_favorite(cache, ns, path, value)?;

    if let Err(e) = persisted {
        tracing::warn!(source = %ns.source, path, "favorite not saved: {}", e);
        return Err(anyhow::anyhow!("favorite not saved on server: {}", e));
    }
    Ok(changed)
}

/// Envelope type stored for entry snapshots
pub type EntrySnapshot = CacheEnvelope<Vec<FolderEntry>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{key, CachePurpose};

    fn entry(path: &str, favorite: bool) -> FolderEntry {
        FolderEntry {
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            path: path.to_string(),
            kind: "folder".to_string(),
            thumbnail: None,
            is_favorite: favorite,
            view_count: 0,
            size: 0,
            image_count: 0,
            modified_at: 0,
        }
    }

    fn snapshot(cache: &Cache, key: &str) -> EntrySnapshot {
        cache.read_envelope(key).unwrap().expect("snapshot present")
    }

    fn shelf() -> Namespace {
        Namespace::new("ROOT_MANGA", Some("Shelf")).unwrap()
    }

    #[test]
    fn test_updates_every_snapshot_in_namespace() {
        let cache = Cache::open_memory();
        let ns = shelf();

        let folder = key(&ns, CachePurpose::Folder, Some(""));
        let random = key(&ns, CachePurpose::Random, None);
        let recent = key(&ns, CachePurpose::Recent, None);
        let top = key(&ns, CachePurpose::Top, None);

        cache.write_at(&folder, &vec![entry("Akira", false), entry("Berserk", false)], 10).unwrap();
        cache.write_at(&random, &vec![entry("Berserk", false)], 20).unwrap();
        cache.write_at(&recent, &vec![entry("Berserk", false)], 30).unwrap();
        cache.write_at(&top, &vec![entry("Akira", false)], 40).unwrap();

        let changed = propagate_favorite(&cache, &ns, "Berserk", true).unwrap();
        assert_eq!(changed, 3);

        let folder_snap = snapshot(&cache, &folder);
        assert_eq!(folder_snap.timestamp, 10);
        assert!(!folder_snap.data[0].is_favorite);
        assert!(folder_snap.data[1].is_favorite);
        assert!(snapshot(&cache, &random).data[0].is_favorite);
        assert!(snapshot(&cache, &recent).data[0].is_favorite);
        assert_eq!(snapshot(&cache, &random).timestamp, 20);
        assert!(!snapshot(&cache, &top).data[0].is_favorite);
    }

    #[test]
    fn test_leaves_other_namespaces_alone() {
        let cache = Cache::open_memory();
        let ns = shelf();
        let other_root = Namespace::new("ROOT_MANGA", Some("Other")).unwrap();

        let ours = key(&ns, CachePurpose::Folder, Some(""));
        let theirs = key(&other_root, CachePurpose::Folder, Some(""));
        cache.write(&ours, &vec![entry("Berserk", false)]).unwrap();
        cache.write(&theirs, &vec![entry("Berserk", false)]).unwrap();

        propagate_favorite(&cache, &ns, "Berserk", true).unwrap();

        assert!(snapshot(&cache, &ours).data[0].is_favorite);
        assert!(!snapshot(&cache, &theirs).data[0].is_favorite);
    }

    #[test]
    fn test_leaves_root_with_separator_alone() {
        let cache = Cache::open_memory();
        let ns = shelf();
        let tricky = Namespace::new("ROOT_MANGA", Some("Shelf::folder")).unwrap();

        let ours = key(&ns, CachePurpose::Recent, None);
        let theirs = key(&tricky, CachePurpose::Recent, None);
        cache.write(&ours, &vec![entry("Berserk", false)]).unwrap();
        cache.write(&theirs, &vec![entry("Berserk", false)]).unwrap();

        assert_eq!(propagate_favorite(&cache, &ns, "Berserk", true).unwrap(), 1);
        assert!(!snapshot(&cache, &theirs).data[0].is_favorite);
    }

    #[test]
    fn test_drops_unparseable_and_skips_membership() {
        let cache = Cache::open_memory();
        let ns = shelf();

        let broken = key(&ns, CachePurpose::Random, None);
        cache.store().set(&broken, "garbage").unwrap();

        let playlist = key(&ns, CachePurpose::Playlist, Some("Berserk"));
        cache.write(&playlist, &vec![1i64, 2]).unwrap();

        assert_eq!(propagate_favorite(&cache, &ns, "Berserk", true).unwrap(), 0);
        assert_eq!(cache.store().get(&broken).unwrap(), None);
        assert!(cache.store().get(&playlist).unwrap().is_some());
    }

    #[test]
    fn test_stale_snapshots_are_still_rewritten() {
        let cache = Cache::open_memory();
        let ns = shelf();
        let random = key(&ns, CachePurpose::Random, None);
        cache.write_at(&random, &vec![entry("Berserk", false)], 0).unwrap();

        assert_eq!(propagate_favorite(&cache, &ns, "Berserk", true).unwrap(), 1);
        let snap = snapshot(&cache, &random);
        assert_eq!(snap.timestamp, 0);
        assert!(snap.data[0].is_favorite);
    }

    #[tokio::test]
    async fn test_network_failure_keeps_optimistic_update() {
        let cache = Cache::open_memory();
        let ns = shelf();
        let folder = key(&ns, CachePurpose::Folder, Some(""));
        cache.write(&folder, &vec![entry("Berserk", false)]).unwrap();

        // Nothing listens on the discard port
        let api = ApiClient::new("http://127.0.0.1:9");
        let result = toggle_favorite(&api, &cache, &ns, "Berserk", true).await;

        assert!(result.is_err());
        assert!(snapshot(&cache, &folder).data[0].is_favorite);
    }
}
