//! Folder cache
//!
//! Snapshots of server responses kept in the local store. Each value is an
//! envelope `{ data, timestamp }` and is served until the time-to-live of
//! its purpose has passed. Keys are namespaced so that everything belonging
//! to one library can be found (and rewritten) by prefix:
//!
//! ```text
//! {kind}::{source}::{root}::{purpose}[::{path}]
//! ```
//!
//! `%` and `:` are percent-escaped in the source and root segments, so one
//! namespace prefix never matches keys of another.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::library::Namespace;
use crate::store::LocalStore;

const SEPARATOR: &str = "::";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePurpose {
    /// Folder listing, keyed by path
    Folder,
    Random,
    Top,
    /// Most recently opened entries
    Recent,
    /// Playlist ids containing a track, keyed by track path
    Playlist,
}

impl CachePurpose {
    pub const ALL: [CachePurpose; 5] = [
        CachePurpose::Folder,
        CachePurpose::Random,
        CachePurpose::Top,
        CachePurpose::Recent,
        CachePurpose::Playlist,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CachePurpose::Folder => "folder",
            CachePurpose::Random => "random",
            CachePurpose::Top => "top",
            CachePurpose::Recent => "recent",
            CachePurpose::Playlist => "playlist",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == value)
    }

    /// How long a snapshot stays valid; `None` never expires
    pub fn ttl(&self) -> Option<chrono::Duration> {
        match self {
            CachePurpose::Folder => Some(chrono::Duration::hours(4)),
            CachePurpose::Random => Some(chrono::Duration::minutes(30)),
            CachePurpose::Top => Some(chrono::Duration::hours(1)),
            CachePurpose::Playlist => Some(chrono::Duration::minutes(10)),
            CachePurpose::Recent => None,
        }
    }

    /// Purposes whose snapshots hold folder entries with a favorite flag
    pub fn holds_entries(&self) -> bool {
        matches!(
            self,
            CachePurpose::Folder | CachePurpose::Random | CachePurpose::Top | CachePurpose::Recent
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEnvelope<T> {
    pub data: T,
    /// Epoch milliseconds of the write
    pub timestamp: i64,
}

impl<T> CacheEnvelope<T> {
    pub fn is_fresh(&self, purpose: CachePurpose, now: i64) -> bool {
        match purpose.ttl() {
            Some(ttl) => now - self.timestamp < ttl.num_milliseconds(),
            None => true,
        }
    }
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ============================================================================
// KEYS
// ============================================================================

/// Prefix shared by every key of a namespace
pub fn namespace_prefix(ns: &Namespace) -> String {
    format!(
        "{kind}{SEPARATOR}{source}{SEPARATOR}{root}{SEPARATOR}",
        kind = ns.kind.as_str(),
        source = escape_segment(&ns.source),
        root = escape_segment(&ns.root),
    )
}

fn escape_segment(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            c => out.push(c),
        }
    }
    out
}

pub fn key(ns: &Namespace, purpose: CachePurpose, path: Option<&str>) -> String {
    let mut key = namespace_prefix(ns);
    key.push_str(purpose.as_str());
    if let Some(path) = path {
        key.push_str(SEPARATOR);
        key.push_str(path);
    }
    key
}

/// Purpose segment of a key that belongs to `ns`
pub fn purpose_of(ns: &Namespace, key: &str) -> Option<CachePurpose> {
    let rest = key.strip_prefix(&namespace_prefix(ns))?;
    let segment = rest.split(SEPARATOR).next()?;
    CachePurpose::parse(segment)
}

// ============================================================================
// CACHE
// ============================================================================

pub struct Cache {
    store: LocalStore,
}

impl Cache {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Raw envelope regardless of age. Values that do not parse are removed
    /// and reported as missing.
    pub fn read_envelope<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> anyhow::Result<Option<CacheEnvelope<T>>> {
        let Some(raw) = self.store.get(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(envelope) => Ok(Some(envelope)),
            Err(e) => {
                tracing::debug!(key, "dropping unreadable cache entry: {}", e);
                self.store.remove(key)?;
                Ok(None)
            }
        }
    }

    pub fn write_envelope<T: Serialize>(
        &self,
        key: &str,
        envelope: &CacheEnvelope<T>,
    ) -> anyhow::Result<()> {
        let raw = serde_json::to_string(envelope)?;
        self.store.set(key, &raw)
    }

    pub fn read<T: DeserializeOwned>(
        &self,
        key: &str,
        purpose: CachePurpose,
    ) -> anyhow::Result<Option<T>> {
        self.read_at(key, purpose, now_millis())
    }

    pub fn read_at<T: DeserializeOwned>(
        &self,
        key: &str,
        purpose: CachePurpose,
        now: i64,
    ) -> anyhow::Result<Option<T>> {
        Ok(self
            .read_envelope::<T>(key)?
            .filter(|e| e.is_fresh(purpose, now))
            .map(|e| e.data))
    }

    pub fn write<T: Serialize>(&self, key: &str, data: &T) -> anyhow::Result<()> {
        self.write_at(key, data, now_millis())
    }

    pub fn write_at<T: Serialize>(&self, key: &str, data: &T, now: i64) -> anyhow::Result<()> {
        self.write_envelope(
            key,
            &CacheEnvelope {
                data,
                timestamp: now,
            },
        )
    }

    /// Serve a fresh snapshot when there is one, otherwise fetch and store.
    /// `refresh` skips the read.
    pub async fn get_or_fetch<T, F, Fut>(
        &self,
        key: &str,
        purpose: CachePurpose,
        refresh: bool,
        fetch: F,
    ) -> anyhow::Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        if !refresh {
            if let Some(hit) = self.read(key, purpose)? {
                tracing::debug!(key, "cache hit");
                return Ok(hit);
            }
        }

        let data = fetch().await?;
        self.write(key, &data)?;
        Ok(data)
    }

    pub fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.store.remove(key)
    }

    /// Drop every snapshot under `prefix`
    pub fn clear(&self, prefix: &str) -> anyhow::Result<usize> {
        self.store.remove_prefix(prefix)
    }

    #[cfg(test)]
    pub fn open_memory() -> Self {
        Self::new(LocalStore::open_memory().expect("in-memory store"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manga() -> Namespace {
        Namespace::new("ROOT_MANGA", Some("Shelf")).unwrap()
    }

    #[test]
    fn test_key_layout() {
        let ns = manga();
        assert_eq!(
            key(&ns, CachePurpose::Folder, Some("Berserk/vol1")),
            "manga::ROOT_MANGA::Shelf::folder::Berserk/vol1"
        );
        assert_eq!(key(&ns, CachePurpose::Random, None), "manga::ROOT_MANGA::Shelf::random");

        let music = Namespace::new("M_SONGS", None).unwrap();
        assert_eq!(key(&music, CachePurpose::Top, None), "music::M_SONGS::::top");
    }

    #[test]
    fn test_purpose_of() {
        let ns = manga();
        let folder = key(&ns, CachePurpose::Folder, Some("a::b"));
        assert_eq!(purpose_of(&ns, &folder), Some(CachePurpose::Folder));
        assert_eq!(purpose_of(&ns, "manga::ROOT_MANGA::Other::folder"), None);
        assert_eq!(purpose_of(&ns, "manga::ROOT_MANGA::Shelf::bogus"), None);
    }

    #[test]
    fn test_root_with_separator_is_escaped() {
        let tricky = Namespace::new("ROOT_MANGA", Some("Shelf::folder")).unwrap();
        assert_eq!(
            key(&tricky, CachePurpose::Top, None),
            "manga::ROOT_MANGA::Shelf%3A%3Afolder::top"
        );
        let percent = Namespace::new("ROOT_MANGA", Some("Shelf%3A%3Afolder")).unwrap();
        assert_ne!(namespace_prefix(&tricky), namespace_prefix(&percent));

        let shelf = manga();
        assert_eq!(purpose_of(&shelf, &key(&tricky, CachePurpose::Top, None)), None);
        assert_eq!(
            purpose_of(&tricky, &key(&tricky, CachePurpose::Folder, Some("x"))),
            Some(CachePurpose::Folder)
        );
    }

    #[test]
    fn test_clear_leaves_root_with_separator() {
        let cache = Cache::open_memory();
        let shelf = manga();
        let tricky = Namespace::new("ROOT_MANGA", Some("Shelf::folder")).unwrap();
        cache.write(&key(&shelf, CachePurpose::Top, None), &1).unwrap();
        let kept = key(&tricky, CachePurpose::Top, None);
        cache.write(&kept, &1).unwrap();

        assert_eq!(cache.clear(&namespace_prefix(&shelf)).unwrap(), 1);
        assert!(cache.store().get(&kept).unwrap().is_some());
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = Cache::open_memory();
        let ns = manga();
        let k = key(&ns, CachePurpose::Random, None);
        let written = 1_000_000;
        cache.write_at(&k, &vec![1, 2, 3], written).unwrap();

        let thirty_min = 30 * 60 * 1000;
        let hit: Option<Vec<i32>> = cache
            .read_at(&k, CachePurpose::Random, written + thirty_min - 1)
            .unwrap();
        assert_eq!(hit, Some(vec![1, 2, 3]));

        let miss: Option<Vec<i32>> = cache
            .read_at(&k, CachePurpose::Random, written + thirty_min)
            .unwrap();
        assert_eq!(miss, None);

        // Same snapshot read as a folder listing is still within 4 hours
        let folder: Option<Vec<i32>> = cache
            .read_at(&k, CachePurpose::Folder, written + thirty_min)
            .unwrap();
        assert!(folder.is_some());
    }

    #[test]
    fn test_recent_never_expires() {
        let cache = Cache::open_memory();
        cache.write_at("k", &"x", 0).unwrap();
        let hit: Option<String> = cache.read_at("k", CachePurpose::Recent, i64::MAX).unwrap();
        assert_eq!(hit.as_deref(), Some("x"));
    }

    #[test]
    fn test_unparseable_is_miss_and_removed() {
        let cache = Cache::open_memory();
        cache.store().set("k", "{not json").unwrap();

        let hit: Option<Vec<i32>> = cache.read("k", CachePurpose::Folder).unwrap();
        assert_eq!(hit, None);
        assert_eq!(cache.store().get("k").unwrap(), None);

        // Valid JSON of the wrong shape is also a miss
        cache.store().set("k", "{\"data\":\"text\",\"timestamp\":1}").unwrap();
        let hit: Option<Vec<i32>> = cache.read("k", CachePurpose::Recent).unwrap();
        assert_eq!(hit, None);
    }

    #[tokio::test]
    async fn test_get_or_fetch() {
        let cache = Cache::open_memory();
        let mut calls = 0;

        let first: Vec<String> = cache
            .get_or_fetch("k", CachePurpose::Folder, false, || {
                calls += 1;
                async { Ok(vec!["a".to_string()]) }
            })
            .await
            .unwrap();
        assert_eq!(first, vec!["a"]);

        let second: Vec<String> = cache
            .get_or_fetch("k", CachePurpose::Folder, false, || {
                calls += 1;
                async { Ok(vec!["b".to_string()]) }
            })
            .await
            .unwrap();
        assert_eq!(second, vec!["a"]);

        let refreshed: Vec<String> = cache
            .get_or_fetch("k", CachePurpose::Folder, true, || {
                calls += 1;
                async { Ok(vec!["c".to_string()]) }
            })
            .await
            .unwrap();
        assert_eq!(refreshed, vec!["c"]);
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_writes_nothing() {
        let cache = Cache::open_memory();
        let result: anyhow::Result<Vec<i32>> = cache
            .get_or_fetch("k", CachePurpose::Top, false, || async {
                Err::<Vec<i32>, _>(anyhow::anyhow!("offline"))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(cache.store().get("k").unwrap(), None);
    }

    #[test]
    fn test_clear_namespace() {
        let cache = Cache::open_memory();
        let ns = manga();
        let other = Namespace::new("V_FILMS", None).unwrap();
        cache.write(&key(&ns, CachePurpose::Top, None), &1).unwrap();
        cache.write(&key(&ns, CachePurpose::Folder, Some("x")), &1).unwrap();
        cache.write(&key(&other, CachePurpose::Top, None), &1).unwrap();

        assert_eq!(cache.clear(&namespace_prefix(&ns)).unwrap(), 2);
        assert_eq!(cache.store().keys_with_prefix("").unwrap().len(), 1);
    }
}
