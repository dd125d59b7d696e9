//! Library scanner
//!
//! Walks a namespace directory (a manga root folder, or a whole movie/music
//! source) and mirrors it into the `entries` table.

use super::{
    is_audio, is_hidden, is_image, is_video, natural_cmp, parent_of, to_rel_string, EntryKind,
    LibraryError, LibraryResult, MediaKind, Source, COVER_NAMES,
};
use crate::db::{entries, DbPool, NewEntry};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// How deep to look into nested folders for a manga thumbnail
const THUMBNAIL_DEPTH: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ScanSummary {
    pub indexed: usize,
    pub pruned: u64,
}

/// Scan one namespace and replace its index
pub async fn scan_namespace(
    pool: &DbPool,
    source: &Source,
    root_folder: &str,
) -> LibraryResult<ScanSummary> {
    let dir = source.namespace_dir(root_folder)?;
    if !dir.is_dir() {
        return Err(LibraryError::NotFound(format!(
            "{}/{}",
            source.key, root_folder
        )));
    }

    let kind = source.kind;
    let found = tokio::task::spawn_blocking(move || collect_entries(kind, &dir))
        .await
        .map_err(|e| LibraryError::Io(io::Error::other(e)))??;

    let scanned_at = chrono::Utc::now().timestamp_millis();
    let indexed = found.len();

    entries::upsert_entries(pool, &source.key, root_folder, &found, scanned_at)
        .await
        .map_err(internal)?;
    let pruned = entries::prune_entries(pool, &source.key, root_folder, scanned_at)
        .await
        .map_err(internal)?;
    entries::record_scan(pool, &source.key, root_folder, scanned_at, indexed as i64)
        .await
        .map_err(internal)?;

    tracing::info!(
        source = %source.key,
        root = %root_folder,
        indexed,
        pruned,
        "scan complete"
    );

    Ok(ScanSummary { indexed, pruned })
}

fn internal(err: anyhow::Error) -> LibraryError {
    match err.downcast::<sqlx::Error>() {
        Ok(db) => LibraryError::Db(db),
        Err(other) => LibraryError::Io(io::Error::other(other.to_string())),
    }
}

/// Walk `dir` and build the entries for the given media kind.
/// Entries that cannot be read are logged and left out.
pub fn collect_entries(kind: MediaKind, dir: &Path) -> io::Result<Vec<NewEntry>> {
    let mut found = Vec::new();
    let mut listings = Listings::default();

    let walker = walkdir::WalkDir::new(dir)
        .min_depth(1)
        .sort_by(|a, b| {
            natural_cmp(
                &a.file_name().to_string_lossy(),
                &b.file_name().to_string_lossy(),
            )
        })
        .into_iter()
        .filter_entry(|e| !is_hidden(&e.file_name().to_string_lossy()));

    for item in walker {
        let item = match item {
            Ok(item) => item,
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => {
                tracing::warn!("skipping unreadable entry: {}", e);
                continue;
            }
        };
        let path = item.path();
        let Some(rel) = to_rel_string(dir, path) else {
            continue;
        };
        match build_entry(kind, dir, path, rel, &mut listings) {
            Ok(Some(entry)) => found.push(entry),
            Ok(None) => {}
            Err(e) => tracing::warn!(path = %path.display(), "skipping unreadable entry: {}", e),
        }
    }

    Ok(found)
}

fn build_entry(
    kind: MediaKind,
    base: &Path,
    path: &Path,
    rel: String,
    listings: &mut Listings,
) -> io::Result<Option<NewEntry>> {
    let metadata = fs::metadata(path)?;
    let modified_at = metadata.modified().map(epoch_millis).unwrap_or(0);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parent = parent_of(&rel).to_string();

    if metadata.is_dir() {
        let listing = listings.get(path)?;
        let (thumbnail, image_count) = match kind {
            MediaKind::Manga => {
                let image_count = listing.images().count() as i64;
                if image_count == 0 && listing.dirs.is_empty() {
                    return Ok(None);
                }
                let thumbnail = manga_thumbnail(path, listings, THUMBNAIL_DEPTH)?;
                (thumbnail, image_count)
            }
            MediaKind::Movie => {
                let thumbnail = cover_image(listing).or_else(|| {
                    listing
                        .files
                        .iter()
                        .filter(|f| is_video(f))
                        .find_map(|f| sibling_image(f, listing))
                });
                (thumbnail, 0)
            }
            MediaKind::Music => (cover_image(listing), 0),
        };
        return Ok(Some(NewEntry {
            path: rel,
            parent,
            name,
            kind: EntryKind::Folder,
            thumbnail: thumbnail.and_then(|t| to_rel_string(base, &t)),
            size_bytes: 0,
            image_count,
            modified_at,
        }));
    }

    let entry_kind = match kind {
        MediaKind::Movie if is_video(path) => EntryKind::Video,
        MediaKind::Music if is_audio(path) => EntryKind::Audio,
        _ => return Ok(None),
    };
    let thumbnail = match path.parent() {
        Some(dir) => {
            let listing = listings.get(dir)?;
            match entry_kind {
                EntryKind::Video => sibling_image(path, listing),
                _ => cover_image(listing),
            }
        }
        None => None,
    };
    Ok(Some(NewEntry {
        path: rel,
        parent,
        name,
        kind: entry_kind,
        thumbnail: thumbnail.and_then(|t| to_rel_string(base, &t)),
        size_bytes: metadata.len() as i64,
        image_count: 0,
        modified_at,
    }))
}

/// Directory listings read during one scan, one per directory
#[derive(Default)]
struct Listings {
    by_dir: HashMap<PathBuf, DirListing>,
}

impl Listings {
    fn get(&mut self, dir: &Path) -> io::Result<&DirListing> {
        if !self.by_dir.contains_key(dir) {
            let listing = DirListing::read(dir)?;
            self.by_dir.insert(dir.to_path_buf(), listing);
        }
        self.by_dir
            .get(dir)
            .ok_or_else(|| io::Error::other("listing vanished"))
    }
}

fn epoch_millis(time: SystemTime) -> i64 {
    chrono::DateTime::<chrono::Utc>::from(time).timestamp_millis()
}

/// Non-hidden children of a directory, each group in natural order
#[derive(Debug, Default)]
pub struct DirListing {
    pub dirs: Vec<PathBuf>,
    pub files: Vec<PathBuf>,
}

impl DirListing {
    pub fn read(dir: &Path) -> io::Result<Self> {
        let mut listing = DirListing::default();
        for item in fs::read_dir(dir)? {
            let item = item?;
            let name = item.file_name();
            if is_hidden(&name.to_string_lossy()) {
                continue;
            }
            if item.file_type()?.is_dir() {
                listing.dirs.push(item.path());
            } else {
                listing.files.push(item.path());
            }
        }
        let by_name = |a: &PathBuf, b: &PathBuf| {
            natural_cmp(
                &a.file_name().unwrap_or_default().to_string_lossy(),
                &b.file_name().unwrap_or_default().to_string_lossy(),
            )
        };
        listing.dirs.sort_by(by_name);
        listing.files.sort_by(by_name);
        Ok(listing)
    }

    pub fn images(&self) -> impl Iterator<Item = &PathBuf> {
        self.files.iter().filter(|f| is_image(f))
    }
}

/// First image of a folder, or of its first subfolder that has one
fn manga_thumbnail(
    dir: &Path,
    listings: &mut Listings,
    depth: usize,
) -> io::Result<Option<PathBuf>> {
    let listing = listings.get(dir)?;
    if let Some(first) = cover_image(listing).or_else(|| listing.images().next().cloned()) {
        return Ok(Some(first));
    }
    if depth == 0 {
        return Ok(None);
    }
    for sub in listing.dirs.clone() {
        if let Some(found) = manga_thumbnail(&sub, listings, depth - 1)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// An image named like a cover (`cover.jpg`, `folder.png`, ...)
fn cover_image(listing: &DirListing) -> Option<PathBuf> {
    listing
        .images()
        .find(|f| {
            f.file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|s| COVER_NAMES.contains(&s.to_ascii_lowercase().as_str()))
        })
        .cloned()
}

/// An image next to a media file sharing its stem (`movie.mkv` -> `movie.jpg`)
fn sibling_image(file: &Path, listing: &DirListing) -> Option<PathBuf> {
    let stem = file.file_stem()?;
    listing
        .images()
        .find(|img| img.file_stem() == Some(stem))
        .cloned()
}

/// Direct subfolders of a manga source, used as root folders
pub fn root_folders(source: &Source) -> io::Result<Vec<String>> {
    let listing = DirListing::read(&source.path)?;
    Ok(listing
        .dirs
        .iter()
        .filter_map(|d| d.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect())
}

/// Images of one folder, in reading order, relative to `base`
pub fn folder_images(base: &Path, folder: &Path) -> io::Result<Vec<String>> {
    let listing = DirListing::read(folder)?;
    Ok(listing
        .images()
        .filter_map(|img| to_rel_string(base, img))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn by_path<'a>(entries: &'a [NewEntry], path: &str) -> &'a NewEntry {
        entries
            .iter()
            .find(|e| e.path == path)
            .unwrap_or_else(|| panic!("missing entry {path}"))
    }

    #[test]
    fn test_manga_entries() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        touch(&root.join("Berserk/Vol 10/01.jpg"));
        touch(&root.join("Berserk/Vol 2/10.png"));
        touch(&root.join("Berserk/Vol 2/9.png"));
        touch(&root.join("Berserk/notes.txt"));
        touch(&root.join(".hidden/1.jpg"));

        let entries = collect_entries(MediaKind::Manga, root).unwrap();
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["Berserk", "Berserk/Vol 2", "Berserk/Vol 10"]);

        let series = by_path(&entries, "Berserk");
        assert_eq!(series.image_count, 0);
        assert_eq!(series.thumbnail.as_deref(), Some("Berserk/Vol 2/9.png"));

        let vol2 = by_path(&entries, "Berserk/Vol 2");
        assert_eq!(vol2.image_count, 2);
        assert_eq!(vol2.parent, "Berserk");
        assert_eq!(vol2.kind, EntryKind::Folder);
    }

    #[test]
    fn test_movie_entries() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        touch(&root.join("Ghibli/Totoro.mkv"));
        touch(&root.join("Ghibli/Totoro.jpg"));
        touch(&root.join("Ghibli/readme.txt"));
        touch(&root.join("Alien.mp4"));

        let entries = collect_entries(MediaKind::Movie, root).unwrap();
        assert_eq!(entries.len(), 3);

        let totoro = by_path(&entries, "Ghibli/Totoro.mkv");
        assert_eq!(totoro.kind, EntryKind::Video);
        assert_eq!(totoro.size_bytes, 1);
        assert_eq!(totoro.thumbnail.as_deref(), Some("Ghibli/Totoro.jpg"));

        let folder = by_path(&entries, "Ghibli");
        assert_eq!(folder.thumbnail.as_deref(), Some("Ghibli/Totoro.jpg"));

        assert!(by_path(&entries, "Alien.mp4").thumbnail.is_none());
    }

    #[test]
    fn test_music_entries() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        touch(&root.join("Album/01 Intro.flac"));
        touch(&root.join("Album/Cover.JPG"));

        let entries = collect_entries(MediaKind::Music, root).unwrap();
        let track = by_path(&entries, "Album/01 Intro.flac");
        assert_eq!(track.kind, EntryKind::Audio);
        assert_eq!(track.thumbnail.as_deref(), Some("Album/Cover.JPG"));
        assert_eq!(
            by_path(&entries, "Album").thumbnail.as_deref(),
            Some("Album/Cover.JPG")
        );
    }

    #[test]
    fn test_manga_skips_folders_without_images() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        touch(&root.join("Akira/cover.png"));
        touch(&root.join("Drafts/notes.txt"));
        fs::create_dir_all(root.join("Empty")).unwrap();
        fs::create_dir_all(root.join("Series/Vol 1")).unwrap();

        let entries = collect_entries(MediaKind::Manga, root).unwrap();
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        // A folder with only subfolders is kept, the leaf without images is not
        assert_eq!(paths, vec!["Akira", "Series"]);
    }

    #[test]
    fn test_flat_music_folder_uses_cover() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        touch(&root.join("01.mp3"));
        touch(&root.join("02.mp3"));
        touch(&root.join("folder.jpg"));

        let entries = collect_entries(MediaKind::Music, root).unwrap();
        assert_eq!(entries.len(), 2);
        for entry in &entries {
            assert_eq!(entry.thumbnail.as_deref(), Some("folder.jpg"));
        }
    }

    #[test]
    fn test_listings_read_once() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("Album");
        touch(&dir.join("a.mp3"));

        let mut listings = Listings::default();
        assert_eq!(listings.get(&dir).unwrap().files.len(), 1);

        // Served from memory after the directory is gone
        fs::remove_dir_all(&dir).unwrap();
        assert_eq!(listings.get(&dir).unwrap().files.len(), 1);
        assert!(listings.get(&temp.path().join("missing")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_entry_is_skipped() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        touch(&root.join("Good.mkv"));
        std::os::unix::fs::symlink(root.join("nowhere.mkv"), root.join("Broken.mkv")).unwrap();

        let entries = collect_entries(MediaKind::Movie, root).unwrap();
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["Good.mkv"]);
    }

    #[test]
    fn test_folder_images_natural_order() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        touch(&root.join("ch1/10.jpg"));
        touch(&root.join("ch1/2.jpg"));
        touch(&root.join("ch1/info.txt"));

        let images = folder_images(root, &root.join("ch1")).unwrap();
        assert_eq!(images, vec!["ch1/2.jpg", "ch1/10.jpg"]);
    }

    #[tokio::test]
    async fn test_scan_namespace_prunes_removed() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        touch(&root.join("Seinen/Monster/1.jpg"));
        touch(&root.join("Seinen/Pluto/1.jpg"));

        let pool = crate::db::memory_pool().await;
        let source = Source {
            key: "ROOT_A".into(),
            kind: MediaKind::Manga,
            path: root.to_path_buf(),
        };

        let first = scan_namespace(&pool, &source, "Seinen").await.unwrap();
        assert_eq!(first, ScanSummary { indexed: 2, pruned: 0 });
        assert!(entries::has_scan(&pool, "ROOT_A", "Seinen").await.unwrap());

        fs::remove_dir_all(root.join("Seinen/Pluto")).unwrap();
        let second = scan_namespace(&pool, &source, "Seinen").await.unwrap();
        assert_eq!(second, ScanSummary { indexed: 1, pruned: 1 });

        let missing = scan_namespace(&pool, &source, "Nope").await;
        assert!(matches!(missing, Err(LibraryError::NotFound(_))));
    }

    #[test]
    fn test_root_folders() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("Shonen")).unwrap();
        fs::create_dir_all(temp.path().join("Seinen")).unwrap();
        fs::create_dir_all(temp.path().join(".trash")).unwrap();
        let source = Source {
            key: "ROOT_A".into(),
            kind: MediaKind::Manga,
            path: temp.path().to_path_buf(),
        };
        assert_eq!(root_folders(&source).unwrap(), vec!["Seinen", "Shonen"]);
    }
}
