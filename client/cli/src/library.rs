//! Media kinds and cache namespaces as the client sees them.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Manga,
    Movie,
    Music,
}

impl MediaKind {
    /// Kind implied by a source key prefix: `ROOT_*`, `V_*` or `M_*`
    pub fn from_source_key(key: &str) -> Option<Self> {
        if key.starts_with("ROOT_") {
            Some(MediaKind::Manga)
        } else if key.starts_with("V_") {
            Some(MediaKind::Movie)
        } else if key.starts_with("M_") {
            Some(MediaKind::Music)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Manga => "manga",
            MediaKind::Movie => "movie",
            MediaKind::Music => "music",
        }
    }

    /// Path segment of the folder listing endpoint
    pub fn listing_endpoint(&self) -> &'static str {
        match self {
            MediaKind::Manga => "folder-cache",
            MediaKind::Movie => "movie-folder",
            MediaKind::Music => "music-folder",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One browsable library: a source, and for manga the chosen root folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub kind: MediaKind,
    pub source: String,
    pub root: String,
}

impl Namespace {
    /// Build a namespace from a source key, checking that manga sources
    /// come with a root folder.
    pub fn new(source: &str, root: Option<&str>) -> anyhow::Result<Self> {
        let kind = MediaKind::from_source_key(source).ok_or_else(|| {
            anyhow::anyhow!("unknown source key prefix: {} (expected ROOT_, V_ or M_)", source)
        })?;
        let root = match kind {
            MediaKind::Manga => {
                let root = root.unwrap_or("").trim_matches('/');
                if root.is_empty() {
                    anyhow::bail!("manga source {} needs --root (see: kura roots {})", source, source);
                }
                root.to_string()
            }
            // Movie and music libraries have no root folder
            MediaKind::Movie | MediaKind::Music => String::new(),
        };
        Ok(Self {
            kind,
            source: source.to_string(),
            root,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_key() {
        assert_eq!(MediaKind::from_source_key("ROOT_MANGA"), Some(MediaKind::Manga));
        assert_eq!(MediaKind::from_source_key("V_FILMS"), Some(MediaKind::Movie));
        assert_eq!(MediaKind::from_source_key("M_SONGS"), Some(MediaKind::Music));
        assert_eq!(MediaKind::from_source_key("X_OTHER"), None);
    }

    #[test]
    fn test_namespace_requires_manga_root() {
        assert!(Namespace::new("ROOT_MANGA", None).is_err());
        assert!(Namespace::new("NOPE", None).is_err());

        let ns = Namespace::new("ROOT_MANGA", Some("/Shelf/")).unwrap();
        assert_eq!(ns.root, "Shelf");

        let ns = Namespace::new("M_SONGS", Some("ignored")).unwrap();
        assert_eq!(ns.kind, MediaKind::Music);
        assert_eq!(ns.root, "");
    }
}
