use crate::library::{MediaKind, Source};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub server_name: String,
    pub database_url: String,
    pub rest_port: u16,
    /// Pre-built frontend served for any path no API route claims
    pub static_dir: Option<String>,
    /// Origins allowed by CORS
    pub cors_origins: Vec<String>,
    pub sources: Vec<Source>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            server_name: std::env::var("SERVER_NAME")
                .unwrap_or_else(|_| "Kura".to_string()),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://./data/kura.db?mode=rwc".to_string()),
            rest_port: std::env::var("REST_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            static_dir: std::env::var("STATIC_DIR").ok().filter(|s| !s.trim().is_empty()),
            cors_origins: parse_origins(
                &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.to_string()),
            ),
            sources: sources_from_vars(std::env::vars()),
        })
    }
}

/// Development frontend origins used when `CORS_ORIGINS` is unset
pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,http://127.0.0.1:5173";

/// Split a comma-separated origin list, dropping blanks
pub fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Collect content roots from `ROOT_*`, `V_*` and `M_*` variables.
/// Variables with an empty value are ignored.
pub fn sources_from_vars<I>(vars: I) -> Vec<Source>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut sources: Vec<Source> = vars
        .into_iter()
        .filter_map(|(key, value)| {
            let kind = MediaKind::from_source_key(&key)?;
            let value = value.trim();
            if value.is_empty() {
                return None;
            }
            Some(Source {
                key,
                kind,
                path: PathBuf::from(value),
            })
        })
        .collect();
    sources.sort_by(|a, b| a.key.cmp(&b.key));
    sources
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sources_from_vars() {
        let vars = vec![
            ("V_FILMS".to_string(), "/srv/films".to_string()),
            ("ROOT_MANGA".to_string(), "/srv/manga".to_string()),
            ("M_EMPTY".to_string(), "  ".to_string()),
            ("PATH".to_string(), "/usr/bin".to_string()),
            ("M_SONGS".to_string(), "/srv/music".to_string()),
        ];
        let sources = sources_from_vars(vars);
        let keys: Vec<&str> = sources.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["M_SONGS", "ROOT_MANGA", "V_FILMS"]);
        assert_eq!(sources[0].kind, MediaKind::Music);
        assert_eq!(sources[1].kind, MediaKind::Manga);
        assert_eq!(sources[2].path, PathBuf::from("/srv/films"));
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins(" https://media.home , ,http://nas:8080"),
            vec!["https://media.home", "http://nas:8080"]
        );
        assert_eq!(parse_origins(DEFAULT_CORS_ORIGINS).len(), 2);
        assert!(parse_origins("").is_empty());
    }
}
