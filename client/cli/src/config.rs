use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::reader::{DEFAULT_BATCH_SIZE, DEFAULT_PAGE_SIZE, DEFAULT_SWIPE_RADIUS};

pub const DEFAULT_SERVER_URL: &str = "http://localhost:3000";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub server_url: Option<String>,
    /// Images per reader page
    pub page_size: Option<usize>,
    /// Images loaded per scroll batch
    pub batch_size: Option<usize>,
    /// Slides kept around the current one in swipe mode
    pub swipe_radius: Option<usize>,
}

impl Config {
    fn project_dirs() -> anyhow::Result<ProjectDirs> {
        ProjectDirs::from("com", "kura", "kura")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
    }

    pub fn config_path() -> anyhow::Result<PathBuf> {
        let proj_dirs = Self::project_dirs()?;

        let config_dir = proj_dirs.config_dir();
        std::fs::create_dir_all(config_dir)?;

        Ok(config_dir.join("config.toml"))
    }

    /// Location of the local cache database
    pub fn cache_path() -> anyhow::Result<PathBuf> {
        let proj_dirs = Self::project_dirs()?;
        Ok(proj_dirs.cache_dir().join("cache.db"))
    }

    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    pub fn server_url(&self) -> &str {
        self.server_url.as_deref().unwrap_or(DEFAULT_SERVER_URL)
    }

    pub fn page_size(&self) -> usize {
        self.page_size.filter(|n| *n > 0).unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size.filter(|n| *n > 0).unwrap_or(DEFAULT_BATCH_SIZE)
    }

    pub fn swipe_radius(&self) -> usize {
        self.swipe_radius.unwrap_or(DEFAULT_SWIPE_RADIUS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server_url(), DEFAULT_SERVER_URL);
        assert_eq!(config.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(config.batch_size(), DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str("server_url = \"http://nas:3000\"\npage_size = 50\nbatch_size = 0\n").unwrap();
        assert_eq!(config.server_url(), "http://nas:3000");
        assert_eq!(config.page_size(), 50);
        // Zero falls back to the default
        assert_eq!(config.batch_size(), DEFAULT_BATCH_SIZE);
    }
}
