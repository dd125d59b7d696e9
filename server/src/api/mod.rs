pub mod rest;

use crate::config::Config;
use crate::db::DbPool;
use crate::library::{ScanJobs, SourceRegistry};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    /// Content roots by source key
    pub sources: Arc<SourceRegistry>,
    /// Background library scans
    pub scans: ScanJobs,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Self {
        let sources = SourceRegistry::new(config.sources.clone());
        Self {
            db,
            config,
            sources: Arc::new(sources),
            scans: ScanJobs::default(),
        }
    }
}
