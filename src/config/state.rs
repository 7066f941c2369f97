// Application state module
// State shared by every request handler

use std::sync::atomic::AtomicBool;

use super::types::Config;
use crate::metrics::MetricsStore;

/// Application state
pub struct AppState {
    pub config: Config,
    pub metrics: MetricsStore,

    // Cached config values for fast access without locks
    pub cached_access_log: AtomicBool,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            metrics: MetricsStore::new(),
            cached_access_log: AtomicBool::new(config.logging.access_log),
        }
    }
}
