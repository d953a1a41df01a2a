use std::sync::Arc;

use crate::config::Config;
use crate::db::Database;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Database,
}

impl AppState {
    pub fn new(config: Config, db: Database) -> Self {
        AppState {
            config: Arc::new(config),
            db,
        }
    }
}
