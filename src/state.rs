//! Shared application state for request handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::status::StatusStore;

/// Shared application state, cloneable across handlers.
///
/// Handlers only ever read from the status store; the checker worker holds
/// the other clone and is its sole writer.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: StatusStore,
}

impl AppState {
    pub fn new(config: AppConfig, store: StatusStore) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }
}
