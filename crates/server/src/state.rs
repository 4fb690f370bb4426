//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::store::{DocStore, StoreError};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`; holds the configuration and the record
/// store.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    store: DocStore,
}

impl AppState {
    /// Create the application state, opening the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be created.
    pub fn new(config: ServerConfig) -> Result<Self, StoreError> {
        let store = DocStore::new(&config.data_dir)?;
        Ok(Self {
            inner: Arc::new(AppStateInner { config, store }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn store(&self) -> &DocStore {
        &self.inner.store
    }
}
