//! Constructors for the local file-based store

use crate::backend::LocalEventStore;
use crate::config::StoreConfig;
use crate::error::Result;

/// Create a new local store with default configuration
pub fn create_local_store(data_dir: impl Into<std::path::PathBuf>) -> Result<LocalEventStore> {
    LocalEventStore::with_default_config(data_dir)
}

/// Create a new local store with custom configuration
pub fn create_local_store_with_config(config: StoreConfig) -> Result<LocalEventStore> {
    LocalEventStore::new(config)
}
