//! Local storage abstraction for the Figura Studio client.
//!
//! Backends:
//! - **File**: JSON file under the client base directory (default)
//! - **Memory**: in-process map, used by tests and ephemeral sessions

mod file;
mod keys;
mod memory;
mod prefs;
mod traits;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use prefs::{PreferencesManager, SessionMeta};
pub use traits::LocalStorage;

use std::path::PathBuf;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific storage error
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create the default file-backed storage at the given path.
pub fn create_storage(path: PathBuf) -> StorageResult<Box<dyn LocalStorage>> {
    Ok(Box::new(FileStorage::new(path)?))
}

/// Create a PreferencesManager backed by the default file storage.
pub fn create_preferences_manager(path: PathBuf) -> StorageResult<PreferencesManager> {
    let storage = create_storage(path)?;
    Ok(PreferencesManager::new(storage))
}
