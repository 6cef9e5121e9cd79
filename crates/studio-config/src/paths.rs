//! File system paths for client-side state.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Manages file system paths for locally persisted client state.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for client files (~/.figura)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.figura`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(".figura"),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.figura).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.figura/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the preferences file path (~/.figura/preferences.json).
    pub fn preferences_file(&self) -> PathBuf {
        self.base_dir.join("preferences.json")
    }

    /// Ensure the base directory exists.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        Ok(())
    }
}
