//! JSON-file storage backend.

use crate::{LocalStorage, StorageError, StorageResult};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Storage backed by a single JSON file.
///
/// The full map is held in memory and flushed to disk on every write, so
/// reads never touch the file system after construction.
pub struct FileStorage {
    path: PathBuf,
    data: Mutex<HashMap<String, String>>,
}

impl FileStorage {
    /// Open (or create) the storage file at `path`.
    pub fn new(path: PathBuf) -> StorageResult<Self> {
        let data = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)
                .map_err(|err| StorageError::Encoding(format!("Corrupt storage file: {err}")))?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    fn flush(&self, data: &HashMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(data)
            .map_err(|err| StorageError::Encoding(err.to_string()))?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl LocalStorage for FileStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut data = self.data.lock().unwrap();
        data.insert(key.to_string(), value.to_string());
        self.flush(&data)
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.data.lock().unwrap().get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let mut data = self.data.lock().unwrap();
        let removed = data.remove(key).is_some();
        if removed {
            self.flush(&data)?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn persists_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        let storage = FileStorage::new(path.clone()).unwrap();
        storage.set("remember_me", "true").unwrap();

        let reopened = FileStorage::new(path).unwrap();
        assert_eq!(
            reopened.get("remember_me").unwrap(),
            Some("true".to_string())
        );
    }

    #[test]
    fn delete_removes_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        let storage = FileStorage::new(path.clone()).unwrap();
        storage.set("key", "value").unwrap();
        assert!(storage.delete("key").unwrap());

        let reopened = FileStorage::new(path).unwrap();
        assert_eq!(reopened.get("key").unwrap(), None);
    }

    #[test]
    fn corrupt_file_is_an_encoding_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "not json").unwrap();

        let result = FileStorage::new(path);
        assert!(matches!(result, Err(StorageError::Encoding(_))));
    }

    #[test]
    fn creates_parent_directories_on_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let storage = FileStorage::new(path.clone()).unwrap();
        storage.set("key", "value").unwrap();
        assert!(path.exists());
    }
}
