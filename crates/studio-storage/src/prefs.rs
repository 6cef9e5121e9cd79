//! High-level API for client preferences.

use crate::{LocalStorage, StorageKeys, StorageResult};
use serde::{Deserialize, Serialize};

/// Cached session metadata, written after successful sign-in so the Session
/// Store's persistence layer can pick the session back up on the next boot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    /// User ID from the Session Store
    pub user_id: String,
    /// User email
    #[serde(default)]
    pub email: Option<String>,
    /// When the access token expires (ISO timestamp)
    pub expires_at: String,
}

/// High-level API for storing and retrieving client preferences
pub struct PreferencesManager {
    storage: Box<dyn LocalStorage>,
}

impl PreferencesManager {
    /// Create a new preferences manager with the given storage backend
    pub fn new(storage: Box<dyn LocalStorage>) -> Self {
        Self { storage }
    }

    /// Store the advisory remember-me preference.
    pub fn set_remember_me(&self, remember: bool) -> StorageResult<()> {
        self.storage
            .set(StorageKeys::REMEMBER_ME, if remember { "true" } else { "false" })
    }

    /// Read the remember-me preference; absent means false.
    pub fn remember_me(&self) -> StorageResult<bool> {
        Ok(self
            .storage
            .get(StorageKeys::REMEMBER_ME)?
            .map(|value| value == "true")
            .unwrap_or(false))
    }

    /// Cache session metadata.
    pub fn set_session_meta(&self, meta: &SessionMeta) -> StorageResult<()> {
        let json = serde_json::to_string(meta)
            .map_err(|err| crate::StorageError::Encoding(err.to_string()))?;
        self.storage.set(StorageKeys::SESSION_META, &json)
    }

    /// Read cached session metadata, if any.
    pub fn session_meta(&self) -> StorageResult<Option<SessionMeta>> {
        match self.storage.get(StorageKeys::SESSION_META)? {
            Some(json) => {
                let meta = serde_json::from_str(&json)
                    .map_err(|err| crate::StorageError::Encoding(err.to_string()))?;
                Ok(Some(meta))
            }
            None => Ok(None),
        }
    }

    /// Drop cached session metadata. The remember-me preference survives
    /// sign-out; only session state is cleared.
    pub fn clear_session_meta(&self) -> StorageResult<()> {
        tracing::debug!("Clearing cached session metadata");
        self.storage.delete(StorageKeys::SESSION_META)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorage;

    fn manager() -> PreferencesManager {
        PreferencesManager::new(Box::new(MemoryStorage::new()))
    }

    #[test]
    fn remember_me_defaults_to_false() {
        let prefs = manager();
        assert!(!prefs.remember_me().unwrap());
    }

    #[test]
    fn remember_me_roundtrip() {
        let prefs = manager();

        prefs.set_remember_me(true).unwrap();
        assert!(prefs.remember_me().unwrap());

        prefs.set_remember_me(false).unwrap();
        assert!(!prefs.remember_me().unwrap());
    }

    #[test]
    fn session_meta_roundtrip() {
        let prefs = manager();

        prefs
            .set_session_meta(&SessionMeta {
                user_id: "user-123".to_string(),
                email: Some("maker@example.com".to_string()),
                expires_at: "2026-01-01T00:00:00Z".to_string(),
            })
            .unwrap();

        let meta = prefs.session_meta().unwrap().unwrap();
        assert_eq!(meta.user_id, "user-123");
        assert_eq!(meta.email.as_deref(), Some("maker@example.com"));
    }

    #[test]
    fn clear_session_meta_keeps_remember_me() {
        let prefs = manager();

        prefs.set_remember_me(true).unwrap();
        prefs
            .set_session_meta(&SessionMeta {
                user_id: "user-123".to_string(),
                email: None,
                expires_at: "2026-01-01T00:00:00Z".to_string(),
            })
            .unwrap();

        prefs.clear_session_meta().unwrap();
        assert!(prefs.session_meta().unwrap().is_none());
        assert!(prefs.remember_me().unwrap());
    }
}
