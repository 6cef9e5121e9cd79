//! Storage key constants.

/// Storage keys used by the client
pub struct StorageKeys;

impl StorageKeys {
    /// Advisory remember-me preference, read by the Session Store's own
    /// persistence layer
    pub const REMEMBER_ME: &'static str = "remember_me";

    /// Cached session metadata (JSON)
    pub const SESSION_META: &'static str = "session_meta";
}
