//! Process-wide memoized profile accessor.
//!
//! An explicit injectable object rather than a module-level global, so tests
//! can construct and reset their own instance. Written only by the provider;
//! read by any consumer. Cleared synchronously on sign-out so a prior user's
//! profile never leaks into a later render.

use std::collections::HashMap;
use std::sync::Mutex;
use studio_gateway::Profile;
use tracing::debug;

/// Memoized profile records keyed by user id.
#[derive(Default)]
pub struct ProfileCache {
    entries: Mutex<HashMap<String, Profile>>,
}

impl ProfileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached profile for a user, if present.
    pub fn get(&self, user_id: &str) -> Option<Profile> {
        self.entries.lock().unwrap().get(user_id).cloned()
    }

    /// Memoize a profile.
    pub fn put(&self, profile: Profile) {
        self.entries
            .lock()
            .unwrap()
            .insert(profile.user_id.clone(), profile);
    }

    /// Drop a single user's entry.
    pub fn invalidate(&self, user_id: &str) {
        debug!(user_id = %user_id, "Invalidating cached profile");
        self.entries.lock().unwrap().remove(user_id);
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}
