//! Email-verification enforcement.
//!
//! The single enforcement call-site shared by the provider (on every session
//! transition) and the route guard (on every mount), so the two
//! defense-in-depth checks cannot drift.

use std::sync::Arc;
use studio_gateway::{
    SecurityEvent, SecurityEventSink, Session, SessionStore, SignOutScope, User,
};
use tracing::warn;

/// Decision produced by [`VerificationEnforcer::enforce`]. Never stored;
/// consumed immediately by the caller.
#[derive(Debug, Clone)]
pub struct EnforcementResult {
    pub allow_access: bool,
    pub error: Option<String>,
}

impl EnforcementResult {
    fn allowed() -> Self {
        Self {
            allow_access: true,
            error: None,
        }
    }

    fn denied(error: &str) -> Self {
        Self {
            allow_access: false,
            error: Some(error.to_string()),
        }
    }
}

/// Decides whether a `(user, session)` pair may access protected content,
/// and forces a global sign-out when it may not.
pub struct VerificationEnforcer {
    store: Arc<dyn SessionStore>,
    audit: Arc<dyn SecurityEventSink>,
}

impl VerificationEnforcer {
    pub fn new(store: Arc<dyn SessionStore>, audit: Arc<dyn SecurityEventSink>) -> Self {
        Self { store, audit }
    }

    /// Pure access decision. Denies only an unconfirmed email on a
    /// non-OAuth account; OAuth accounts are pre-verified by the identity
    /// provider.
    pub fn enforce(&self, user: &User, _session: &Session) -> EnforcementResult {
        if !user.is_email_confirmed() && !user.provider.is_oauth() {
            return EnforcementResult::denied("Email verification required");
        }
        EnforcementResult::allowed()
    }

    /// Invalidate the session everywhere. Always called together with a
    /// denial, never independently.
    pub async fn force_sign_out_unverified(&self, reason: &str) {
        warn!(reason = %reason, "Forcing sign-out of unverified session");
        self.audit
            .record(SecurityEvent::new("forced_sign_out", reason, true));
        if let Err(err) = self.store.sign_out(SignOutScope::Global).await {
            warn!("Forced sign-out failed at the Session Store: {err}");
        }
    }
}
