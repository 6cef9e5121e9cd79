//! The Session Store interface consumed by the auth core.

use crate::error::GatewayResult;
use crate::events::SessionChange;
use crate::types::{Profile, Session, User};
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Scope of a sign-out request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutScope {
    /// Invalidate the session everywhere (all devices/tabs)
    Global,
    /// Invalidate only the local session
    Local,
}

/// OAuth identity providers the Session Store can hand off to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
}

/// Result of a sign-up call. The store may or may not hand back a live
/// session depending on its email-confirmation policy; callers decide
/// whether to accept it.
#[derive(Debug, Clone)]
pub struct SignUpData {
    pub user: User,
    pub session: Option<Session>,
}

/// Surface of the backend-as-a-service auth server.
///
/// Implementations own session persistence and the OAuth handshake; the auth
/// core only consumes this trait, so tests swap in an in-memory store.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The session the store currently holds, if any.
    async fn current_session(&self) -> GatewayResult<Option<Session>>;

    /// Subscribe to session-change notifications.
    fn subscribe(&self) -> broadcast::Receiver<SessionChange>;

    /// Password sign-in. Emits `SignedIn` on success.
    async fn sign_in_with_password(&self, email: &str, password: &str) -> GatewayResult<Session>;

    /// Create an account. `email_redirect_to` is embedded in the
    /// verification email.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        email_redirect_to: &str,
    ) -> GatewayResult<SignUpData>;

    /// Invalidate the session. Emits `SignedOut`.
    async fn sign_out(&self, scope: SignOutScope) -> GatewayResult<()>;

    /// Start the OAuth handshake; completion arrives later as a `SignedIn`
    /// notification.
    async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
    ) -> GatewayResult<()>;

    /// Re-send the verification email.
    async fn resend_verification_email(&self, email: &str) -> GatewayResult<()>;

    /// Send a password-reset email.
    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> GatewayResult<()>;

    /// Best-effort pre-flight check whether an account exists for the email.
    async fn account_exists(&self, email: &str) -> GatewayResult<bool>;

    /// Fetch the application profile for a user, if present.
    async fn fetch_profile(&self, user_id: &str) -> GatewayResult<Option<Profile>>;

    /// Create a profile with provisioning defaults.
    async fn create_profile(
        &self,
        user_id: &str,
        display_name: Option<&str>,
    ) -> GatewayResult<Profile>;
}
