//! Security-enforced route guard.
//!
//! A per-mount gate for protected content. The guard re-checks verification
//! through the same [`VerificationEnforcer`] the provider uses, an
//! intentional second line of defense against state races. The single shared
//! implementation keeps the two checks from drifting.

use crate::enforcer::VerificationEnforcer;
use crate::intents::{Navigator, Route};
use crate::provider::AuthSnapshot;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Outcome of a guard evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Render the protected children
    Allowed,
    /// Access denied; a navigation intent has been emitted
    Denied,
}

/// Third-party bot-mitigation widget. Initialization is best-effort and
/// advisory: it never gates rendering.
#[async_trait]
pub trait BotMitigation: Send + Sync {
    /// Initialize the widget; returns readiness.
    async fn initialize(&self) -> bool;
}

/// Bot mitigation that reports ready immediately.
#[derive(Debug, Default)]
pub struct NoopBotMitigation;

#[async_trait]
impl BotMitigation for NoopBotMitigation {
    async fn initialize(&self) -> bool {
        true
    }
}

/// Gate wrapping protected page content.
///
/// States: checking auth (waiting for the provider to settle), checking
/// verification, then allowed or denied.
pub struct RouteGuard {
    snapshots: watch::Receiver<AuthSnapshot>,
    enforcer: Arc<VerificationEnforcer>,
    navigator: Arc<dyn Navigator>,
    bot_mitigation: Option<Arc<dyn BotMitigation>>,
    bot_ready: Arc<AtomicBool>,
}

impl RouteGuard {
    pub fn new(
        snapshots: watch::Receiver<AuthSnapshot>,
        enforcer: Arc<VerificationEnforcer>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            snapshots,
            enforcer,
            navigator,
            bot_mitigation: None,
            bot_ready: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn with_bot_mitigation(mut self, bot_mitigation: Arc<dyn BotMitigation>) -> Self {
        self.bot_mitigation = Some(bot_mitigation);
        self
    }

    /// Advisory readiness of the bot-mitigation widget, surfaced as a
    /// passive indicator elsewhere in the UI.
    pub fn bot_shield_ready(&self) -> bool {
        self.bot_ready.load(Ordering::SeqCst)
    }

    /// Evaluate the gate for one mount.
    pub async fn evaluate(&mut self) -> GuardDecision {
        // Kick off the advisory widget in parallel.
        if let Some(bot_mitigation) = self.bot_mitigation.clone() {
            let bot_ready = self.bot_ready.clone();
            tokio::spawn(async move {
                if bot_mitigation.initialize().await {
                    bot_ready.store(true, Ordering::SeqCst);
                }
            });
        }

        // Checking auth: wait for the provider's loading to settle.
        let snapshot = match self.snapshots.wait_for(|s| !s.is_loading).await {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => {
                warn!("Auth state channel closed while guarding a route");
                self.navigator.navigate(Route::AuthEntry);
                return GuardDecision::Denied;
            }
        };

        let (Some(user), Some(session)) = (snapshot.user, snapshot.session) else {
            debug!("No authenticated user at mount; redirecting to auth entry");
            self.navigator.navigate(Route::AuthEntry);
            return GuardDecision::Denied;
        };

        // Checking verification: re-run the shared enforcement.
        let verdict = self.enforcer.enforce(&user, &session);
        if !verdict.allow_access {
            self.enforcer
                .force_sign_out_unverified(verdict.error.as_deref().unwrap_or("enforcement denied"))
                .await;
            self.navigator.navigate(Route::AuthEntry);
            return GuardDecision::Denied;
        }

        GuardDecision::Allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intents::RecordingNavigator;
    use chrono::{Duration, Utc};
    use studio_gateway::{
        AuthProviderKind, MemorySessionStore, NoopSecurityEventSink, Session, SignOutScope, User,
    };

    fn snapshot_for(user: Option<User>, session: Option<Session>) -> AuthSnapshot {
        AuthSnapshot {
            user,
            session,
            profile: None,
            is_loading: false,
            security_score: 0,
        }
    }

    fn make_user(confirmed: bool, provider: AuthProviderKind) -> User {
        User {
            id: "user-1".to_string(),
            email: "maker@example.com".to_string(),
            email_confirmed_at: confirmed.then(Utc::now),
            provider,
            created_at: Utc::now(),
        }
    }

    fn make_session(user: &User) -> Session {
        Session {
            access_token: "token".to_string(),
            refresh_token: None,
            expires_at: Utc::now() + Duration::hours(1),
            user: user.clone(),
        }
    }

    fn guard_with(
        snapshot: AuthSnapshot,
    ) -> (
        RouteGuard,
        Arc<RecordingNavigator>,
        Arc<MemorySessionStore>,
        watch::Sender<AuthSnapshot>,
    ) {
        let (tx, rx) = watch::channel(snapshot);
        let store = Arc::new(MemorySessionStore::new());
        let enforcer = Arc::new(VerificationEnforcer::new(
            store.clone(),
            Arc::new(NoopSecurityEventSink),
        ));
        let navigator = Arc::new(RecordingNavigator::new(Route::Other));
        let guard = RouteGuard::new(rx, enforcer, navigator.clone());
        (guard, navigator, store, tx)
    }

    #[tokio::test]
    async fn anonymous_mount_is_denied_with_redirect() {
        let (mut guard, navigator, _store, _tx) = guard_with(snapshot_for(None, None));

        assert_eq!(guard.evaluate().await, GuardDecision::Denied);
        assert_eq!(navigator.navigations(), vec![Route::AuthEntry]);
    }

    #[tokio::test]
    async fn confirmed_user_is_allowed() {
        let user = make_user(true, AuthProviderKind::Password);
        let session = make_session(&user);
        let (mut guard, navigator, store, _tx) =
            guard_with(snapshot_for(Some(user), Some(session)));

        assert_eq!(guard.evaluate().await, GuardDecision::Allowed);
        assert!(navigator.navigations().is_empty());
        assert!(store.sign_out_scopes().is_empty());
    }

    #[tokio::test]
    async fn unverified_user_is_signed_out_and_denied() {
        let user = make_user(false, AuthProviderKind::Password);
        let session = make_session(&user);
        let (mut guard, navigator, store, _tx) =
            guard_with(snapshot_for(Some(user), Some(session)));

        assert_eq!(guard.evaluate().await, GuardDecision::Denied);
        assert_eq!(store.sign_out_scopes(), vec![SignOutScope::Global]);
        assert_eq!(navigator.navigations(), vec![Route::AuthEntry]);
    }

    #[tokio::test]
    async fn unconfirmed_oauth_user_is_allowed() {
        let user = make_user(false, AuthProviderKind::Google);
        let session = make_session(&user);
        let (mut guard, _navigator, _store, _tx) =
            guard_with(snapshot_for(Some(user), Some(session)));

        assert_eq!(guard.evaluate().await, GuardDecision::Allowed);
    }

    #[tokio::test]
    async fn guard_waits_for_loading_to_settle() {
        let user = make_user(true, AuthProviderKind::Password);
        let session = make_session(&user);
        let (tx, rx) = watch::channel(AuthSnapshot {
            user: None,
            session: None,
            profile: None,
            is_loading: true,
            security_score: 0,
        });

        let store = Arc::new(MemorySessionStore::new());
        let enforcer = Arc::new(VerificationEnforcer::new(
            store.clone(),
            Arc::new(NoopSecurityEventSink),
        ));
        let navigator = Arc::new(RecordingNavigator::new(Route::Other));
        let mut guard = RouteGuard::new(rx, enforcer, navigator.clone());

        let settle = tokio::spawn(async move {
            tokio::task::yield_now().await;
            tx.send_modify(|snapshot| {
                snapshot.user = Some(user);
                snapshot.session = Some(session);
                snapshot.is_loading = false;
            });
            tx
        });

        assert_eq!(guard.evaluate().await, GuardDecision::Allowed);
        drop(settle.await.unwrap());
    }

    #[tokio::test]
    async fn bot_mitigation_never_gates_rendering() {
        struct SlowBot;

        #[async_trait]
        impl BotMitigation for SlowBot {
            async fn initialize(&self) -> bool {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                true
            }
        }

        let user = make_user(true, AuthProviderKind::Password);
        let session = make_session(&user);
        let (guard, _navigator, _store, _tx) = guard_with(snapshot_for(Some(user), Some(session)));
        let mut guard = guard.with_bot_mitigation(Arc::new(SlowBot));

        // Allowed immediately, before the widget reports ready.
        assert_eq!(guard.evaluate().await, GuardDecision::Allowed);
        assert!(!guard.bot_shield_ready());

        tokio::time::sleep(std::time::Duration::from_millis(80)).await;
        assert!(guard.bot_shield_ready());
    }
}
