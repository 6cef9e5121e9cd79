//! The auth provider: owns process-wide authentication state.
//!
//! The provider is the single writer of an [`AuthSnapshot`] published on a
//! watch channel; everything else holds read-only projections. Session-change
//! notifications from the Session Store are re-validated through the
//! [`VerificationEnforcer`] on every transition, because a session can become
//! invalid between checks. A pair that fails enforcement is never exposed:
//! it is cleared and a global sign-out is issued first.

use crate::bus::{AuthBroadcast, AuthBus};
use crate::enforcer::VerificationEnforcer;
use crate::intents::{Navigator, NoopNavigator, NoopNotifier, Notice, NoticeLevel, Notifier, Route};
use crate::messages::friendly_message;
use crate::profile_cache::ProfileCache;
use crate::score::security_score;
use crate::validate::{normalize_email, valid_email, validate_password};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use studio_config::Config;
use studio_gateway::{
    GatewayError, NoopRateLimitProbe, NoopSecurityEventSink, OAuthProvider, Profile,
    RateLimitAction, RateLimitDecision, RateLimitProbe, SecurityEvent, SecurityEventSink, Session,
    SessionEvent, SessionStore, SignOutScope, User,
};
use studio_storage::PreferencesManager;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Read-only view of the provider's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSnapshot {
    pub user: Option<User>,
    pub session: Option<Session>,
    pub profile: Option<Profile>,
    pub is_loading: bool,
    pub security_score: u8,
}

impl AuthSnapshot {
    fn booting() -> Self {
        Self {
            user: None,
            session: None,
            profile: None,
            is_loading: true,
            security_score: 0,
        }
    }

    /// True when a user and session are exposed.
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.session.is_some()
    }
}

/// Result of a sign-up attempt.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    /// Displayable error, None on success (including the gated
    /// verification-required path)
    pub error: Option<String>,
    /// The email already has an account; show the sign-in-instead flow
    pub account_exists: bool,
    /// The created user record, when the store produced one
    pub user: Option<User>,
}

impl SignUpOutcome {
    fn failed(error: String) -> Self {
        Self {
            error: Some(error),
            account_exists: false,
            user: None,
        }
    }

    fn existing_account() -> Self {
        Self {
            error: None,
            account_exists: true,
            user: None,
        }
    }
}

/// Result of a sign-in attempt.
#[derive(Debug, Clone)]
pub struct SignInOutcome {
    pub error: Option<String>,
}

/// Result of a validated pass-through operation (resend/reset).
#[derive(Debug, Clone)]
pub struct OpOutcome {
    pub error: Option<String>,
}

/// Orchestrates sign-in/sign-up/sign-out/OAuth/password-reset and exposes
/// the current auth state.
pub struct AuthProvider {
    store: Arc<dyn SessionStore>,
    preferences: Arc<PreferencesManager>,
    config: Config,
    rate_limit: Arc<dyn RateLimitProbe>,
    audit: Arc<dyn SecurityEventSink>,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
    profile_cache: Arc<ProfileCache>,
    enforcer: Arc<VerificationEnforcer>,
    bus: AuthBus,
    snapshot_tx: watch::Sender<AuthSnapshot>,
    /// One-shot guard preventing a double OAuth redirect when
    /// `InitialSession` and `SignedIn` arrive for the same completion.
    has_redirected: AtomicBool,
    /// Set once the provider is shut down; no state is written after it.
    closed: AtomicBool,
}

impl AuthProvider {
    pub fn new(
        store: Arc<dyn SessionStore>,
        preferences: Arc<PreferencesManager>,
        config: Config,
    ) -> Self {
        let audit: Arc<dyn SecurityEventSink> = Arc::new(NoopSecurityEventSink);
        let (snapshot_tx, _) = watch::channel(AuthSnapshot::booting());
        Self {
            enforcer: Arc::new(VerificationEnforcer::new(store.clone(), audit.clone())),
            store,
            preferences,
            config,
            rate_limit: Arc::new(NoopRateLimitProbe),
            audit,
            navigator: Arc::new(NoopNavigator),
            notifier: Arc::new(NoopNotifier),
            profile_cache: Arc::new(ProfileCache::new()),
            bus: AuthBus::new(),
            snapshot_tx,
            has_redirected: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_rate_limit_probe(mut self, probe: Arc<dyn RateLimitProbe>) -> Self {
        self.rate_limit = probe;
        self
    }

    #[must_use]
    pub fn with_security_events(mut self, audit: Arc<dyn SecurityEventSink>) -> Self {
        self.enforcer = Arc::new(VerificationEnforcer::new(self.store.clone(), audit.clone()));
        self.audit = audit;
        self
    }

    #[must_use]
    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn with_profile_cache(mut self, profile_cache: Arc<ProfileCache>) -> Self {
        self.profile_cache = profile_cache;
        self
    }

    /// Current state snapshot.
    pub fn snapshot(&self) -> AuthSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Subscribe to state snapshots.
    pub fn subscribe_snapshot(&self) -> watch::Receiver<AuthSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Subscribe to provider broadcasts (e.g. subscription refresh).
    pub fn subscribe_broadcasts(&self) -> broadcast::Receiver<AuthBroadcast> {
        self.bus.subscribe()
    }

    /// The shared enforcement call-site, also used by the route guard.
    pub fn enforcer(&self) -> Arc<VerificationEnforcer> {
        self.enforcer.clone()
    }

    pub(crate) fn navigator(&self) -> Arc<dyn Navigator> {
        self.navigator.clone()
    }

    /// Build a route guard sharing this provider's state, enforcement, and
    /// navigator.
    pub fn route_guard(&self) -> crate::guard::RouteGuard {
        crate::guard::RouteGuard::new(self.subscribe_snapshot(), self.enforcer(), self.navigator())
    }

    /// Stop writing state. Every deferred continuation checks this flag, so
    /// nothing lands after shutdown.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Subscribe to the Session Store and process notifications until the
    /// channel closes or the provider shuts down. The store's restored
    /// session is handled first as the initial transition.
    pub fn spawn_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let provider = Arc::clone(self);
        tokio::spawn(async move {
            let mut receiver = provider.store.subscribe();

            match provider.store.current_session().await {
                Ok(session) => {
                    provider
                        .handle_change(SessionEvent::InitialSession, session)
                        .await;
                }
                Err(err) => {
                    warn!("Failed to read initial session: {err}");
                    provider.settle_anonymous();
                }
            }

            loop {
                if provider.is_closed() {
                    break;
                }
                match receiver.recv().await {
                    Ok(change) => {
                        if provider.is_closed() {
                            break;
                        }
                        provider.handle_change(change.event, change.session).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Session event receiver lagged; continuing");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Process one session-change notification. Safe to re-run: enforcement
    /// is a pure decision and profile provisioning checks existence first.
    pub async fn handle_change(&self, event: SessionEvent, session: Option<Session>) {
        debug!(?event, has_session = session.is_some(), "Handling session change");
        match event {
            SessionEvent::SignedOut => self.clear_to_anonymous(),
            SessionEvent::InitialSession
            | SessionEvent::SignedIn
            | SessionEvent::TokenRefreshed => match session {
                Some(session) => self.accept_session(session).await,
                None => self.settle_anonymous(),
            },
        }
    }

    /// Re-pull the current session and re-run the full enforcement and
    /// profile-load sequence. Used after external events (e.g. payment
    /// completion) that may have changed verification or plan state.
    pub async fn refresh_auth(&self) {
        self.snapshot_tx.send_modify(|snapshot| {
            snapshot.is_loading = true;
        });
        match self.store.current_session().await {
            Ok(Some(session)) => self.accept_session(session).await,
            Ok(None) => self.settle_anonymous(),
            Err(err) => {
                warn!("Failed to refresh auth state: {err}");
                self.snapshot_tx.send_modify(|snapshot| {
                    snapshot.is_loading = false;
                });
            }
        }
    }

    /// Validate, enforce, and expose a session.
    async fn accept_session(&self, session: Session) {
        let verdict = self.enforcer.enforce(&session.user, &session);
        if !verdict.allow_access {
            self.enforcer
                .force_sign_out_unverified(verdict.error.as_deref().unwrap_or("enforcement denied"))
                .await;
            self.clear_to_anonymous();
            // Hard redirect so no protected UI is painted with stale state.
            if self.navigator.current_route() != Route::AuthEntry {
                self.navigator.navigate(Route::AuthEntry);
            }
            return;
        }

        let user = session.user.clone();
        self.snapshot_tx.send_modify(|snapshot| {
            snapshot.security_score = security_score(Some(&user), Some(&session));
            snapshot.user = Some(user.clone());
            snapshot.session = Some(session.clone());
            snapshot.is_loading = false;
        });

        // Defer the profile load one scheduler turn so the notification
        // delivery has fully settled before more state lands.
        tokio::task::yield_now().await;
        if self.is_closed() {
            return;
        }

        if let Some(profile) = self.load_or_provision_profile(&user).await {
            if self.is_closed() {
                return;
            }
            self.snapshot_tx.send_modify(|snapshot| {
                snapshot.profile = Some(profile);
            });
            self.bus.emit(AuthBroadcast::SubscriptionRefresh);
        }

        // One-time landing redirect after OAuth completion; password
        // sign-in callers navigate themselves.
        if user.provider.is_oauth()
            && self.navigator.current_route() == Route::AuthEntry
            && !self.has_redirected.swap(true, Ordering::SeqCst)
        {
            info!(user_id = %user.id, "Redirecting OAuth completion to the studio");
            self.navigator.navigate(Route::Landing);
        }
    }

    /// Load the user's profile, provisioning it on first sign-in.
    async fn load_or_provision_profile(&self, user: &User) -> Option<Profile> {
        if let Some(profile) = self.profile_cache.get(&user.id) {
            return Some(profile);
        }

        match self.store.fetch_profile(&user.id).await {
            Ok(Some(profile)) => {
                self.profile_cache.put(profile.clone());
                Some(profile)
            }
            Ok(None) => {
                let display_name = user.email.split('@').next();
                match self.store.create_profile(&user.id, display_name).await {
                    Ok(profile) => {
                        info!(user_id = %user.id, "Provisioned profile on first sign-in");
                        self.profile_cache.put(profile.clone());
                        Some(profile)
                    }
                    Err(err) => {
                        warn!("Failed to provision profile: {err}");
                        None
                    }
                }
            }
            Err(err) => {
                warn!("Failed to load profile: {err}");
                None
            }
        }
    }

    /// Settle into the anonymous state without touching caches.
    fn settle_anonymous(&self) {
        self.snapshot_tx.send_modify(|snapshot| {
            snapshot.user = None;
            snapshot.session = None;
            snapshot.profile = None;
            snapshot.security_score = 0;
            snapshot.is_loading = false;
        });
    }

    /// Full local reset: exposed state, profile cache, and the one-shot
    /// redirect guard. The cache clear is synchronous so a prior user's
    /// profile cannot leak into the next render.
    fn clear_to_anonymous(&self) {
        self.profile_cache.clear();
        self.has_redirected.store(false, Ordering::SeqCst);
        self.settle_anonymous();
    }

    /// Create an account.
    ///
    /// A store that hands back a live session for an unverified non-OAuth
    /// account is overridden: the session is never accepted, a global
    /// sign-out is issued, and the caller sees a verification-required
    /// success state.
    pub async fn sign_up(&self, email: &str, password: &str) -> SignUpOutcome {
        let email = normalize_email(email);
        if !valid_email(&email) {
            return SignUpOutcome::failed("Please enter a valid email address.".to_string());
        }
        if let Err(message) = validate_password(password) {
            return SignUpOutcome::failed(message);
        }

        if self.rate_limit.check(&email, RateLimitAction::SignUp).await
            == RateLimitDecision::Limited
        {
            self.audit
                .record(SecurityEvent::new("sign_up_rate_limited", &email, false));
            return SignUpOutcome::failed(
                "Too many attempts. Please wait a moment and try again.".to_string(),
            );
        }

        // Pre-flight duplicate check avoids ambiguous errors from the store.
        match self.store.account_exists(&email).await {
            Ok(true) => {
                self.audit
                    .record(SecurityEvent::new("sign_up_duplicate", &email, false));
                return SignUpOutcome::existing_account();
            }
            Ok(false) => {}
            Err(err) => {
                // Best-effort probe; an unavailable check never blocks.
                warn!("Existing-account pre-flight unavailable: {err}");
            }
        }

        let redirect = self.config.auth_redirect_url();
        match self.store.sign_up(&email, password, &redirect).await {
            Ok(data) => {
                if let Some(session) = &data.session {
                    let verdict = self.enforcer.enforce(&data.user, session);
                    if !verdict.allow_access {
                        // The store's "sign up = signed in" default is
                        // downgraded to "sign up = must verify".
                        self.enforcer
                            .force_sign_out_unverified("session issued before email verification")
                            .await;
                        self.clear_to_anonymous();
                        self.notifier.notify(Notice::new(
                            NoticeLevel::Info,
                            "Check your email to verify your account.",
                        ));
                        self.audit.record(SecurityEvent::new(
                            "sign_up_requires_verification",
                            &email,
                            true,
                        ));
                        return SignUpOutcome {
                            error: None,
                            account_exists: false,
                            user: Some(data.user),
                        };
                    }
                } else {
                    self.notifier.notify(Notice::new(
                        NoticeLevel::Info,
                        "Check your email to verify your account.",
                    ));
                }

                self.audit
                    .record(SecurityEvent::new("sign_up_success", &email, true));
                SignUpOutcome {
                    error: None,
                    account_exists: false,
                    user: Some(data.user),
                }
            }
            Err(GatewayError::AccountExists) => {
                self.audit
                    .record(SecurityEvent::new("sign_up_duplicate", &email, false));
                SignUpOutcome::existing_account()
            }
            Err(err) => {
                self.audit
                    .record(SecurityEvent::new("sign_up_failed", &email, false));
                SignUpOutcome::failed(friendly_message(&err))
            }
        }
    }

    /// Password sign-in. Navigation after success is the caller's
    /// responsibility; the provider only exposes the validated state.
    pub async fn sign_in(&self, email: &str, password: &str, remember_me: bool) -> SignInOutcome {
        let email = normalize_email(email);
        if !valid_email(&email) {
            return SignInOutcome {
                error: Some("Please enter a valid email address.".to_string()),
            };
        }
        if let Err(message) = validate_password(password) {
            return SignInOutcome {
                error: Some(message),
            };
        }

        if self.rate_limit.check(&email, RateLimitAction::SignIn).await
            == RateLimitDecision::Limited
        {
            self.audit
                .record(SecurityEvent::new("sign_in_rate_limited", &email, false));
            return SignInOutcome {
                error: Some("Too many attempts. Please wait a moment and try again.".to_string()),
            };
        }

        // Advisory preference, read by the store's persistence layer.
        if let Err(err) = self.preferences.set_remember_me(remember_me) {
            warn!("Failed to persist remember-me preference: {err}");
        }

        match self.store.sign_in_with_password(&email, password).await {
            Ok(_session) => {
                self.audit
                    .record(SecurityEvent::new("sign_in_success", &email, true));
                SignInOutcome { error: None }
            }
            Err(err) => {
                self.audit
                    .record(SecurityEvent::new("sign_in_failed", &email, false));
                SignInOutcome {
                    error: Some(friendly_message(&err)),
                }
            }
        }
    }

    /// Clear local state, invalidate the session everywhere, and direct the
    /// shell back to the auth entry route.
    pub async fn sign_out(&self) {
        self.clear_to_anonymous();
        if let Err(err) = self.store.sign_out(SignOutScope::Global).await {
            warn!("Sign-out failed at the Session Store: {err}");
        }
        self.audit
            .record(SecurityEvent::new("sign_out", "", true));
        self.navigator.navigate(Route::AuthEntry);
    }

    /// Start the Google OAuth handshake. Fire-and-forget from the caller's
    /// perspective: completion arrives later as a `SignedIn` notification,
    /// and errors surface through the notifier.
    pub async fn sign_in_with_google(&self) {
        let redirect = self.config.auth_redirect_url();
        if let Err(err) = self
            .store
            .sign_in_with_oauth(OAuthProvider::Google, &redirect)
            .await
        {
            warn!("OAuth handshake failed to start: {err}");
            self.notifier
                .notify(Notice::new(NoticeLevel::Error, &friendly_message(&err)));
        }
    }

    /// Re-send the verification email.
    pub async fn resend_verification_email(&self, email: &str) -> OpOutcome {
        let email = normalize_email(email);
        if !valid_email(&email) {
            return OpOutcome {
                error: Some("Please enter a valid email address.".to_string()),
            };
        }

        match self.store.resend_verification_email(&email).await {
            Ok(()) => {
                self.audit
                    .record(SecurityEvent::new("verification_email_resent", &email, true));
                OpOutcome { error: None }
            }
            Err(err) => {
                self.audit
                    .record(SecurityEvent::new("verification_email_resend_failed", &email, false));
                OpOutcome {
                    error: Some(friendly_message(&err)),
                }
            }
        }
    }

    /// Send a password-reset email.
    pub async fn reset_password(&self, email: &str) -> OpOutcome {
        let email = normalize_email(email);
        if !valid_email(&email) {
            return OpOutcome {
                error: Some("Please enter a valid email address.".to_string()),
            };
        }

        let redirect = self.config.auth_redirect_url();
        match self.store.reset_password_for_email(&email, &redirect).await {
            Ok(()) => {
                self.audit
                    .record(SecurityEvent::new("password_reset_requested", &email, true));
                OpOutcome { error: None }
            }
            Err(err) => {
                self.audit
                    .record(SecurityEvent::new("password_reset_failed", &email, false));
                OpOutcome {
                    error: Some(friendly_message(&err)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intents::{RecordingNavigator, RecordingNotifier};
    use async_trait::async_trait;
    use std::time::Duration;
    use studio_gateway::{MemorySecurityEventSink, MemorySessionStore};
    use studio_storage::MemoryStorage;
    use tokio::time::timeout;

    struct AlwaysLimitedProbe;

    #[async_trait]
    impl RateLimitProbe for AlwaysLimitedProbe {
        async fn check(&self, _email: &str, _action: RateLimitAction) -> RateLimitDecision {
            RateLimitDecision::Limited
        }
    }

    struct Harness {
        store: Arc<MemorySessionStore>,
        provider: Arc<AuthProvider>,
        navigator: Arc<RecordingNavigator>,
        notifier: Arc<RecordingNotifier>,
        audit: Arc<MemorySecurityEventSink>,
        preferences: Arc<PreferencesManager>,
    }

    fn harness() -> Harness {
        harness_on_route(Route::AuthEntry)
    }

    fn harness_on_route(route: Route) -> Harness {
        let store = Arc::new(MemorySessionStore::new());
        let navigator = Arc::new(RecordingNavigator::new(route));
        let notifier = Arc::new(RecordingNotifier::new());
        let audit = Arc::new(MemorySecurityEventSink::new());
        let preferences = Arc::new(PreferencesManager::new(Box::new(MemoryStorage::new())));

        let session_store: Arc<dyn SessionStore> = store.clone();
        let provider = Arc::new(
            AuthProvider::new(session_store, preferences.clone(), Config::default())
            .with_security_events(audit.clone())
            .with_navigator(navigator.clone())
            .with_notifier(notifier.clone()),
        );

        Harness {
            store,
            provider,
            navigator,
            notifier,
            audit,
            preferences,
        }
    }

    async fn wait_until(
        receiver: &mut watch::Receiver<AuthSnapshot>,
        predicate: impl FnMut(&AuthSnapshot) -> bool,
    ) -> AuthSnapshot {
        timeout(Duration::from_secs(1), receiver.wait_for(predicate))
            .await
            .expect("timed out waiting for snapshot")
            .expect("snapshot channel closed")
            .clone()
    }

    #[tokio::test]
    async fn sign_up_invalid_email_fails_fast() {
        let h = harness();
        let outcome = h.provider.sign_up("not-an-email", "figurine123").await;

        assert!(outcome.error.is_some());
        assert!(!outcome.account_exists);
        // No network call was made: nothing was created at the store.
        assert!(!h.store.account_exists("not-an-email").await.unwrap());
    }

    #[tokio::test]
    async fn sign_up_short_password_fails_fast() {
        let h = harness();
        let outcome = h.provider.sign_up("maker@example.com", "abc").await;
        assert!(outcome.error.unwrap().contains("at least 6"));
    }

    #[tokio::test]
    async fn sign_up_rate_limited_blocks() {
        let h = harness();
        let session_store: Arc<dyn SessionStore> = h.store.clone();
        let provider = AuthProvider::new(session_store, h.preferences.clone(), Config::default())
            .with_rate_limit_probe(Arc::new(AlwaysLimitedProbe));

        let outcome = provider.sign_up("maker@example.com", "figurine123").await;
        assert!(outcome.error.unwrap().contains("Too many attempts"));
    }

    #[tokio::test]
    async fn sign_up_existing_account_preflight() {
        let h = harness();
        h.store.seed_account("maker@example.com", "figurine123", true);

        let outcome = h.provider.sign_up("maker@example.com", "other1").await;
        assert!(outcome.account_exists);
        assert!(outcome.error.is_none());
        assert!(outcome.user.is_none());
        // Never a session alongside accountExists.
        assert!(h.provider.snapshot().session.is_none());
    }

    #[tokio::test]
    async fn sign_up_existing_account_postflight() {
        let h = harness();
        h.store.seed_account("maker@example.com", "figurine123", true);
        // Pre-flight unavailable: the attempt proceeds and the store's own
        // duplicate answer is mapped to the same outcome.
        h.store.set_account_exists_unavailable(true);

        let outcome = h.provider.sign_up("maker@example.com", "other1").await;
        assert!(outcome.account_exists);
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn sign_up_unverified_session_is_never_accepted() {
        let h = harness();

        let outcome = h.provider.sign_up("new@x.com", "abc123").await;

        // Success-shaped outcome with the verification gate applied.
        assert!(outcome.error.is_none());
        assert!(!outcome.account_exists);
        assert_eq!(outcome.user.unwrap().email, "new@x.com");

        // The store's session was rejected: forced global sign-out, nothing
        // exposed.
        assert_eq!(h.store.sign_out_scopes(), vec![SignOutScope::Global]);
        let snapshot = h.provider.snapshot();
        assert!(snapshot.user.is_none());
        assert!(snapshot.session.is_none());

        // Verification-required toast.
        let notices = h.notifier.notices();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].message.contains("Check your email"));
    }

    #[tokio::test]
    async fn sign_up_without_session_shows_verification_notice() {
        let h = harness();
        h.store.set_issue_session_on_sign_up(false);

        let outcome = h.provider.sign_up("new@x.com", "abc123").await;
        assert!(outcome.error.is_none());
        assert!(h.store.sign_out_scopes().is_empty());
        assert!(h
            .notifier
            .notices()
            .iter()
            .any(|notice| notice.message.contains("Check your email")));
    }

    #[tokio::test]
    async fn sign_in_wrong_password_maps_friendly_error() {
        let h = harness();
        h.store.seed_account("bad@x.com", "correct1", true);

        let outcome = h.provider.sign_in("bad@x.com", "wrong1", false).await;
        assert_eq!(outcome.error.as_deref(), Some("Incorrect email or password."));
        assert!(h.provider.snapshot().session.is_none());

        let failures: Vec<_> = h
            .audit
            .events()
            .into_iter()
            .filter(|event| event.event_type == "sign_in_failed")
            .collect();
        assert_eq!(failures.len(), 1);
    }

    #[tokio::test]
    async fn sign_in_persists_remember_me() -> anyhow::Result<()> {
        let h = harness();
        h.store.seed_account("maker@example.com", "figurine123", true);

        let outcome = h
            .provider
            .sign_in("maker@example.com", "figurine123", true)
            .await;
        assert!(outcome.error.is_none());
        assert!(h.preferences.remember_me()?);

        let successes: Vec<_> = h
            .audit
            .events()
            .into_iter()
            .filter(|event| event.event_type == "sign_in_success")
            .collect();
        assert_eq!(successes.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn listener_enforces_on_signed_in_notification() {
        let h = harness_on_route(Route::Other);
        let mut snapshots = h.provider.subscribe_snapshot();
        h.provider.spawn_listener();
        wait_until(&mut snapshots, |s| !s.is_loading).await;

        // An unverified password session arriving from the store must be
        // rejected even though the store considers it valid.
        let user = h.store.seed_account("maker@example.com", "figurine123", false);
        let session = h.store.issue_session(&user);
        h.store.emit(SessionEvent::SignedIn, Some(session));

        timeout(Duration::from_secs(1), async {
            while h.store.sign_out_scopes().is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("no forced sign-out observed");

        let snapshot = h.provider.snapshot();
        assert!(snapshot.user.is_none());
        assert!(snapshot.session.is_none());
        assert_eq!(h.navigator.navigations(), vec![Route::AuthEntry]);
        h.provider.shutdown();
    }

    #[tokio::test]
    async fn oauth_completion_navigates_exactly_once() {
        let h = harness(); // current route: AuthEntry
        let mut snapshots = h.provider.subscribe_snapshot();
        h.provider.spawn_listener();
        wait_until(&mut snapshots, |s| !s.is_loading).await;

        let user = h.store.seed_oauth_account("maker@example.com", true);
        let session = h.store.issue_session(&user);

        // Both notifications arrive for the same completion.
        h.store
            .emit(SessionEvent::InitialSession, Some(session.clone()));
        h.store.emit(SessionEvent::SignedIn, Some(session));

        let snapshot = wait_until(&mut snapshots, |s| s.profile.is_some()).await;
        assert!(snapshot.is_authenticated());

        timeout(Duration::from_secs(1), async {
            while h.navigator.navigations().is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("no navigation observed");
        // Give the second notification time to (incorrectly) navigate again.
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(h.navigator.navigations(), vec![Route::Landing]);
        h.provider.shutdown();
    }

    #[tokio::test]
    async fn password_sign_in_does_not_navigate() {
        let h = harness(); // current route: AuthEntry
        let mut snapshots = h.provider.subscribe_snapshot();
        h.provider.spawn_listener();
        wait_until(&mut snapshots, |s| !s.is_loading).await;

        h.store.seed_account("maker@example.com", "figurine123", true);
        h.provider
            .sign_in("maker@example.com", "figurine123", false)
            .await;

        let snapshot = wait_until(&mut snapshots, |s| s.is_authenticated()).await;
        assert_eq!(snapshot.security_score, 80);
        assert!(h.navigator.navigations().is_empty());
        h.provider.shutdown();
    }

    #[tokio::test]
    async fn profile_is_provisioned_and_broadcast() {
        let h = harness_on_route(Route::Other);
        let mut snapshots = h.provider.subscribe_snapshot();
        let mut broadcasts = h.provider.subscribe_broadcasts();
        h.provider.spawn_listener();
        wait_until(&mut snapshots, |s| !s.is_loading).await;

        let user = h.store.seed_account("maker@example.com", "figurine123", true);
        let session = h.store.issue_session(&user);
        h.store.emit(SessionEvent::SignedIn, Some(session));

        let snapshot = wait_until(&mut snapshots, |s| s.profile.is_some()).await;
        let profile = snapshot.profile.unwrap();
        assert_eq!(profile.display_name.as_deref(), Some("maker"));
        assert!(!profile.onboarding_complete);

        let broadcast = timeout(Duration::from_secs(1), broadcasts.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(broadcast, AuthBroadcast::SubscriptionRefresh);
        h.provider.shutdown();
    }

    #[tokio::test]
    async fn refresh_auth_is_idempotent() {
        let h = harness_on_route(Route::Other);
        let user = h.store.seed_account("maker@example.com", "figurine123", true);
        let session = h.store.issue_session(&user);
        h.store.emit(SessionEvent::SignedIn, Some(session));

        h.provider.refresh_auth().await;
        let first = h.provider.snapshot();

        h.provider.refresh_auth().await;
        let second = h.provider.snapshot();

        assert!(first.is_authenticated());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn sign_out_clears_everything() {
        let h = harness_on_route(Route::Other);
        let user = h.store.seed_account("maker@example.com", "figurine123", true);
        let session = h.store.issue_session(&user);
        h.store.emit(SessionEvent::SignedIn, Some(session));
        h.provider.refresh_auth().await;
        assert!(h.provider.snapshot().is_authenticated());

        h.provider.sign_out().await;

        let snapshot = h.provider.snapshot();
        assert!(snapshot.user.is_none());
        assert!(snapshot.profile.is_none());
        assert_eq!(snapshot.security_score, 0);
        assert_eq!(h.store.sign_out_scopes(), vec![SignOutScope::Global]);
        assert_eq!(h.navigator.navigations(), vec![Route::AuthEntry]);
    }

    #[tokio::test]
    async fn sign_in_with_google_requests_handshake() {
        let h = harness();
        h.provider.sign_in_with_google().await;

        let requests = h.store.oauth_requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].1.contains("/auth/callback"));
        assert!(h.notifier.notices().is_empty());
    }

    #[tokio::test]
    async fn resend_and_reset_validate_and_log() {
        let h = harness();

        let bad = h.provider.resend_verification_email("nope").await;
        assert!(bad.error.is_some());

        let ok = h
            .provider
            .resend_verification_email("Maker@Example.com")
            .await;
        assert!(ok.error.is_none());
        assert_eq!(h.store.resend_requests(), vec!["maker@example.com"]);

        let reset = h.provider.reset_password("maker@example.com").await;
        assert!(reset.error.is_none());
        assert_eq!(h.store.reset_requests(), vec!["maker@example.com"]);

        let types: Vec<String> = h
            .audit
            .events()
            .into_iter()
            .map(|event| event.event_type)
            .collect();
        assert!(types.contains(&"verification_email_resent".to_string()));
        assert!(types.contains(&"password_reset_requested".to_string()));
    }

    #[tokio::test]
    async fn route_guard_allows_after_password_sign_in() {
        let h = harness_on_route(Route::Other);
        let mut snapshots = h.provider.subscribe_snapshot();
        h.provider.spawn_listener();
        wait_until(&mut snapshots, |s| !s.is_loading).await;

        h.store.seed_account("maker@example.com", "figurine123", true);
        h.provider
            .sign_in("maker@example.com", "figurine123", false)
            .await;
        wait_until(&mut snapshots, |s| s.is_authenticated()).await;

        let mut guard = h.provider.route_guard();
        assert_eq!(
            guard.evaluate().await,
            crate::guard::GuardDecision::Allowed
        );
        h.provider.shutdown();
    }

    #[tokio::test]
    async fn shutdown_stops_state_writes() {
        let h = harness_on_route(Route::Other);
        let mut snapshots = h.provider.subscribe_snapshot();
        h.provider.spawn_listener();
        wait_until(&mut snapshots, |s| !s.is_loading).await;

        h.provider.shutdown();

        let user = h.store.seed_account("maker@example.com", "figurine123", true);
        let session = h.store.issue_session(&user);
        h.store.emit(SessionEvent::SignedIn, Some(session));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.provider.snapshot().user.is_none());
    }
}
