//! In-memory Session Store for tests and offline development.

use crate::error::{GatewayError, GatewayResult};
use crate::events::{SessionChange, SessionEvent, SessionEvents};
use crate::store::{OAuthProvider, SessionStore, SignOutScope, SignUpData};
use crate::types::{AuthProviderKind, Profile, Session, User};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;
use uuid::Uuid;

struct StoredAccount {
    password: String,
    user: User,
}

#[derive(Default)]
struct Inner {
    accounts: HashMap<String, StoredAccount>,
    profiles: HashMap<String, Profile>,
    current: Option<Session>,
    sign_out_scopes: Vec<SignOutScope>,
    oauth_requests: Vec<(OAuthProvider, String)>,
    resend_requests: Vec<String>,
    reset_requests: Vec<String>,
    account_exists_unavailable: bool,
    issue_session_on_sign_up: bool,
}

/// Session Store backed by process memory.
///
/// Mirrors the hosted store's observable behavior, including its default
/// "sign up = signed in" policy, so the auth core's overrides can be
/// exercised without a network.
pub struct MemorySessionStore {
    inner: Mutex<Inner>,
    events: SessionEvents,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                issue_session_on_sign_up: true,
                ..Inner::default()
            }),
            events: SessionEvents::new(),
        }
    }

    /// Stop handing back a session from `sign_up` (models a store configured
    /// to require confirmation before issuing tokens).
    pub fn set_issue_session_on_sign_up(&self, issue: bool) {
        self.inner.lock().unwrap().issue_session_on_sign_up = issue;
    }

    /// Make `account_exists` fail, to exercise best-effort pre-flight paths.
    pub fn set_account_exists_unavailable(&self, unavailable: bool) {
        self.inner.lock().unwrap().account_exists_unavailable = unavailable;
    }

    /// Seed a password account. Returns the stored user.
    pub fn seed_account(&self, email: &str, password: &str, confirmed: bool) -> User {
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            email_confirmed_at: confirmed.then(Utc::now),
            provider: AuthProviderKind::Password,
            created_at: Utc::now(),
        };
        self.inner.lock().unwrap().accounts.insert(
            email.to_string(),
            StoredAccount {
                password: password.to_string(),
                user: user.clone(),
            },
        );
        user
    }

    /// Seed an OAuth account (no password grant).
    pub fn seed_oauth_account(&self, email: &str, confirmed: bool) -> User {
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            email_confirmed_at: confirmed.then(Utc::now),
            provider: AuthProviderKind::Google,
            created_at: Utc::now(),
        };
        self.inner.lock().unwrap().accounts.insert(
            email.to_string(),
            StoredAccount {
                password: String::new(),
                user: user.clone(),
            },
        );
        user
    }

    /// Build a one-hour session for a user without emitting anything.
    pub fn issue_session(&self, user: &User) -> Session {
        Session {
            access_token: Uuid::new_v4().to_string(),
            refresh_token: Some(Uuid::new_v4().to_string()),
            expires_at: Utc::now() + Duration::hours(1),
            user: user.clone(),
        }
    }

    /// Install `session` as current and emit the given event, the way the
    /// hosted store delivers its notifications.
    pub fn emit(&self, event: SessionEvent, session: Option<Session>) {
        self.inner.lock().unwrap().current = session.clone();
        self.events.emit(event, session);
    }

    /// Scopes of every `sign_out` call observed.
    pub fn sign_out_scopes(&self) -> Vec<SignOutScope> {
        self.inner.lock().unwrap().sign_out_scopes.clone()
    }

    /// OAuth handshakes requested as `(provider, redirect_to)`.
    pub fn oauth_requests(&self) -> Vec<(OAuthProvider, String)> {
        self.inner.lock().unwrap().oauth_requests.clone()
    }

    /// Emails that asked for a verification re-send.
    pub fn resend_requests(&self) -> Vec<String> {
        self.inner.lock().unwrap().resend_requests.clone()
    }

    /// Emails that asked for a password reset.
    pub fn reset_requests(&self) -> Vec<String> {
        self.inner.lock().unwrap().reset_requests.clone()
    }

    /// Profile stored for a user, if any.
    pub fn profile_for(&self, user_id: &str) -> Option<Profile> {
        self.inner.lock().unwrap().profiles.get(user_id).cloned()
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn current_session(&self) -> GatewayResult<Option<Session>> {
        Ok(self.inner.lock().unwrap().current.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> GatewayResult<Session> {
        let session = {
            let mut inner = self.inner.lock().unwrap();
            let account = inner.accounts.get(email).ok_or_else(|| {
                GatewayError::InvalidCredentials("Invalid login credentials".to_string())
            })?;
            if account.password != password || account.user.provider.is_oauth() {
                return Err(GatewayError::InvalidCredentials(
                    "Invalid login credentials".to_string(),
                ));
            }
            let session = Session {
                access_token: Uuid::new_v4().to_string(),
                refresh_token: Some(Uuid::new_v4().to_string()),
                expires_at: Utc::now() + Duration::hours(1),
                user: account.user.clone(),
            };
            inner.current = Some(session.clone());
            session
        };
        self.events.emit(SessionEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        _email_redirect_to: &str,
    ) -> GatewayResult<SignUpData> {
        let (data, emit_signed_in) = {
            let mut inner = self.inner.lock().unwrap();
            if inner.accounts.contains_key(email) {
                return Err(GatewayError::AccountExists);
            }

            let user = User {
                id: Uuid::new_v4().to_string(),
                email: email.to_string(),
                email_confirmed_at: None,
                provider: AuthProviderKind::Password,
                created_at: Utc::now(),
            };
            inner.accounts.insert(
                email.to_string(),
                StoredAccount {
                    password: password.to_string(),
                    user: user.clone(),
                },
            );

            if inner.issue_session_on_sign_up {
                let session = Session {
                    access_token: Uuid::new_v4().to_string(),
                    refresh_token: Some(Uuid::new_v4().to_string()),
                    expires_at: Utc::now() + Duration::hours(1),
                    user: user.clone(),
                };
                inner.current = Some(session.clone());
                (
                    SignUpData {
                        user,
                        session: Some(session),
                    },
                    true,
                )
            } else {
                (
                    SignUpData {
                        user,
                        session: None,
                    },
                    false,
                )
            }
        };

        if emit_signed_in {
            self.events
                .emit(SessionEvent::SignedIn, data.session.clone());
        }
        Ok(data)
    }

    async fn sign_out(&self, scope: SignOutScope) -> GatewayResult<()> {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.sign_out_scopes.push(scope);
            inner.current = None;
        }
        self.events.emit(SessionEvent::SignedOut, None);
        Ok(())
    }

    async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
    ) -> GatewayResult<()> {
        self.inner
            .lock()
            .unwrap()
            .oauth_requests
            .push((provider, redirect_to.to_string()));
        Ok(())
    }

    async fn resend_verification_email(&self, email: &str) -> GatewayResult<()> {
        self.inner
            .lock()
            .unwrap()
            .resend_requests
            .push(email.to_string());
        Ok(())
    }

    async fn reset_password_for_email(&self, email: &str, _redirect_to: &str) -> GatewayResult<()> {
        self.inner
            .lock()
            .unwrap()
            .reset_requests
            .push(email.to_string());
        Ok(())
    }

    async fn account_exists(&self, email: &str) -> GatewayResult<bool> {
        let inner = self.inner.lock().unwrap();
        if inner.account_exists_unavailable {
            return Err(GatewayError::Backend {
                status: 503,
                message: "account_exists unavailable".to_string(),
            });
        }
        Ok(inner.accounts.contains_key(email))
    }

    async fn fetch_profile(&self, user_id: &str) -> GatewayResult<Option<Profile>> {
        Ok(self.inner.lock().unwrap().profiles.get(user_id).cloned())
    }

    async fn create_profile(
        &self,
        user_id: &str,
        display_name: Option<&str>,
    ) -> GatewayResult<Profile> {
        let profile = Profile::provisioned(user_id, display_name);
        self.inner
            .lock()
            .unwrap()
            .profiles
            .insert(user_id.to_string(), profile.clone());
        Ok(profile)
    }
}
