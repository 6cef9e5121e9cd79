//! REST implementation of the Session Store against the hosted auth API.
//!
//! Endpoint shapes follow the backend's GoTrue-style surface:
//! `/auth/v1/token`, `/auth/v1/signup`, `/auth/v1/logout`, `/auth/v1/resend`,
//! `/auth/v1/recover`, `/auth/v1/authorize`, and `/rest/v1/profiles`.

use crate::error::{GatewayError, GatewayResult};
use crate::events::{SessionChange, SessionEvent, SessionEvents};
use crate::refresh::RefreshConfig;
use crate::store::{OAuthProvider, SessionStore, SignOutScope, SignUpData};
use crate::types::{AuthProviderKind, Profile, Session, User};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use studio_storage::{PreferencesManager, SessionMeta};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use url::Url;

/// Summarize a response body for logs without leaking its contents.
fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

/// Token grant request for refresh.
#[derive(Debug, Serialize)]
struct RefreshRequest {
    refresh_token: String,
}

/// Token grant response (password, refresh, and confirmation-off signup).
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
    user: WireUser,
}

/// User record as the auth API serializes it.
#[derive(Debug, Deserialize)]
struct WireUser {
    id: String,
    email: String,
    #[serde(default)]
    email_confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    app_metadata: Option<AppMetadata>,
}

#[derive(Debug, Deserialize)]
struct AppMetadata {
    #[serde(default)]
    provider: Option<String>,
}

impl WireUser {
    fn into_user(self) -> User {
        let provider = match self
            .app_metadata
            .as_ref()
            .and_then(|meta| meta.provider.as_deref())
        {
            Some("google") => AuthProviderKind::Google,
            _ => AuthProviderKind::Password,
        };
        User {
            id: self.id,
            email: self.email,
            email_confirmed_at: self.email_confirmed_at,
            provider,
            created_at: self.created_at.unwrap_or_else(Utc::now),
        }
    }
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = Utc::now() + Duration::seconds(self.expires_in);
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user.into_user(),
        }
    }
}

/// Session Store client over the hosted auth REST API.
pub struct RestSessionStore {
    http_client: reqwest::Client,
    api_url: String,
    publishable_key: String,
    events: SessionEvents,
    current: Mutex<Option<Session>>,
    last_authorize_url: Mutex<Option<Url>>,
    preferences: Option<Arc<PreferencesManager>>,
    refresh_config: RefreshConfig,
}

impl RestSessionStore {
    /// Create a new store client.
    ///
    /// # Arguments
    /// * `api_url` - The project API URL (e.g. `https://xyz.figura.studio`)
    /// * `publishable_key` - The public API key
    pub fn new(api_url: impl Into<String>, publishable_key: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_url: api_url.into(),
            publishable_key: publishable_key.into(),
            events: SessionEvents::new(),
            current: Mutex::new(None),
            last_authorize_url: Mutex::new(None),
            preferences: None,
            refresh_config: RefreshConfig::default(),
        }
    }

    /// Attach a preferences manager; session metadata is mirrored into it so
    /// the next boot can resume.
    pub fn with_preferences(mut self, preferences: Arc<PreferencesManager>) -> Self {
        self.preferences = Some(preferences);
        self
    }

    /// Override the refresh retry configuration.
    pub fn with_refresh_config(mut self, refresh_config: RefreshConfig) -> Self {
        self.refresh_config = refresh_config;
        self
    }

    /// Build an auth API URL.
    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.api_url, path)
    }

    /// Build the REST API URL for a table or RPC.
    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.api_url, path)
    }

    /// Emit a boot notification with whatever session is currently cached.
    pub fn bootstrap(&self) {
        let session = self.current.lock().unwrap().clone();
        self.events.emit(SessionEvent::InitialSession, session);
    }

    /// The authorize URL prepared by the last `sign_in_with_oauth` call. The
    /// UI shell executes the actual browser navigation.
    pub fn pending_authorize_url(&self) -> Option<Url> {
        self.last_authorize_url.lock().unwrap().clone()
    }

    /// Build the OAuth authorize URL for a provider.
    pub fn authorize_url(&self, provider: OAuthProvider, redirect_to: &str) -> GatewayResult<Url> {
        let provider_tag = match provider {
            OAuthProvider::Google => "google",
        };
        let mut url = Url::parse(&self.auth_url("authorize"))?;
        url.query_pairs_mut()
            .append_pair("provider", provider_tag)
            .append_pair("redirect_to", redirect_to);
        Ok(url)
    }

    fn store_session(&self, session: &Session) {
        *self.current.lock().unwrap() = Some(session.clone());

        // Preference writes are advisory; never fail the auth call over them.
        if let Some(preferences) = &self.preferences {
            let meta = SessionMeta {
                user_id: session.user.id.clone(),
                email: Some(session.user.email.clone()),
                expires_at: session.expires_at.to_rfc3339(),
            };
            if let Err(err) = preferences.set_session_meta(&meta) {
                warn!("Failed to mirror session metadata: {err}");
            }
        }
    }

    fn clear_session(&self) {
        *self.current.lock().unwrap() = None;
        if let Some(preferences) = &self.preferences {
            if let Err(err) = preferences.clear_session_meta() {
                warn!("Failed to clear session metadata: {err}");
            }
        }
    }

    async fn error_from_response(response: reqwest::Response) -> GatewayError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let body_summary = summarize_response_body(&body);

        if status.as_u16() == 429 {
            return GatewayError::RateLimited("Too many attempts".to_string());
        }
        if body.contains("already registered") || body.contains("user_already_exists") {
            return GatewayError::AccountExists;
        }
        if body.contains("invalid_credentials") || body.contains("Invalid login credentials") {
            return GatewayError::InvalidCredentials("Invalid login credentials".to_string());
        }

        warn!(status = %status, body_summary = %body_summary, "Auth API request failed");
        GatewayError::Backend {
            status: status.as_u16(),
            message: body_summary,
        }
    }

    /// Single attempt to refresh the session.
    async fn try_refresh(&self, refresh_token: &str) -> GatewayResult<Session> {
        let refresh_url = self.auth_url("token?grant_type=refresh_token");
        debug!(url = %refresh_url, "Refreshing token");

        let response = self
            .http_client
            .post(&refresh_url)
            .header("apikey", &self.publishable_key)
            .header("Content-Type", "application/json")
            .json(&RefreshRequest {
                refresh_token: refresh_token.to_string(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let data: TokenResponse = response.json().await?;
        Ok(data.into_session())
    }

    /// Refresh the session with exponential backoff over transient errors.
    ///
    /// Emits `TokenRefreshed` on success. Non-transient failures clear the
    /// cached session.
    pub async fn refresh_session(&self, refresh_token: &str) -> GatewayResult<Session> {
        let mut last_error = None;

        for attempt in 0..self.refresh_config.max_retries {
            match self.try_refresh(refresh_token).await {
                Ok(session) => {
                    self.store_session(&session);
                    info!(user_id = %session.user.id, "Token refreshed");
                    self.events
                        .emit(SessionEvent::TokenRefreshed, Some(session.clone()));
                    return Ok(session);
                }
                Err(err) if err.is_transient() => {
                    last_error = Some(err);
                    if attempt + 1 < self.refresh_config.max_retries {
                        let delay = self.refresh_config.delay_for_attempt(attempt);
                        debug!(
                            attempt = attempt + 1,
                            max_retries = self.refresh_config.max_retries,
                            delay_ms = delay.as_millis(),
                            "Refresh failed with transient error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(err) => {
                    warn!("Refresh failed with non-transient error: {err}");
                    self.clear_session();
                    return Err(err);
                }
            }
        }

        warn!(
            "Refresh failed after {} attempts",
            self.refresh_config.max_retries
        );
        self.clear_session();
        Err(last_error.unwrap_or(GatewayError::RefreshExhausted(self.refresh_config.max_retries)))
    }
}

#[async_trait]
impl SessionStore for RestSessionStore {
    async fn current_session(&self) -> GatewayResult<Option<Session>> {
        Ok(self.current.lock().unwrap().clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> GatewayResult<Session> {
        let login_url = self.auth_url("token?grant_type=password");
        debug!(url = %login_url, "Attempting password sign-in");

        let response = self
            .http_client
            .post(&login_url)
            .header("apikey", &self.publishable_key)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({
                "email": email,
                "password": password,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let data: TokenResponse = response.json().await?;
        let session = data.into_session();
        self.store_session(&session);
        info!(user_id = %session.user.id, "Password sign-in successful");
        self.events
            .emit(SessionEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        email_redirect_to: &str,
    ) -> GatewayResult<SignUpData> {
        let mut signup_url = Url::parse(&self.auth_url("signup"))?;
        signup_url
            .query_pairs_mut()
            .append_pair("redirect_to", email_redirect_to);
        debug!(url = %signup_url, "Attempting sign-up");

        let response = self
            .http_client
            .post(signup_url)
            .header("apikey", &self.publishable_key)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({
                "email": email,
                "password": password,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        // The store returns a token grant when email confirmation is off and
        // a bare user record when it is on.
        let body = response.text().await?;
        if let Ok(token) = serde_json::from_str::<TokenResponse>(&body) {
            let session = token.into_session();
            self.store_session(&session);
            self.events
                .emit(SessionEvent::SignedIn, Some(session.clone()));
            return Ok(SignUpData {
                user: session.user.clone(),
                session: Some(session),
            });
        }

        let user: WireUser = serde_json::from_str(&body)?;
        Ok(SignUpData {
            user: user.into_user(),
            session: None,
        })
    }

    async fn sign_out(&self, scope: SignOutScope) -> GatewayResult<()> {
        let access_token = self
            .current
            .lock()
            .unwrap()
            .as_ref()
            .map(|session| session.access_token.clone());

        if let Some(token) = access_token {
            let scope_tag = match scope {
                SignOutScope::Global => "global",
                SignOutScope::Local => "local",
            };
            let logout_url = self.auth_url(&format!("logout?scope={scope_tag}"));
            let result = self
                .http_client
                .post(&logout_url)
                .header("apikey", &self.publishable_key)
                .header("Authorization", format!("Bearer {token}"))
                .send()
                .await;
            match result {
                Ok(response) if !response.status().is_success() => {
                    let status = response.status();
                    warn!(status = %status, "Server-side sign-out failed; clearing locally");
                }
                Err(err) => {
                    warn!("Server-side sign-out failed: {err}; clearing locally");
                }
                _ => {}
            }
        }

        // Always clear local state, even if the server call failed.
        self.clear_session();
        self.events.emit(SessionEvent::SignedOut, None);
        info!("Signed out");
        Ok(())
    }

    async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
    ) -> GatewayResult<()> {
        let url = self.authorize_url(provider, redirect_to)?;
        info!(%url, "Prepared OAuth handshake");
        *self.last_authorize_url.lock().unwrap() = Some(url);
        Ok(())
    }

    async fn resend_verification_email(&self, email: &str) -> GatewayResult<()> {
        let response = self
            .http_client
            .post(self.auth_url("resend"))
            .header("apikey", &self.publishable_key)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({
                "type": "signup",
                "email": email,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        Ok(())
    }

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> GatewayResult<()> {
        let mut recover_url = Url::parse(&self.auth_url("recover"))?;
        recover_url
            .query_pairs_mut()
            .append_pair("redirect_to", redirect_to);

        let response = self
            .http_client
            .post(recover_url)
            .header("apikey", &self.publishable_key)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        Ok(())
    }

    async fn account_exists(&self, email: &str) -> GatewayResult<bool> {
        let response = self
            .http_client
            .post(self.rest_url("rpc/account_exists"))
            .header("apikey", &self.publishable_key)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let exists: bool = response.json().await?;
        Ok(exists)
    }

    async fn fetch_profile(&self, user_id: &str) -> GatewayResult<Option<Profile>> {
        let url = format!(
            "{}?user_id=eq.{}&select=user_id,display_name,avatar_url,plan,onboarding_complete&limit=1",
            self.rest_url("profiles"),
            user_id
        );
        debug!(user_id = %user_id, "Fetching profile");

        let mut request = self
            .http_client
            .get(&url)
            .header("apikey", &self.publishable_key)
            .header("Accept", "application/json");
        if let Some(session) = self.current.lock().unwrap().as_ref() {
            request = request.header(
                "Authorization",
                format!("Bearer {}", session.access_token),
            );
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let profiles: Vec<Profile> = response.json().await?;
        Ok(profiles.into_iter().next())
    }

    async fn create_profile(
        &self,
        user_id: &str,
        display_name: Option<&str>,
    ) -> GatewayResult<Profile> {
        let profile = Profile::provisioned(user_id, display_name);
        debug!(user_id = %user_id, "Provisioning profile");

        let mut request = self
            .http_client
            .post(self.rest_url("profiles"))
            .header("apikey", &self.publishable_key)
            .header("Content-Type", "application/json")
            .header("Prefer", "return=representation")
            .json(&profile);
        if let Some(session) = self.current.lock().unwrap().as_ref() {
            request = request.header(
                "Authorization",
                format!("Bearer {}", session.access_token),
            );
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let mut created: Vec<Profile> = response.json().await?;
        created.pop().ok_or(GatewayError::Backend {
            status: 200,
            message: "Profile insert returned no rows".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_builders() {
        let store = RestSessionStore::new("https://test.figura.studio", "test-key");
        assert_eq!(
            store.auth_url("signup"),
            "https://test.figura.studio/auth/v1/signup"
        );
        assert_eq!(
            store.rest_url("profiles"),
            "https://test.figura.studio/rest/v1/profiles"
        );
    }

    #[test]
    fn authorize_url_encodes_redirect() {
        let store = RestSessionStore::new("https://test.figura.studio", "test-key");
        let url = store
            .authorize_url(OAuthProvider::Google, "https://figura.studio/auth/callback")
            .unwrap();
        assert!(url.as_str().starts_with(
            "https://test.figura.studio/auth/v1/authorize?provider=google&redirect_to="
        ));
        assert!(url.as_str().contains("figura.studio%2Fauth%2Fcallback"));
    }

    #[test]
    fn token_response_maps_provider_and_expiry() -> anyhow::Result<()> {
        let json = serde_json::json!({
            "access_token": "token",
            "refresh_token": "refresh",
            "expires_in": 3600,
            "user": {
                "id": "user-1",
                "email": "maker@example.com",
                "email_confirmed_at": "2026-01-01T00:00:00Z",
                "created_at": "2025-12-01T00:00:00Z",
                "app_metadata": { "provider": "google" }
            }
        });
        let token: TokenResponse = serde_json::from_value(json)?;
        let session = token.into_session();

        assert_eq!(session.user.provider, AuthProviderKind::Google);
        assert!(session.user.is_email_confirmed());
        assert!(session.expires_in() > Duration::minutes(59));
        assert!(!session.is_expired());
        Ok(())
    }

    #[test]
    fn wire_user_defaults_to_password_provider() {
        let json = serde_json::json!({
            "id": "user-2",
            "email": "maker@example.com"
        });
        let user: WireUser = serde_json::from_value(json).unwrap();
        let user = user.into_user();

        assert_eq!(user.provider, AuthProviderKind::Password);
        assert!(!user.is_email_confirmed());
    }

    #[test]
    fn body_summary_has_no_plaintext() {
        let summary = summarize_response_body("secret token material");
        assert!(!summary.contains("secret"));
        assert!(summary.starts_with("len=21,digest="));
    }

    #[tokio::test]
    async fn refresh_session_exhausts_transient_errors() {
        // Nothing listens on this port; every attempt fails with a
        // transient connection error until retries run out.
        let store = RestSessionStore::new("http://127.0.0.1:1", "test-key").with_refresh_config(
            RefreshConfig {
                max_retries: 2,
                initial_delay_ms: 1,
                max_delay_ms: 2,
            },
        );

        let err = store.refresh_session("refresh-token").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn bootstrap_emits_initial_session() {
        let store = RestSessionStore::new("https://test.figura.studio", "test-key");
        let mut receiver = store.subscribe();

        store.bootstrap();
        let change = receiver.recv().await.unwrap();
        assert_eq!(change.event, SessionEvent::InitialSession);
        assert!(change.session.is_none());
    }
}
