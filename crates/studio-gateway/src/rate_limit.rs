//! Rate-limit probing for auth flows.
//!
//! The probe is best-effort: any failure to reach the limiter is treated as
//! `Allowed`. Only an explicit `Limited` decision blocks an attempt.

use async_trait::async_trait;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug)]
pub enum RateLimitAction {
    SignUp,
    SignIn,
    ResendVerification,
    ResetPassword,
}

impl RateLimitAction {
    fn as_str(&self) -> &'static str {
        match self {
            RateLimitAction::SignUp => "sign_up",
            RateLimitAction::SignIn => "sign_in",
            RateLimitAction::ResendVerification => "resend_verification",
            RateLimitAction::ResetPassword => "reset_password",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

/// Probe the backend rate limiter before an auth attempt.
#[async_trait]
pub trait RateLimitProbe: Send + Sync {
    /// Check whether `email` may perform `action`. Implementations must
    /// never surface probe failures; unknown means `Allowed`.
    async fn check(&self, email: &str, action: RateLimitAction) -> RateLimitDecision;
}

/// Probe that always allows. Used in tests and offline builds.
#[derive(Clone, Debug, Default)]
pub struct NoopRateLimitProbe;

#[async_trait]
impl RateLimitProbe for NoopRateLimitProbe {
    async fn check(&self, _email: &str, _action: RateLimitAction) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

/// HTTP probe against the backend's rate-limit RPC.
pub struct HttpRateLimitProbe {
    http_client: reqwest::Client,
    api_url: String,
    publishable_key: String,
}

impl HttpRateLimitProbe {
    pub fn new(api_url: impl Into<String>, publishable_key: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_url: api_url.into(),
            publishable_key: publishable_key.into(),
        }
    }
}

#[async_trait]
impl RateLimitProbe for HttpRateLimitProbe {
    async fn check(&self, email: &str, action: RateLimitAction) -> RateLimitDecision {
        let url = format!("{}/rest/v1/rpc/rate_limit_check", self.api_url);

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.publishable_key)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({
                "email": email,
                "action": action.as_str(),
            }))
            .send()
            .await;

        match response {
            Ok(response) if response.status().as_u16() == 429 => {
                debug!(action = action.as_str(), "Rate limiter confirmed a limit");
                RateLimitDecision::Limited
            }
            Ok(response) if response.status().is_success() => {
                match response.json::<bool>().await {
                    Ok(true) => RateLimitDecision::Allowed,
                    Ok(false) => RateLimitDecision::Limited,
                    Err(err) => {
                        warn!("Rate-limit probe returned an unreadable body: {err}");
                        RateLimitDecision::Allowed
                    }
                }
            }
            Ok(response) => {
                // Limiter unavailable is not a limit.
                warn!(status = %response.status(), "Rate-limit probe unavailable");
                RateLimitDecision::Allowed
            }
            Err(err) => {
                warn!("Rate-limit probe failed: {err}");
                RateLimitDecision::Allowed
            }
        }
    }
}
