//! Data model for sessions, users, and profiles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How the account authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthProviderKind {
    /// Email + password account
    Password,
    /// Google OAuth account
    Google,
}

impl AuthProviderKind {
    /// OAuth accounts are pre-verified by the identity provider.
    pub fn is_oauth(&self) -> bool {
        !matches!(self, AuthProviderKind::Password)
    }
}

/// Identity record from the Session Store. Immutable client-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID
    pub id: String,
    /// Account email
    pub email: String,
    /// When the email was confirmed; None means unverified
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,
    /// Auth provider that created the account
    pub provider: AuthProviderKind,
    /// Account creation time
    pub created_at: DateTime<Utc>,
}

impl User {
    /// True when the email has been confirmed.
    pub fn is_email_confirmed(&self) -> bool {
        self.email_confirmed_at.is_some()
    }
}

/// Opaque token bundle issued by the Session Store. The client holds a
/// read-only cached copy; the Session Store owns the lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Access token for API calls
    pub access_token: String,
    /// Refresh token, when the grant supports refresh
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
    /// The user this session belongs to
    pub user: User,
}

impl Session {
    /// True when the access token has passed its expiry.
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    /// Time remaining until expiry (negative when already expired).
    pub fn expires_in(&self) -> chrono::Duration {
        self.expires_at - Utc::now()
    }
}

/// Plan tier for billing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    #[default]
    Free,
    Maker,
    Atelier,
}

/// Application-level record keyed by user id. Auto-provisioned on first
/// sign-in; mutated later by settings/billing flows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Owning user ID
    pub user_id: String,
    /// Display name shown in the studio
    #[serde(default)]
    pub display_name: Option<String>,
    /// Avatar image URL
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Plan tier
    #[serde(default)]
    pub plan: Plan,
    /// Whether onboarding has been completed
    #[serde(default)]
    pub onboarding_complete: bool,
}

impl Profile {
    /// Default profile provisioned on first sign-in.
    pub fn provisioned(user_id: &str, display_name: Option<&str>) -> Self {
        Self {
            user_id: user_id.to_string(),
            display_name: display_name.map(str::to_string),
            avatar_url: None,
            plan: Plan::Free,
            onboarding_complete: false,
        }
    }
}
