//! Authentication core for the Figura Studio app.
//!
//! This crate provides:
//! - The auth provider: single owner of process-wide auth state
//! - Email-verification enforcement shared by provider and route guard
//! - The security-enforced route guard for protected content
//! - The profile cache, security score, validators, and friendly-error
//!   mapping
//! - Typed broadcasts and navigation/notification intents consumed by the
//!   UI shell

mod bus;
mod enforcer;
mod guard;
mod intents;
mod messages;
mod profile_cache;
mod provider;
mod score;
mod validate;

pub use bus::{AuthBroadcast, AuthBus};
pub use enforcer::{EnforcementResult, VerificationEnforcer};
pub use guard::{BotMitigation, GuardDecision, NoopBotMitigation, RouteGuard};
pub use intents::{
    Navigator, NoopNavigator, NoopNotifier, Notice, NoticeLevel, Notifier, RecordingNavigator,
    RecordingNotifier, Route,
};
pub use messages::friendly_message;
pub use profile_cache::ProfileCache;
pub use provider::{AuthProvider, AuthSnapshot, OpOutcome, SignInOutcome, SignUpOutcome};
pub use score::security_score;
pub use validate::{normalize_email, valid_email, validate_password};
