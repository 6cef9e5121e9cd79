//! Session Store client for the Figura Studio app.
//!
//! This crate provides:
//! - The data model (sessions, users, profiles)
//! - The `SessionStore` trait the auth core consumes
//! - A REST implementation against the hosted auth API
//! - Session-change event fan-out and token refresh with bounded backoff
//! - Best-effort rate-limit probing and fire-and-forget security-event logging

mod audit;
mod error;
mod events;
mod memory;
mod rate_limit;
mod refresh;
mod rest;
mod store;
mod types;

pub use audit::{
    HttpSecurityEventSink, MemorySecurityEventSink, NoopSecurityEventSink, SecurityEvent,
    SecurityEventSink,
};
pub use error::{GatewayError, GatewayResult};
pub use events::{SessionChange, SessionEvent, SessionEvents};
pub use memory::MemorySessionStore;
pub use rate_limit::{
    HttpRateLimitProbe, NoopRateLimitProbe, RateLimitAction, RateLimitDecision, RateLimitProbe,
};
pub use refresh::RefreshConfig;
pub use rest::RestSessionStore;
pub use store::{OAuthProvider, SessionStore, SignOutScope, SignUpData};
pub use types::{AuthProviderKind, Plan, Profile, Session, User};
