//! Derived security score.

use chrono::Duration;
use studio_gateway::{Session, User};

/// Compute the display security score in [0, 100].
///
/// Pure function of the exposed auth state: +40 confirmed email, +30 live
/// session, +20 OAuth provider, +10 expiry more than zero hours away.
pub fn security_score(user: Option<&User>, session: Option<&Session>) -> u8 {
    let mut score = 0;

    if let Some(user) = user {
        if user.is_email_confirmed() {
            score += 40;
        }
        if user.provider.is_oauth() {
            score += 20;
        }
    }

    if let Some(session) = session {
        if !session.access_token.is_empty() {
            score += 30;
        }
        if session.expires_in() > Duration::zero() {
            score += 10;
        }
    }

    score
}
