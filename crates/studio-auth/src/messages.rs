//! Mapping from gateway errors to user-displayable strings.
//!
//! Raw backend error text never reaches the user; every variant maps to a
//! fixed friendly message.

use studio_gateway::GatewayError;

/// Translate a gateway error into a displayable message.
pub fn friendly_message(error: &GatewayError) -> String {
    match error {
        GatewayError::InvalidCredentials(_) => "Incorrect email or password.".to_string(),
        GatewayError::AccountExists => {
            "An account with this email already exists. Try signing in instead.".to_string()
        }
        GatewayError::RateLimited(_) => {
            "Too many attempts. Please wait a moment and try again.".to_string()
        }
        GatewayError::NotSignedIn => "You are signed out. Please sign in again.".to_string(),
        GatewayError::RefreshExhausted(_) | GatewayError::SessionInvalid(_) => {
            "Your session has expired. Please sign in again.".to_string()
        }
        GatewayError::Backend { .. }
        | GatewayError::Http(_)
        | GatewayError::Json(_)
        | GatewayError::InvalidUrl(_) => {
            "Something went wrong. Please try again.".to_string()
        }
    }
}
