//! Gateway error types.

use thiserror::Error;

/// Error type for Session Store operations.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Invalid email or password
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// An account already exists for the email
    #[error("Account already exists")]
    AccountExists,

    /// The backend confirmed a rate limit
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Non-success response from the backend
    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    /// Session was invalidated server-side (revoked, signed out elsewhere)
    #[error("Session invalid: {0}")]
    SessionInvalid(String),

    /// No session is present
    #[error("Not signed in")]
    NotSignedIn,

    /// Token refresh retries exhausted
    #[error("Token refresh failed after {0} attempts")]
    RefreshExhausted(u32),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl GatewayError {
    /// Returns true if this error is transient and the operation can be
    /// retried: connection failures, timeouts, and 5xx responses.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Http(err) => {
                if err.is_connect() || err.is_timeout() {
                    return true;
                }
                if let Some(status) = err.status() {
                    return status.is_server_error();
                }
                false
            }
            GatewayError::Backend { status, .. } => (500..=599).contains(status) || *status == 408,
            _ => false,
        }
    }
}

/// Result type alias using GatewayError.
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_server_errors_are_transient() {
        let err = GatewayError::Backend {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn backend_client_errors_are_not_transient() {
        let err = GatewayError::Backend {
            status: 400,
            message: "bad request".to_string(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn credential_and_account_errors_are_not_transient() {
        assert!(!GatewayError::InvalidCredentials("nope".to_string()).is_transient());
        assert!(!GatewayError::AccountExists.is_transient());
        assert!(!GatewayError::RateLimited("slow down".to_string()).is_transient());
        assert!(!GatewayError::NotSignedIn.is_transient());
    }
}
