//! Local format validation for auth inputs.
//!
//! Validation runs before any network call so malformed input fails fast.

use regex::Regex;

/// Minimum accepted password length.
const MIN_PASSWORD_LENGTH: usize = 6;

/// Normalize an email for lookup/uniqueness checks.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Check the password against local policy.
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters."
        ));
    }
    Ok(())
}
