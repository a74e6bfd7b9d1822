//! Centralized validation and normalization utilities
//!
//! Single source of truth for input validation, so the same rules apply at
//! every entry point.

use crate::error::ValidationError;
use regex::Regex;
use std::sync::LazyLock;

/// Lazy-loaded email validation regex
///
/// Validates email addresses according to a practical subset of RFC 5322.
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("Invalid email regex pattern")
});

/// Normalize an email address for storage and lookup.
///
/// Emails are always lowercased (and trimmed) before they touch the
/// database, so lookups are case-insensitive by construction.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validates an email address.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::MissingField(
            "Email is required".to_string(),
        ));
    }

    if email.len() > 254 {
        return Err(ValidationError::InvalidEmail(
            "Email is too long".to_string(),
        ));
    }

    if EMAIL_REGEX.is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(format!(
            "Invalid email format: {email}"
        )))
    }
}

/// Validates a password according to security requirements.
///
/// - Minimum 8 characters
/// - Maximum 128 characters
/// - Cannot be empty or whitespace only
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::MissingField(
            "Password is required".to_string(),
        ));
    }

    if password.trim().is_empty() {
        return Err(ValidationError::InvalidPassword(
            "Password cannot be only whitespace".to_string(),
        ));
    }

    if password.chars().count() < 8 {
        return Err(ValidationError::InvalidPassword(
            "Password must be at least 8 characters long".to_string(),
        ));
    }

    if password.chars().count() > 128 {
        return Err(ValidationError::InvalidPassword(
            "Password must be no more than 128 characters long".to_string(),
        ));
    }

    Ok(())
}

/// Validates an OAuth provider name.
///
/// Provider names are lowercase alphanumeric with optional hyphens, at most
/// 50 characters.
pub fn validate_provider(provider: &str) -> Result<(), ValidationError> {
    if provider.is_empty() {
        return Err(ValidationError::MissingField(
            "OAuth provider is required".to_string(),
        ));
    }

    if provider.len() > 50 {
        return Err(ValidationError::InvalidProvider(
            "OAuth provider name must be no more than 50 characters long".to_string(),
        ));
    }

    if !provider
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(ValidationError::InvalidProvider(
            "OAuth provider name must contain only lowercase letters, numbers, and hyphens"
                .to_string(),
        ));
    }

    Ok(())
}
