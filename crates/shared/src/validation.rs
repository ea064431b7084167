//! Common validation utilities.

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

/// Longest email address accepted (RFC 5321 path limit).
const MAX_EMAIL_LENGTH: usize = 254;

lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid");
}

/// Returns true when the value looks like a deliverable email address.
///
/// This is a plausibility check, not RFC 5322 parsing: one `@`, no
/// whitespace, and a dot in the domain part.
pub fn is_plausible_email(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty()
        && value.len() <= MAX_EMAIL_LENGTH
        && value.matches('@').count() == 1
        && EMAIL_REGEX.is_match(value)
}

/// Normalizes an email for storage and comparison.
pub fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Validator hook for plausible email fields.
pub fn validate_plausible_email(value: &str) -> Result<(), ValidationError> {
    if is_plausible_email(value) {
        Ok(())
    } else {
        let mut err = ValidationError::new("email_format");
        err.message = Some("Invalid email address".into());
        Err(err)
    }
}
