//! Input validation
//!
//! Pure, deterministic boolean checks over caller-supplied input and the
//! configured [`PasswordPolicy`]. Validators never perform I/O and never
//! panic; calling one twice with the same input and policy always returns
//! the same result. Callers are expected to validate before invoking a
//! provider operation; providers still re-validate server-side.

use crate::config::PasswordPolicy;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Conservative RFC-5322 subset: local part, `@`, domain labels, and a TLD
/// of at least two alphabetic characters.
static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$")
        .expect("email pattern is a valid regex")
});

/// Check whether `email` has a plausible address shape.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Check `password` against the configured policy: length within
/// `[min_length, max_length]` plus any required character classes.
pub fn is_valid_password(password: &str, policy: &PasswordPolicy) -> bool {
    let length = password.chars().count();
    if length < policy.min_length || length > policy.max_length {
        return false;
    }
    if policy.require_numbers && !password.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }
    if policy.require_special_characters && !password.chars().any(|c| !c.is_alphanumeric()) {
        return false;
    }
    true
}

/// Check a display name: 1–64 characters after trimming whitespace.
pub fn is_valid_display_name(name: &str) -> bool {
    let trimmed = name.trim();
    (1..=64).contains(&trimmed.chars().count())
}

/// Check that `candidate` parses as a URL with both a scheme and a host.
pub fn is_valid_url(candidate: &str) -> bool {
    match Url::parse(candidate) {
        Ok(url) => url.has_host(),
        Err(_) => false,
    }
}

/// Confirmation-match check: bitwise equality and non-empty input.
/// An empty string never matches another empty string.
pub fn passwords_match(password: &str, confirmation: &str) -> bool {
    !password.is_empty() && password == confirmation
}
