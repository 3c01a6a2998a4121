//! Permission token construction and validation, reconstructed from
//! `base_document.py.__post_init__`'s call to `is_valid_permission_token`
//! (the original's `src/permissions/utils.py` was not in the retrieval
//! pack; this follows the one call site and spec.md §3's statement that
//! "the canonical construction is `email:<lowercased-email>`").

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex"));

/// Build the canonical permission token for a user's email address.
pub fn make_email_permission_token(email: &str) -> String {
    format!("email:{}", email.to_lowercase())
}

/// Whether `token` is a well-formed permission token. Only the
/// `email:<address>` construction is supported today.
pub fn is_valid_permission_token(token: &str) -> bool {
    match token.split_once(':') {
        Some(("email", rest)) => EMAIL_RE.is_match(rest),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_lowercased_email_token() {
        assert_eq!(make_email_permission_token("Alice@Example.com"), "email:alice@example.com");
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(!is_valid_permission_token("not-a-token"));
        assert!(!is_valid_permission_token("email:not-an-email"));
        assert!(!is_valid_permission_token("sms:555-0100"));
    }

    #[test]
    fn accepts_well_formed_email_tokens() {
        assert!(is_valid_permission_token("email:alice@example.com"));
    }
}
