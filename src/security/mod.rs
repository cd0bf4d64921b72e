pub mod audit;
pub mod sanitizer;

pub use audit::{AuditEvent, AuditSink, TracingAuditSink};
pub use sanitizer::Sanitizer;

use email_address::EmailAddress;

/// Check an email address for structural validity.
pub fn validate_email(email: &str) -> bool {
    email.trim().parse::<EmailAddress>().is_ok()
}

/// Password policy: at least 8 characters, containing letters and digits.
pub fn validate_password(password: &str) -> bool {
    password.len() >= 8
        && password.chars().any(|c| c.is_ascii_alphabetic())
        && password.chars().any(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validity() {
        assert!(validate_email("user@example.com"));
        assert!(validate_email("  user@example.com  "));
        assert!(!validate_email("not-an-email"));
        assert!(!validate_email(""));
    }

    #[test]
    fn password_policy() {
        assert!(validate_password("abcdef12"));
        assert!(!validate_password("short1"));
        assert!(!validate_password("allletters"));
        assert!(!validate_password("12345678"));
    }
}
