//! Security utilities for credential protection.
//!
//! # Security Guarantees
//! - Credentials are stored in `Zeroizing` containers for automatic memory clearing
//! - Connection URLs are parsed so credentials never travel with the address
//! - Passwords are redacted from `Debug` output, logs and error messages
//!
//! # Module Structure
//! - `credentials`: Secure credential container with automatic memory zeroing
//! - `connection`: `mysql://` URL parsing and credential extraction

mod connection;
mod credentials;

pub use connection::{DEFAULT_MYSQL_PORT, EndpointAddress, parse_mysql_url};
pub use credentials::Credentials;

/// Checks that a schema object name is safe to interpolate into SQL.
///
/// Only ASCII letters, digits and underscores are accepted, which is the
/// same rule applied to slow-log database and table names.
///
/// # Example
/// ```rust
/// use slowscope_core::security::is_safe_identifier;
///
/// assert!(is_safe_identifier("slow_log_2024"));
/// assert!(!is_safe_identifier("slow; DROP TABLE t"));
/// assert!(!is_safe_identifier(""));
/// ```
pub fn is_safe_identifier(name: &str) -> bool {
    use std::sync::OnceLock;
    static PATTERN: OnceLock<Option<regex::Regex>> = OnceLock::new();

    PATTERN
        .get_or_init(|| regex::Regex::new(r"^[a-zA-Z0-9_]+$").ok())
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_zeroization() {
        let creds = Credentials::new("user".to_string(), Some("password".to_string()));
        assert_eq!(creds.username(), "user");
        assert!(creds.has_password());
        // Credentials will be automatically zeroized on drop
    }

    #[test]
    fn test_safe_identifier() {
        assert!(is_safe_identifier("slow"));
        assert!(is_safe_identifier("T_2024"));
        assert!(!is_safe_identifier("db.table"));
        assert!(!is_safe_identifier("`slow`"));
        assert!(!is_safe_identifier("name-with-dash"));
    }
}
