//! Redacting wrapper for OAuth tokens and client secrets

use std::fmt;
use zeroize::Zeroize;

/// Sensitive value. Redacted in Debug/Display so it can sit inside structs
/// that get logged, and wiped from memory on drop.
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Borrow the inner value. Call sites should be limited to the point
    /// where the value goes onto the wire.
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl Secret<String> {
    /// Empty tokens count as absent throughout the credential pipeline.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T: Zeroize> From<T> for Secret<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_is_redacted() {
        let token = Secret::new(String::from("ya29.a0AfB_token"));
        assert_eq!(format!("{token:?}"), "[REDACTED]");
        assert_eq!(format!("{token}"), "[REDACTED]");
    }

    #[test]
    fn expose_returns_inner_value() {
        let token: Secret<String> = String::from("1//refresh").into();
        assert_eq!(token.expose(), "1//refresh");
        assert!(!token.is_empty());
    }

    #[test]
    fn empty_string_is_empty() {
        assert!(Secret::new(String::new()).is_empty());
    }

    #[test]
    fn redaction_survives_inside_derived_debug() {
        #[derive(Debug)]
        #[allow(dead_code)]
        struct Account {
            email: String,
            token: Secret<String>,
        }
        let account = Account {
            email: "a@example.com".into(),
            token: Secret::new("ya29.secret".into()),
        };
        let debug = format!("{account:?}");
        assert!(debug.contains("a@example.com"));
        assert!(!debug.contains("ya29.secret"));
    }
}
