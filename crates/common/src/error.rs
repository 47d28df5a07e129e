//! Configuration error types

use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Shorthand for a validation failure on a named config field.
    pub fn invalid(field: &str, reason: impl std::fmt::Display) -> Self {
        Error::Config(format!("{field} {reason}"))
    }
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_names_the_field() {
        let err = Error::invalid("upstream.timeout_secs", "must be greater than 0");
        assert_eq!(
            err.to_string(),
            "Configuration error: upstream.timeout_secs must be greater than 0"
        );
    }

    #[test]
    fn io_errors_convert() {
        let err: Error =
            std::io::Error::new(std::io::ErrorKind::NotFound, "credentials.json").into();
        assert!(err.to_string().starts_with("I/O error:"), "got: {err}");
    }

    #[test]
    fn toml_errors_convert() {
        let parse: std::result::Result<toml::Value, _> = toml::from_str("[server");
        let err: Error = parse.unwrap_err().into();
        let debug = format!("{err:?}");
        assert!(debug.contains("Toml"), "got: {debug}");
    }
}
