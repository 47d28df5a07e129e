//! Outbound HTTP client construction
//!
//! Every upstream call in the quota pipeline (OAuth refresh, quota listing,
//! header probes) goes through a `reqwest::Client` obtained from a
//! `ClientProvider`. The provider owns proxy and TLS settings so callers only
//! decide the per-client timeout.

pub mod proxied;

pub use proxied::ProxiedClientProvider;

use std::time::Duration;

/// Errors from building an HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid proxy url {url}: {reason}")]
    InvalidProxy { url: String, reason: String },

    #[error("failed to build http client: {0}")]
    Build(String),
}

/// Result alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Source of pre-configured HTTP clients.
///
/// Implementations apply proxy/TLS settings to a fresh client builder and
/// stamp the requested timeout on every request the client sends.
pub trait ClientProvider: Send + Sync {
    /// Identifier for logging (e.g. "direct", "proxied").
    fn id(&self) -> &str;

    /// Build a client whose requests time out after `timeout`.
    fn build(&self, timeout: Duration) -> Result<reqwest::Client>;
}
