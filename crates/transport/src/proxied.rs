//! Client provider with an optional upstream proxy.
//!
//! Without a proxy URL the client uses reqwest's defaults (system proxy
//! environment variables are honoured). With one, all traffic is routed
//! through it.

use std::time::Duration;

use tracing::debug;

use crate::{ClientProvider, Error, Result};

/// Builds rustls-backed clients, optionally routed through a fixed proxy.
#[derive(Debug, Clone, Default)]
pub struct ProxiedClientProvider {
    proxy_url: Option<String>,
}

impl ProxiedClientProvider {
    pub fn new(proxy_url: Option<String>) -> Self {
        Self {
            proxy_url: proxy_url.filter(|u| !u.trim().is_empty()),
        }
    }

    /// Provider that never configures a proxy.
    pub fn direct() -> Self {
        Self { proxy_url: None }
    }

    pub fn proxy_url(&self) -> Option<&str> {
        self.proxy_url.as_deref()
    }
}

impl ClientProvider for ProxiedClientProvider {
    fn id(&self) -> &str {
        if self.proxy_url.is_some() {
            "proxied"
        } else {
            "direct"
        }
    }

    fn build(&self, timeout: Duration) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder().timeout(timeout);

        if let Some(url) = &self.proxy_url {
            let proxy = reqwest::Proxy::all(url).map_err(|e| Error::InvalidProxy {
                url: url.clone(),
                reason: e.to_string(),
            })?;
            builder = builder.proxy(proxy);
        }

        debug!(
            provider = self.id(),
            timeout_secs = timeout.as_secs(),
            "building http client"
        );
        builder.build().map_err(|e| Error::Build(e.to_string()))
    }
}
