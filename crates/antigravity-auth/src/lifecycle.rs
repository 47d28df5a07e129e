//! Access-token lifecycle for a selected account
//!
//! Transitions per account:
//! - not expired → stored token is used as-is
//! - expired, refresh token present → refresh, use the new token, persist it
//! - expired, no refresh token → `NoRefreshToken`, the caller reports the
//!   account inactive without calling the quota API
//! - refresh rejected or unreachable → `RefreshFailed` or `Http` as returned
//!   by the token exchange
//!
//! Persisting is best-effort: a failed store write is logged and the freshly
//! issued token is still returned for the current resolution.

use std::sync::Arc;

use chrono::{Duration, SecondsFormat, Utc};
use common::Secret;
use tracing::{debug, info, warn};

use crate::constants::attr;
use crate::credentials::CredentialSource;
use crate::error::{Error, Result};
use crate::selector::SelectedAccount;
use crate::token::{OAuthClient, refresh_token};

/// Refreshes expired tokens and writes them back to the credential store.
pub struct TokenLifecycle {
    http_client: reqwest::Client,
    oauth: OAuthClient,
    store: Arc<dyn CredentialSource>,
}

impl TokenLifecycle {
    pub fn new(
        http_client: reqwest::Client,
        oauth: OAuthClient,
        store: Arc<dyn CredentialSource>,
    ) -> Self {
        Self {
            http_client,
            oauth,
            store,
        }
    }

    /// Return a token that is valid for this request.
    pub async fn ensure_access_token(&self, account: &SelectedAccount) -> Result<Secret<String>> {
        let credential = &account.credential;
        if !account.expired {
            debug!(email = credential.email, "using stored access token");
            return Ok(credential.access_token.clone());
        }

        let Some(refresh) = &credential.refresh_token else {
            warn!(email = credential.email, "token expired and no refresh token");
            metrics::counter!("quota_token_refresh_total", "outcome" => "missing").increment(1);
            return Err(Error::NoRefreshToken);
        };

        info!(email = credential.email, "access token expired, refreshing");
        let token = match refresh_token(&self.http_client, &self.oauth, refresh.expose()).await {
            Ok(token) => token,
            Err(e) => {
                warn!(email = credential.email, error = %e, "token refresh failed");
                metrics::counter!("quota_token_refresh_total", "outcome" => "failed").increment(1);
                return Err(e);
            }
        };
        metrics::counter!("quota_token_refresh_total", "outcome" => "refreshed").increment(1);
        info!(
            email = credential.email,
            expires_in = token.expires_in,
            "token refresh succeeded"
        );

        if let Err(e) = self
            .persist(&credential.record_id, &token.access_token, token.expires_in)
            .await
        {
            warn!(
                email = credential.email,
                record_id = credential.record_id,
                error = %e,
                "failed to persist refreshed token"
            );
        }

        Ok(Secret::new(token.access_token))
    }

    /// Write a renewed token and its expiry into the stored record.
    pub async fn persist(&self, record_id: &str, access_token: &str, expires_in: i64) -> Result<()> {
        let mut record = self
            .store
            .get_by_id(record_id)
            .await
            .ok_or_else(|| Error::NotFound(format!("record {record_id} not in credential store")))?;

        let now = Utc::now();
        let expiry = Duration::try_seconds(expires_in)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or(Error::InvalidExpiry(expires_in))?;
        record.set_attr(attr::ACCESS_TOKEN, access_token);
        record.set_attr(attr::EXPIRES_IN, expires_in);
        record.set_attr(attr::TIMESTAMP, now.timestamp_millis());
        record.set_attr(
            attr::EXPIRED,
            expiry.to_rfc3339_opts(SecondsFormat::Secs, true),
        );

        self.store.update(record).await?;
        debug!(record_id, "persisted refreshed token");
        Ok(())
    }
}
