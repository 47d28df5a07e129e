//! Credential selection for quota resolution
//!
//! Records are resolved once into a `Credential` variant. The provider tag can
//! sit either in the record's direct `provider` field or in the `type`
//! attribute; after resolution nothing downstream looks at raw attributes.

use chrono::{DateTime, Utc};
use common::Secret;
use tracing::{debug, warn};

use crate::constants::{PROVIDER_TAG, attr};
use crate::credentials::CredentialRecord;

/// Provider a credential record belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    Antigravity,
    Other(String),
    Untagged,
}

impl Provider {
    /// Antigravity when either the direct field or the `type` attribute says
    /// so. Otherwise the first non-empty tag of the two.
    pub fn of(record: &CredentialRecord) -> Self {
        let direct = record.provider.as_deref().filter(|p| !p.is_empty());
        let typed = record.attr_str(attr::TYPE).filter(|t| !t.is_empty());
        if direct == Some(PROVIDER_TAG) || typed == Some(PROVIDER_TAG) {
            return Provider::Antigravity;
        }
        match direct.or(typed) {
            Some(tag) => Provider::Other(tag.to_string()),
            None => Provider::Untagged,
        }
    }
}

/// A credential record resolved to its provider.
#[derive(Debug)]
pub enum Credential {
    Antigravity(AntigravityCredential),
    Other { record_id: String, provider: Provider },
}

/// Fields of an Antigravity record that the quota pipeline uses.
#[derive(Debug, Clone)]
pub struct AntigravityCredential {
    pub record_id: String,
    pub email: String,
    pub project_id: String,
    pub access_token: Secret<String>,
    pub refresh_token: Option<Secret<String>>,
    /// Parsed `expired` attribute. None when absent or unparseable.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn resolve(record: &CredentialRecord) -> Self {
        let provider = Provider::of(record);
        if provider != Provider::Antigravity {
            return Credential::Other {
                record_id: record.id.clone(),
                provider,
            };
        }

        let email = record.attr_str(attr::EMAIL).unwrap_or_default().to_string();
        let expires_at = parse_expiry(&email, record.attr_str(attr::EXPIRED));

        Credential::Antigravity(AntigravityCredential {
            record_id: record.id.clone(),
            project_id: record
                .attr_str(attr::PROJECT_ID)
                .unwrap_or_default()
                .to_string(),
            access_token: Secret::new(
                record
                    .attr_str(attr::ACCESS_TOKEN)
                    .unwrap_or_default()
                    .to_string(),
            ),
            refresh_token: record
                .attr_str(attr::REFRESH_TOKEN)
                .filter(|t| !t.is_empty())
                .map(|t| Secret::new(t.to_string())),
            email,
            expires_at,
        })
    }
}

/// Parse the RFC3339 expiry marker.
///
/// A malformed marker is logged and treated as absent, which makes the token
/// count as still valid.
fn parse_expiry(email: &str, raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = match raw {
        Some(r) if !r.is_empty() => r,
        _ => {
            debug!(email, "no expiry marker, treating token as valid");
            return None;
        }
    };
    match DateTime::parse_from_rfc3339(raw) {
        Ok(t) => Some(t.with_timezone(&Utc)),
        Err(e) => {
            warn!(email, value = raw, error = %e, "failed to parse token expiry, treating token as valid");
            None
        }
    }
}

/// An account chosen for resolution, with its expiry already decided.
#[derive(Debug, Clone)]
pub struct SelectedAccount {
    pub credential: AntigravityCredential,
    pub expired: bool,
}

impl SelectedAccount {
    pub fn email(&self) -> &str {
        &self.credential.email
    }

    pub fn project_id(&self) -> &str {
        &self.credential.project_id
    }
}

/// Pick the Antigravity accounts that carry an access token.
///
/// `expired` is computed against `now`. No network calls happen here.
pub fn select_accounts(records: &[CredentialRecord], now: DateTime<Utc>) -> Vec<SelectedAccount> {
    records
        .iter()
        .filter_map(|record| match Credential::resolve(record) {
            Credential::Antigravity(credential) => Some(credential),
            Credential::Other { .. } => None,
        })
        .filter(|credential| {
            if credential.access_token.is_empty() {
                debug!(email = credential.email, "skipping account without access token");
                false
            } else {
                true
            }
        })
        .map(|credential| {
            let expired = credential.expires_at.is_some_and(|t| now > t);
            debug!(
                email = credential.email,
                expired,
                has_refresh_token = credential.refresh_token.is_some(),
                "selected account"
            );
            SelectedAccount {
                credential,
                expired,
            }
        })
        .collect()
}
