//! Per-account resolution pipeline
//!
//! Every path through `Resolver::resolve` ends in an `AccountQuota`; errors
//! are folded into its `status` and `error` fields here and never escape.

use std::future::Future;
use std::pin::Pin;

use antigravity_auth::{SelectedAccount, TokenLifecycle};
use tracing::{debug, info, warn};

use crate::endpoint::{QuotaClient, preview};
use crate::error::Error;
use crate::model::AccountQuota;
use crate::probe::HeaderProbe;

/// Something that turns one selected account into its quota result.
///
/// Returns a boxed future so the aggregator can hold `Arc<dyn AccountResolver>`.
pub trait AccountResolver: Send + Sync {
    fn resolve<'a>(
        &'a self,
        account: &'a SelectedAccount,
    ) -> Pin<Box<dyn Future<Output = AccountQuota> + Send + 'a>>;
}

/// Token lifecycle, endpoint chain, then header probe on 403.
pub struct Resolver {
    lifecycle: TokenLifecycle,
    quota: QuotaClient,
    probe: HeaderProbe,
}

impl Resolver {
    pub fn new(lifecycle: TokenLifecycle, quota: QuotaClient, probe: HeaderProbe) -> Self {
        Self {
            lifecycle,
            quota,
            probe,
        }
    }

    /// Resolve one account.
    pub async fn resolve_account(&self, account: &SelectedAccount) -> AccountQuota {
        let email = account.email();
        let project_id = account.project_id();

        let token = match self.lifecycle.ensure_access_token(account).await {
            Ok(token) => token,
            Err(antigravity_auth::Error::NoRefreshToken) => {
                return AccountQuota::inactive(
                    email,
                    project_id,
                    "Access token expired and no refresh token available",
                );
            }
            Err(antigravity_auth::Error::RefreshFailed(cause)) => {
                return AccountQuota::inactive(
                    email,
                    project_id,
                    format!("Token refresh failed: {cause}"),
                );
            }
            // Token endpoint unreachable
            Err(e) => {
                return AccountQuota::inactive(
                    email,
                    project_id,
                    format!("Token refresh failed: {e}"),
                );
            }
        };

        match self
            .quota
            .fetch_with_fallback(email, project_id, token.expose())
            .await
        {
            Ok(quotas) => {
                debug!(email, models = quotas.len(), "account active");
                AccountQuota::active(email, project_id, quotas)
            }
            Err(Error::Unauthorized) => {
                warn!(email, "quota API rejected access token");
                AccountQuota::inactive(email, project_id, "Access token expired. Please re-login")
            }
            Err(Error::Forbidden(body)) => {
                info!(email, "quota API forbidden, falling back to header probe");
                match self.probe.probe(email, project_id, token.expose()).await {
                    Ok(quotas) => AccountQuota::active(email, project_id, quotas),
                    Err(e) => {
                        warn!(email, error = %e, "header probe fallback failed");
                        AccountQuota::error(
                            email,
                            project_id,
                            format!(
                                "access forbidden ({}); header fallback failed: {e}",
                                preview(&body)
                            ),
                        )
                    }
                }
            }
            Err(e) => {
                warn!(email, error = %e, "quota fetch failed");
                AccountQuota::error(email, project_id, e.to_string())
            }
        }
    }
}

impl AccountResolver for Resolver {
    fn resolve<'a>(
        &'a self,
        account: &'a SelectedAccount,
    ) -> Pin<Box<dyn Future<Output = AccountQuota> + Send + 'a>> {
        Box::pin(self.resolve_account(account))
    }
}
