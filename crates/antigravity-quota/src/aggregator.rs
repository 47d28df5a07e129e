//! Concurrent fan-out over selected accounts
//!
//! One task per account, all spawned before any result is awaited. Each task
//! owns a sender clone and sends exactly one `AccountQuota`; the channel
//! closes when the last sender drops, which is the collector's barrier.

use std::sync::Arc;
use std::time::Instant;

use antigravity_auth::{CredentialSource, SelectedAccount, select_accounts};
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::model::{AccountQuota, QuotaReport};
use crate::resolver::AccountResolver;

/// Resolves every account and builds the report.
#[derive(Clone)]
pub struct Aggregator {
    resolver: Arc<dyn AccountResolver>,
}

impl Aggregator {
    pub fn new(resolver: Arc<dyn AccountResolver>) -> Self {
        Self { resolver }
    }

    /// List the store, select Antigravity accounts, and aggregate them.
    ///
    /// Fails only when the store cannot be listed.
    pub async fn report(
        &self,
        store: &dyn CredentialSource,
    ) -> antigravity_auth::Result<QuotaReport> {
        let records = store.list().await?;
        let accounts = select_accounts(&records, Utc::now());
        debug!(
            records = records.len(),
            selected = accounts.len(),
            "selected accounts for quota report"
        );
        Ok(self.aggregate(accounts).await)
    }

    /// Resolve all accounts concurrently. Results keep arrival order.
    pub async fn aggregate(&self, accounts: Vec<SelectedAccount>) -> QuotaReport {
        let started = Instant::now();
        let (tx, mut rx) = mpsc::channel(accounts.len().max(1));

        for account in accounts {
            let tx = tx.clone();
            let resolver = self.resolver.clone();
            tokio::spawn(async move {
                let email = account.email().to_string();
                let project_id = account.project_id().to_string();
                // Inner task so a panic surfaces as a JoinError instead of a lost result
                let quota = match tokio::spawn(async move { resolver.resolve(&account).await }).await {
                    Ok(quota) => quota,
                    Err(e) => {
                        error!(email, error = %e, "account resolution task failed");
                        AccountQuota::error(
                            &email,
                            &project_id,
                            format!("resolution task failed: {e}"),
                        )
                    }
                };
                // Receiver outlives every sender; a send error means the caller went away
                let _ = tx.send(quota).await;
            });
        }
        drop(tx);

        let mut results = Vec::new();
        while let Some(quota) = rx.recv().await {
            metrics::counter!("quota_accounts_total", "status" => quota.status.as_str())
                .increment(1);
            results.push(quota);
        }

        let report = QuotaReport::from_accounts(results);
        let elapsed = started.elapsed();
        metrics::histogram!("quota_aggregation_duration_seconds").record(elapsed.as_secs_f64());
        info!(
            total = report.total_accounts,
            active = report.active_accounts,
            inactive = report.inactive_accounts,
            error = report.error_accounts,
            duration_ms = elapsed.as_millis() as u64,
            "quota report complete"
        );
        report
    }
}
