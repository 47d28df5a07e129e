//! Report data model
//!
//! Serialized field names are part of the management API contract.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Terminal status of one account's resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    /// Quota data was obtained. The quota list may still be empty.
    Active,
    /// The account cannot be queried with its current credentials.
    Inactive,
    /// Resolution failed for reasons other than credentials.
    Error,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
            AccountStatus::Error => "error",
        }
    }
}

/// Remaining quota for one model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelQuota {
    pub model: String,
    pub display_name: String,
    /// Percentage in `[0, 100]`.
    pub remaining_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_time: Option<String>,
}

impl ModelQuota {
    /// Build a quota entry, clamping the percentage and dropping an empty reset time.
    pub fn new(model: impl Into<String>, remaining_percent: f64, reset_time: Option<String>) -> Self {
        let model = model.into();
        let display_name = crate::display_name(&model).to_string();
        Self {
            model,
            display_name,
            remaining_percent: remaining_percent.clamp(0.0, 100.0),
            reset_time: reset_time.filter(|t| !t.is_empty()),
        }
    }
}

/// Result for one account.
#[derive(Debug, Clone, Serialize)]
pub struct AccountQuota {
    pub email: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub project_id: String,
    pub status: AccountStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub model_quotas: Vec<ModelQuota>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl AccountQuota {
    pub fn active(email: &str, project_id: &str, model_quotas: Vec<ModelQuota>) -> Self {
        Self {
            email: email.to_string(),
            project_id: project_id.to_string(),
            status: AccountStatus::Active,
            model_quotas,
            error: None,
            last_updated: Utc::now(),
        }
    }

    pub fn inactive(email: &str, project_id: &str, error: impl Into<String>) -> Self {
        Self::failed(email, project_id, AccountStatus::Inactive, error.into())
    }

    pub fn error(email: &str, project_id: &str, error: impl Into<String>) -> Self {
        Self::failed(email, project_id, AccountStatus::Error, error.into())
    }

    fn failed(email: &str, project_id: &str, status: AccountStatus, error: String) -> Self {
        Self {
            email: email.to_string(),
            project_id: project_id.to_string(),
            status,
            model_quotas: Vec::new(),
            error: Some(error),
            last_updated: Utc::now(),
        }
    }
}

/// Aggregate over all selected accounts.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaReport {
    pub accounts: Vec<AccountQuota>,
    pub total_accounts: usize,
    pub active_accounts: usize,
    pub inactive_accounts: usize,
    pub error_accounts: usize,
    pub last_updated: DateTime<Utc>,
}

impl QuotaReport {
    /// Build a report, counting accounts by status.
    pub fn from_accounts(accounts: Vec<AccountQuota>) -> Self {
        let count = |status| accounts.iter().filter(|a| a.status == status).count();
        let active_accounts = count(AccountStatus::Active);
        let inactive_accounts = count(AccountStatus::Inactive);
        let error_accounts = count(AccountStatus::Error);
        Self {
            total_accounts: accounts.len(),
            active_accounts,
            inactive_accounts,
            error_accounts,
            accounts,
            last_updated: Utc::now(),
        }
    }
}
