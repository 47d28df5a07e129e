//! `fetchAvailableModels` client
//!
//! The quota API has answered in two shapes over time:
//!
//! - listed: `{"models":[{"model":..,"rateLimit":{"rpmLimit":..,"remainingRpm":..}}]}`
//! - keyed:  `{"models":{"<name>":{"quotaInfo":{"remainingFraction":..}}}}`
//!
//! Both are accepted. Status classification happens before any decoding so
//! the fallback chain can match on `Error` kinds.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::constants::{BODY_PREVIEW_LIMIT, CLIENT_METADATA, GOOG_API_CLIENT, USER_AGENT};
use crate::error::{Error, Result};
use crate::model::ModelQuota;

/// Attach the Antigravity client identity and bearer token to a request.
pub(crate) fn with_client_headers(
    request: reqwest::RequestBuilder,
    access_token: &str,
) -> reqwest::RequestBuilder {
    request
        .bearer_auth(access_token)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .header("X-Goog-Api-Client", GOOG_API_CLIENT)
        .header("Client-Metadata", CLIENT_METADATA)
}

/// First `BODY_PREVIEW_LIMIT` bytes of a body, cut on a char boundary.
pub fn preview(body: &str) -> String {
    if body.len() <= BODY_PREVIEW_LIMIT {
        return body.to_string();
    }
    let mut end = BODY_PREVIEW_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[derive(Debug, Deserialize)]
struct ListedModels {
    models: Vec<ListedModel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListedModel {
    #[serde(default)]
    model: String,
    #[serde(default)]
    rate_limit: RateLimit,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RateLimit {
    #[serde(default)]
    rpm_limit: i64,
    #[serde(default)]
    remaining_rpm: i64,
    #[serde(default)]
    reset_time_stamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KeyedModels {
    models: BTreeMap<String, KeyedModel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyedModel {
    #[serde(default)]
    quota_info: Option<QuotaInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuotaInfo {
    #[serde(default)]
    remaining_fraction: Option<f64>,
    #[serde(default)]
    reset_time: Option<String>,
}

/// A decoded `fetchAvailableModels` body.
#[derive(Debug)]
enum ModelsPayload {
    Listed(Vec<ListedModel>),
    Keyed(BTreeMap<String, KeyedModel>),
}

impl ModelsPayload {
    /// Try the listed shape, then the keyed shape. A shape only counts when
    /// it carries at least one model.
    fn decode(body: &str) -> Option<Self> {
        if let Ok(listed) = serde_json::from_str::<ListedModels>(body)
            && !listed.models.is_empty()
        {
            return Some(ModelsPayload::Listed(listed.models));
        }
        if let Ok(keyed) = serde_json::from_str::<KeyedModels>(body)
            && !keyed.models.is_empty()
        {
            return Some(ModelsPayload::Keyed(keyed.models));
        }
        None
    }

    fn into_quotas(self) -> Vec<ModelQuota> {
        match self {
            ModelsPayload::Listed(models) => models
                .into_iter()
                .filter(|m| m.rate_limit.rpm_limit != 0)
                .map(|m| {
                    let percent =
                        m.rate_limit.remaining_rpm as f64 / m.rate_limit.rpm_limit as f64 * 100.0;
                    ModelQuota::new(m.model, percent, m.rate_limit.reset_time_stamp)
                })
                .collect(),
            ModelsPayload::Keyed(models) => models
                .into_iter()
                .filter_map(|(name, m)| {
                    let info = m.quota_info?;
                    let fraction = info.remaining_fraction?;
                    Some(ModelQuota::new(name, fraction * 100.0, info.reset_time))
                })
                .collect(),
        }
    }
}

/// Decode a 200 body into model quotas.
pub fn parse_models(body: &str) -> Result<Vec<ModelQuota>> {
    ModelsPayload::decode(body)
        .map(ModelsPayload::into_quotas)
        .ok_or_else(|| Error::Parse(preview(body)))
}

/// Client for the quota API across its candidate endpoints.
#[derive(Debug, Clone)]
pub struct QuotaClient {
    http: reqwest::Client,
    endpoints: Vec<String>,
}

impl QuotaClient {
    pub fn new(http: reqwest::Client, endpoints: Vec<String>) -> Self {
        Self { http, endpoints }
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Query one endpoint.
    pub async fn fetch(
        &self,
        endpoint: &str,
        email: &str,
        project_id: &str,
        access_token: &str,
    ) -> Result<Vec<ModelQuota>> {
        debug!(email, project_id, endpoint, "fetching available models");
        let response = with_client_headers(self.http.post(endpoint), access_token)
            .body("{}")
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Http(format!("read response body: {e}")))?;

        match status {
            reqwest::StatusCode::OK => {}
            reqwest::StatusCode::UNAUTHORIZED => return Err(Error::Unauthorized),
            reqwest::StatusCode::FORBIDDEN => return Err(Error::Forbidden(body)),
            reqwest::StatusCode::NOT_FOUND => return Err(Error::NotFound),
            other => {
                return Err(Error::Upstream {
                    status: other.as_u16(),
                    body: preview(&body),
                });
            }
        }

        let quotas = parse_models(&body)?;
        debug!(email, endpoint, models = quotas.len(), "quota fetched");
        Ok(quotas)
    }

    /// Walk the candidate endpoints in order.
    ///
    /// Only `NotFound` moves on to the next candidate; any other failure is
    /// returned immediately. When every candidate answers 404 the last
    /// `NotFound` is returned.
    pub async fn fetch_with_fallback(
        &self,
        email: &str,
        project_id: &str,
        access_token: &str,
    ) -> Result<Vec<ModelQuota>> {
        let mut last_error = Error::NotFound;
        for endpoint in &self.endpoints {
            match self.fetch(endpoint, email, project_id, access_token).await {
                Ok(quotas) => return Ok(quotas),
                Err(e) => {
                    metrics::counter!("quota_upstream_errors_total", "kind" => e.kind())
                        .increment(1);
                    if !matches!(e, Error::NotFound) {
                        return Err(e);
                    }
                    warn!(email, endpoint, "endpoint not found, trying next candidate");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}
