//! Rate-limit header probe
//!
//! Used when the quota API answers 403. Each known model gets a minimal
//! `generateContent` call (one input word, one output token) and the
//! `X-RateLimit-*` response headers are read back as quota. The response
//! status is not inspected: rejected calls often still carry the headers.

use reqwest::header::HeaderMap;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::constants::{
    DAILY_RING_MARKER, GENERATE_CONTENT_PATH, RATE_LIMIT_LIMIT, RATE_LIMIT_REMAINING,
    RATE_LIMIT_RESET,
};
use crate::endpoint::with_client_headers;
use crate::error::{Error, Result};
use crate::model::ModelQuota;

/// Derive a model's quota from rate-limit headers.
///
/// None when the limit or remaining header is missing, either value does not
/// parse as an integer, or the limit is not positive.
pub fn quota_from_headers(model: &str, headers: &HeaderMap) -> Option<ModelQuota> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim);

    let limit: i64 = header(RATE_LIMIT_LIMIT)?.parse().ok()?;
    let remaining: i64 = header(RATE_LIMIT_REMAINING)?.parse().ok()?;
    if limit <= 0 {
        return None;
    }
    let reset = header(RATE_LIMIT_RESET).map(str::to_string);
    Some(ModelQuota::new(
        model,
        remaining as f64 / limit as f64 * 100.0,
        reset,
    ))
}

/// Probes `generateContent` for rate-limit headers.
#[derive(Debug, Clone)]
pub struct HeaderProbe {
    http: reqwest::Client,
    base_url: String,
    daily_base_url: String,
    models: Vec<String>,
}

impl HeaderProbe {
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        daily_base_url: String,
        models: Vec<String>,
    ) -> Self {
        Self {
            http,
            base_url,
            daily_base_url,
            models,
        }
    }

    /// Daily-ring accounts are probed against the daily host.
    pub fn base_url_for(&self, email: &str, project_id: &str) -> &str {
        if email.contains(DAILY_RING_MARKER) || project_id.contains(DAILY_RING_MARKER) {
            &self.daily_base_url
        } else {
            &self.base_url
        }
    }

    /// Probe every configured model in order.
    ///
    /// Models that yield no headers are skipped; fails with `NoHeaderData`
    /// only when none did.
    pub async fn probe(
        &self,
        email: &str,
        project_id: &str,
        access_token: &str,
    ) -> Result<Vec<ModelQuota>> {
        let url = format!(
            "{}{}",
            self.base_url_for(email, project_id).trim_end_matches('/'),
            GENERATE_CONTENT_PATH
        );

        let mut quotas = Vec::new();
        for model in &self.models {
            match self
                .probe_model(&url, project_id, access_token, model)
                .await
            {
                Ok(Some(quota)) => {
                    debug!(
                        email,
                        model,
                        remaining_percent = quota.remaining_percent,
                        "probed quota from headers"
                    );
                    quotas.push(quota);
                }
                Ok(None) => debug!(email, model, "no rate-limit headers"),
                Err(e) => {
                    metrics::counter!("quota_upstream_errors_total", "kind" => e.kind())
                        .increment(1);
                    warn!(email, model, error = %e, "header probe request failed");
                }
            }
        }

        if quotas.is_empty() {
            return Err(Error::NoHeaderData(format!(
                "probed {} models at {url}",
                self.models.len()
            )));
        }
        info!(email, models = quotas.len(), "header probe succeeded");
        Ok(quotas)
    }

    async fn probe_model(
        &self,
        url: &str,
        project_id: &str,
        access_token: &str,
        model: &str,
    ) -> Result<Option<ModelQuota>> {
        let body = json!({
            "model": model,
            "project": project_id,
            "requestId": format!("quota-check-{}", uuid::Uuid::new_v4()),
            "userAgent": "antigravity",
            "request": {
                "contents": [{"role": "user", "parts": [{"text": "hi"}]}],
                "generationConfig": {"temperature": 0.1, "maxOutputTokens": 1},
                "sessionId": uuid::Uuid::new_v4().to_string(),
            },
        });

        let response = with_client_headers(self.http.post(url), access_token)
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        debug!(model, status = %response.status(), "probe response");
        Ok(quota_from_headers(model, response.headers()))
    }
}
