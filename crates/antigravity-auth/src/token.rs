//! OAuth refresh-token exchange
//!
//! Antigravity accounts authenticate through Google's OAuth token endpoint.
//! Only the refresh grant is used here; the initial authorization happens in
//! whatever tool wrote the credential record.

use common::Secret;
use serde::Deserialize;

use crate::error::{Error, Result};

/// OAuth client registration used for refresh, injected from configuration.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub token_endpoint: String,
}

/// Response from the token endpoint.
///
/// `expires_in` is a delta in seconds from the response time.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Exchange a refresh token for a new access token.
///
/// Any non-200 answer or an undecodable body is `RefreshFailed`; transport
/// errors (including the client timeout) are `Http`.
pub async fn refresh_token(
    client: &reqwest::Client,
    oauth: &OAuthClient,
    refresh: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(&oauth.token_endpoint)
        .form(&[
            ("client_id", oauth.client_id.as_str()),
            ("client_secret", oauth.client_secret.expose().as_str()),
            ("refresh_token", refresh),
            ("grant_type", "refresh_token"),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(e.to_string()))?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::RefreshFailed(format!("status {status}: {body}")));
    }

    let token = response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::RefreshFailed(format!("invalid refresh response: {e}")))?;

    if token.access_token.is_empty() {
        return Err(Error::RefreshFailed(
            "token endpoint returned an empty access token".into(),
        ));
    }
    Ok(token)
}
