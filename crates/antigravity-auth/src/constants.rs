//! Antigravity OAuth and credential-record constants
//!
//! The OAuth client id and secret come from configuration.

/// Provider tag carried by Antigravity credential records.
pub const PROVIDER_TAG: &str = "antigravity";

/// Google OAuth token endpoint used for refresh-token exchange.
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Attribute keys inside a credential record's free-form map.
pub mod attr {
    pub const TYPE: &str = "type";
    pub const EMAIL: &str = "email";
    pub const PROJECT_ID: &str = "project_id";
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    /// RFC3339 expiry of the access token.
    pub const EXPIRED: &str = "expired";
    pub const EXPIRES_IN: &str = "expires_in";
    /// Unix milliseconds when the current access token was issued.
    pub const TIMESTAMP: &str = "timestamp";
}
