//! Cloud Code endpoints, client identity headers, and probe defaults

/// Candidate `fetchAvailableModels` endpoints, tried in order.
pub const DEFAULT_QUOTA_ENDPOINTS: [&str; 3] = [
    "https://daily-cloudcode-pa.googleapis.com/v1internal:fetchAvailableModels",
    "https://daily-cloudcode-pa.sandbox.googleapis.com/v1internal:fetchAvailableModels",
    "https://cloudcode-pa.googleapis.com/v1internal:fetchAvailableModels",
];

/// Base URL for header probes on the production ring.
pub const DEFAULT_PROBE_BASE_URL: &str = "https://cloudcode-pa.googleapis.com";

/// Base URL for header probes when the account belongs to the daily ring.
pub const DEFAULT_PROBE_DAILY_BASE_URL: &str = "https://daily-cloudcode-pa.googleapis.com";

/// Substring in the email or project id that marks a daily-ring account.
pub const DAILY_RING_MARKER: &str = "daily";

/// Path appended to the probe base URL.
pub const GENERATE_CONTENT_PATH: &str = "/v1internal:generateContent";

/// Models probed when the quota API is forbidden.
pub const DEFAULT_PROBE_MODELS: [&str; 8] = [
    "gemini-2.5-pro",
    "gemini-2.5-flash",
    "gemini-2.0-flash",
    "gemini-2.0-flash-lite",
    "gemini-exp-1206",
    "gemini-claude-sonnet-4-5",
    "gemini-claude-opus-4-5",
    "imagen-3.0-generate-002",
];

pub const USER_AGENT: &str = "antigravity/1.104.0 darwin/arm64";
pub const GOOG_API_CLIENT: &str = "google-cloud-sdk vscode_cloudeshelleditor/0.1";
pub const CLIENT_METADATA: &str =
    r#"{"ideType":"IDE_UNSPECIFIED","platform":"PLATFORM_UNSPECIFIED","pluginType":"GEMINI"}"#;

/// Rate-limit headers read by the probe.
pub const RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

/// Maximum bytes of an upstream body quoted in error messages.
pub const BODY_PREVIEW_LIMIT: usize = 500;
