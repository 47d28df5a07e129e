//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The OAuth client secret is loaded from ANTIGRAVITY_CLIENT_SECRET or
//! client_secret_file, never stored in the TOML directly.

use antigravity_auth::DEFAULT_TOKEN_ENDPOINT;
use antigravity_quota::constants::{
    DEFAULT_PROBE_BASE_URL, DEFAULT_PROBE_DAILY_BASE_URL, DEFAULT_PROBE_MODELS,
    DEFAULT_QUOTA_ENDPOINTS,
};
use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const CLIENT_SECRET_ENV: &str = "ANTIGRAVITY_CLIENT_SECRET";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

/// Management API listener
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Credential store location. Without a path the service runs degraded.
#[derive(Debug, Default, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// OAuth client used to refresh expired access tokens
#[derive(Debug, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file containing the client secret (alternative to the env var)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,
}

/// Outbound calls to the quota API and probe hosts
#[derive(Debug, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub proxy_url: Option<String>,
    #[serde(default = "default_quota_endpoints")]
    pub quota_endpoints: Vec<String>,
    #[serde(default = "default_probe_base_url")]
    pub probe_base_url: String,
    #[serde(default = "default_probe_daily_base_url")]
    pub probe_daily_base_url: String,
    #[serde(default = "default_probe_models")]
    pub probe_models: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            proxy_url: None,
            quota_endpoints: default_quota_endpoints(),
            probe_base_url: default_probe_base_url(),
            probe_daily_base_url: default_probe_daily_base_url(),
            probe_models: default_probe_models(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8317))
}

fn default_max_connections() -> usize {
    64
}

fn default_timeout() -> u64 {
    10
}

fn default_token_endpoint() -> String {
    DEFAULT_TOKEN_ENDPOINT.to_string()
}

fn default_quota_endpoints() -> Vec<String> {
    DEFAULT_QUOTA_ENDPOINTS.iter().map(|s| s.to_string()).collect()
}

fn default_probe_base_url() -> String {
    DEFAULT_PROBE_BASE_URL.to_string()
}

fn default_probe_daily_base_url() -> String {
    DEFAULT_PROBE_DAILY_BASE_URL.to_string()
}

fn default_probe_models() -> Vec<String> {
    DEFAULT_PROBE_MODELS.iter().map(|s| s.to_string()).collect()
}

fn require_http_url(field: &str, url: &str) -> common::Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(common::Error::invalid(
            field,
            format!("must start with http:// or https://, got: {url}"),
        ))
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Client secret resolution order:
    /// 1. ANTIGRAVITY_CLIENT_SECRET env var
    /// 2. client_secret_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.validate()?;

        if let Ok(secret) = std::env::var(CLIENT_SECRET_ENV) {
            config.oauth.client_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.oauth.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                config.oauth.client_secret = Some(Secret::new(secret));
            }
        }

        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if self.server.max_connections == 0 {
            return Err(common::Error::invalid(
                "server.max_connections",
                "must be greater than 0",
            ));
        }
        if self.oauth.client_id.trim().is_empty() {
            return Err(common::Error::invalid("oauth.client_id", "must not be empty"));
        }
        require_http_url("oauth.token_endpoint", &self.oauth.token_endpoint)?;

        let upstream = &self.upstream;
        if upstream.timeout_secs == 0 {
            return Err(common::Error::invalid(
                "upstream.timeout_secs",
                "must be greater than 0",
            ));
        }
        if upstream.quota_endpoints.is_empty() {
            return Err(common::Error::invalid(
                "upstream.quota_endpoints",
                "must list at least one endpoint",
            ));
        }
        for endpoint in &upstream.quota_endpoints {
            require_http_url("upstream.quota_endpoints", endpoint)?;
        }
        require_http_url("upstream.probe_base_url", &upstream.probe_base_url)?;
        require_http_url(
            "upstream.probe_daily_base_url",
            &upstream.probe_daily_base_url,
        )?;
        if upstream.probe_models.is_empty() {
            return Err(common::Error::invalid(
                "upstream.probe_models",
                "must list at least one model",
            ));
        }
        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("antigravity-quota.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    const MINIMAL_TOML: &str = r#"
[credentials]
path = "/var/lib/antigravity/credentials.json"

[oauth]
client_id = "client-123.apps.googleusercontent.com"
"#;

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn load_str(contents: &str) -> common::Result<Config> {
        let dir = tempfile::tempdir().unwrap();
        Config::load(&write_config(&dir, contents))
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CLIENT_SECRET_ENV) };

        let config = load_str(MINIMAL_TOML).unwrap();
        assert_eq!(config.server.listen_addr, "127.0.0.1:8317".parse::<SocketAddr>().unwrap());
        assert_eq!(config.server.max_connections, 64);
        assert_eq!(
            config.credentials.path.as_deref(),
            Some(Path::new("/var/lib/antigravity/credentials.json"))
        );
        assert_eq!(config.oauth.token_endpoint, DEFAULT_TOKEN_ENDPOINT);
        assert!(config.oauth.client_secret.is_none());
        assert_eq!(config.upstream.timeout_secs, 10);
        assert!(config.upstream.proxy_url.is_none());
        assert_eq!(config.upstream.quota_endpoints.len(), 3);
        assert!(config.upstream.quota_endpoints[0].contains("daily-cloudcode-pa.googleapis.com"));
        assert!(config.upstream.quota_endpoints[2].starts_with("https://cloudcode-pa.googleapis.com"));
        assert_eq!(config.upstream.probe_models.len(), 8);
    }

    #[test]
    fn test_missing_credentials_section_is_allowed() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let config = load_str(
            r#"
[oauth]
client_id = "cid"
"#,
        )
        .unwrap();
        assert!(config.credentials.path.is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/path/config.toml"));
        assert!(matches!(result, Err(common::Error::Io(_))));
    }

    #[test]
    fn test_load_invalid_toml() {
        let result = load_str("not valid {{{{ toml");
        assert!(matches!(result, Err(common::Error::Toml(_))));
    }

    #[test]
    fn test_missing_oauth_section_rejected() {
        assert!(load_str("[server]\nmax_connections = 4\n").is_err());
    }

    #[test]
    fn test_custom_upstream() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let config = load_str(
            r#"
[oauth]
client_id = "cid"

[upstream]
timeout_secs = 3
proxy_url = "http://127.0.0.1:3128"
quota_endpoints = ["http://127.0.0.1:9000/v1internal:fetchAvailableModels"]
probe_models = ["gemini-2.5-pro"]
"#,
        )
        .unwrap();
        assert_eq!(config.upstream.timeout_secs, 3);
        assert_eq!(config.upstream.proxy_url.as_deref(), Some("http://127.0.0.1:3128"));
        assert_eq!(config.upstream.quota_endpoints.len(), 1);
        assert_eq!(config.upstream.probe_models, ["gemini-2.5-pro"]);
        assert_eq!(config.upstream.probe_base_url, DEFAULT_PROBE_BASE_URL);
    }

    #[test]
    fn test_client_secret_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env(CLIENT_SECRET_ENV, "env-secret") };
        let config = load_str(MINIMAL_TOML).unwrap();
        assert_eq!(
            config.oauth.client_secret.as_ref().unwrap().expose(),
            "env-secret"
        );
        unsafe { remove_env(CLIENT_SECRET_ENV) };
    }

    #[test]
    fn test_client_secret_from_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CLIENT_SECRET_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let secret_path = dir.path().join("client_secret");
        std::fs::write(&secret_path, "file-secret\n").unwrap();

        let path = write_config(
            &dir,
            &format!(
                r#"
[oauth]
client_id = "cid"
client_secret_file = "{}"
"#,
                secret_path.display()
            ),
        );
        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.oauth.client_secret.as_ref().unwrap().expose(),
            "file-secret"
        );
    }

    #[test]
    fn test_client_secret_env_overrides_missing_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env(CLIENT_SECRET_ENV, "env-wins") };
        let config = load_str(
            r#"
[oauth]
client_id = "cid"
client_secret_file = "/nonexistent/client_secret"
"#,
        )
        .unwrap();
        assert_eq!(config.oauth.client_secret.as_ref().unwrap().expose(), "env-wins");
        unsafe { remove_env(CLIENT_SECRET_ENV) };
    }

    #[test]
    fn test_client_secret_file_missing_is_error() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CLIENT_SECRET_ENV) };
        let err = load_str(
            r#"
[oauth]
client_id = "cid"
client_secret_file = "/nonexistent/client_secret"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("client_secret_file"), "got: {err}");
    }

    #[test]
    fn test_whitespace_secret_file_yields_none() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CLIENT_SECRET_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let secret_path = dir.path().join("client_secret");
        std::fs::write(&secret_path, "  \n ").unwrap();
        let path = write_config(
            &dir,
            &format!(
                "[oauth]\nclient_id = \"cid\"\nclient_secret_file = \"{}\"\n",
                secret_path.display()
            ),
        );
        assert!(Config::load(&path).unwrap().oauth.client_secret.is_none());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let cases = [
            ("[server]\nmax_connections = 0\n[oauth]\nclient_id = \"cid\"\n", "server.max_connections"),
            ("[oauth]\nclient_id = \"  \"\n", "oauth.client_id"),
            ("[oauth]\nclient_id = \"cid\"\ntoken_endpoint = \"oauth2.googleapis.com/token\"\n", "oauth.token_endpoint"),
            ("[oauth]\nclient_id = \"cid\"\n[upstream]\ntimeout_secs = 0\n", "upstream.timeout_secs"),
            ("[oauth]\nclient_id = \"cid\"\n[upstream]\nquota_endpoints = []\n", "upstream.quota_endpoints"),
            ("[oauth]\nclient_id = \"cid\"\n[upstream]\nquota_endpoints = [\"ftp://x\"]\n", "upstream.quota_endpoints"),
            ("[oauth]\nclient_id = \"cid\"\n[upstream]\nprobe_base_url = \"cloudcode\"\n", "upstream.probe_base_url"),
            ("[oauth]\nclient_id = \"cid\"\n[upstream]\nprobe_models = []\n", "upstream.probe_models"),
        ];
        for (toml, field) in cases {
            let err = load_str(toml).unwrap_err();
            assert!(
                matches!(err, common::Error::Config(_)) && err.to_string().contains(field),
                "expected {field} error, got: {err}"
            );
        }
    }

    #[test]
    fn test_resolve_path_cli_arg() {
        let path = Config::resolve_path(Some("/custom/path.toml"));
        assert_eq!(path, PathBuf::from("/custom/path.toml"));
    }

    #[test]
    fn test_resolve_path_env_var() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("/env/path.toml"));
        unsafe { remove_env("CONFIG_PATH") };
    }

    #[test]
    fn test_resolve_path_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CONFIG_PATH") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("antigravity-quota.toml"));
    }

    #[test]
    fn test_resolve_path_cli_overrides_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/should-lose.toml") };
        let path = Config::resolve_path(Some("/cli/wins.toml"));
        assert_eq!(path, PathBuf::from("/cli/wins.toml"));
        unsafe { remove_env("CONFIG_PATH") };
    }
}
