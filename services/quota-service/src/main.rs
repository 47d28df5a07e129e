//! Antigravity Quota Service
//!
//! Single-binary management service that:
//! 1. Reads Antigravity OAuth credentials from a JSON credential store
//! 2. Refreshes expired access tokens and writes them back
//! 3. Queries remaining model quota for every account concurrently
//! 4. Serves the aggregated report on `/v0/management/antigravity-quota`

mod config;
mod error;
mod metrics;

use anyhow::{Context, Result};
use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use antigravity_auth::{CredentialSource, FileCredentialStore, OAuthClient, TokenLifecycle};
use antigravity_quota::{Aggregator, HeaderProbe, QuotaClient, QuotaReport, Resolver};
use common::Secret;
use metrics_exporter_prometheus::PrometheusHandle;
use transport::{ClientProvider, ProxiedClientProvider};

use crate::config::Config;

/// Upper bound on draining in-flight requests after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Credential store plus the aggregator that reads it.
#[derive(Clone)]
struct QuotaBackend {
    store: Arc<dyn CredentialSource>,
    aggregator: Aggregator,
}

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    backend: Option<QuotaBackend>,
    started_at: Instant,
    prometheus: PrometheusHandle,
}

/// Build the axum router with all routes and shared state.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/v0/management/antigravity-quota", get(quota_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

/// Wire the credential store to the quota pipeline.
fn build_backend(
    config: &Config,
    http: reqwest::Client,
    store: Arc<dyn CredentialSource>,
) -> QuotaBackend {
    let oauth = OAuthClient {
        client_id: config.oauth.client_id.clone(),
        client_secret: config
            .oauth
            .client_secret
            .clone()
            .unwrap_or_else(|| Secret::new(String::new())),
        token_endpoint: config.oauth.token_endpoint.clone(),
    };
    let upstream = &config.upstream;
    let resolver = Resolver::new(
        TokenLifecycle::new(http.clone(), oauth, store.clone()),
        QuotaClient::new(http.clone(), upstream.quota_endpoints.clone()),
        HeaderProbe::new(
            http,
            upstream.probe_base_url.clone(),
            upstream.probe_daily_base_url.clone(),
            upstream.probe_models.clone(),
        ),
    );
    QuotaBackend {
        store,
        aggregator: Aggregator::new(Arc::new(resolver)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs, filter from LOG_LEVEL then RUST_LOG
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting antigravity-quota-service");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle =
        metrics::install_recorder().context("failed to install Prometheus recorder")?;

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        quota_endpoints = config.upstream.quota_endpoints.len(),
        probe_models = config.upstream.probe_models.len(),
        timeout_secs = config.upstream.timeout_secs,
        "configuration loaded"
    );
    if config.oauth.client_secret.is_none() {
        warn!("no OAuth client secret configured, token refresh will be rejected");
    }

    let provider = ProxiedClientProvider::new(config.upstream.proxy_url.clone());
    let http = provider
        .build(Duration::from_secs(config.upstream.timeout_secs))
        .context("failed to build upstream HTTP client")?;
    info!(
        transport = provider.id(),
        proxied = provider.proxy_url().is_some(),
        "upstream client ready"
    );

    let backend = match &config.credentials.path {
        Some(path) => {
            let store = FileCredentialStore::load(path.clone())
                .await
                .with_context(|| format!("failed to load credentials from {}", path.display()))?;
            info!(
                path = %path.display(),
                records = store.len().await?,
                "credential store loaded"
            );
            Some(build_backend(&config, http, Arc::new(store)))
        }
        None => {
            warn!("no credentials.path configured, quota endpoint will return 503");
            None
        }
    };

    let app_state = AppState {
        backend,
        started_at: Instant::now(),
        prometheus: prometheus_handle,
    };
    let app = build_router(app_state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // Drain timeout starts at signal receipt, not at server start
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => info!("all in-flight requests drained"),
        Ok(Ok(Err(e))) => error!(error = %e, "server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "server task panicked"),
        Err(_) => warn!(
            drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "drain timeout exceeded, forcing shutdown"
        ),
    }

    info!("shutdown complete");
    Ok(())
}

/// Aggregated quota for every Antigravity account.
///
/// 503 only when the credential store is missing or cannot be listed; every
/// per-account failure is reported inside a 200 body.
async fn quota_handler(State(state): State<AppState>) -> Result<Json<QuotaReport>, error::Error> {
    let backend = state.backend.as_ref().ok_or(error::Error::StoreNotConfigured)?;
    let report = backend
        .aggregator
        .report(backend.store.as_ref())
        .await
        .inspect_err(|e| warn!(error = %e, "credential store list failed"))?;
    Ok(Json(report))
}

/// 200 when the credential store is loaded, 503 when degraded.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.started_at.elapsed().as_secs();
    let (status_code, body) = match &state.backend {
        Some(_) => (
            axum::http::StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "credential_store": "loaded",
                "uptime_seconds": uptime,
            }),
        ),
        None => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "degraded",
                "credential_store": "not_configured",
                "uptime_seconds": uptime,
            }),
        ),
    };
    (status_code, Json(body))
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use antigravity_auth::{CredentialRecord, attr};
    use axum::body::Body;
    use axum::http::{HeaderMap, Request, StatusCode};
    use std::future::Future;
    use std::pin::Pin;
    use tower::ServiceExt;

    const LISTED_BODY: &str = r#"{"models":[{"model":"gemini-2.5-pro","rateLimit":{"rpmLimit":100,"remainingRpm":25}}]}"#;

    fn test_prometheus_handle() -> PrometheusHandle {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .build_recorder()
            .handle()
    }

    fn test_config(base: &str) -> Config {
        let toml = format!(
            r#"
[oauth]
client_id = "cid"
token_endpoint = "{base}/token"

[upstream]
quota_endpoints = ["{base}/quota"]
probe_base_url = "{base}"
probe_daily_base_url = "{base}"
probe_models = ["gemini-2.5-pro"]
"#
        );
        toml::from_str(&toml).unwrap()
    }

    /// Quota upstream: `at_ok` gets a listed-shape body, anything else 401.
    async fn start_upstream() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = axum::Router::new().route(
            "/quota",
            axum::routing::post(|headers: HeaderMap| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default();
                if auth == "Bearer at_ok" {
                    (StatusCode::OK, LISTED_BODY)
                } else {
                    (StatusCode::UNAUTHORIZED, "")
                }
            }),
        );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn antigravity_record(id: &str, email: &str, token: &str) -> CredentialRecord {
        let mut record = CredentialRecord::new(id);
        record.set_attr(attr::TYPE, "antigravity");
        record.set_attr(attr::EMAIL, email);
        record.set_attr(attr::ACCESS_TOKEN, token);
        record
    }

    async fn state_with_store(
        base: &str,
        dir: &tempfile::TempDir,
        prometheus: PrometheusHandle,
    ) -> AppState {
        let store = FileCredentialStore::load(dir.path().join("credentials.json"))
            .await
            .unwrap();
        store
            .add(antigravity_record("a", "ok@example.com", "at_ok"))
            .await
            .unwrap();
        store
            .add(antigravity_record("b", "revoked@example.com", "at_revoked"))
            .await
            .unwrap();
        AppState {
            backend: Some(build_backend(
                &test_config(base),
                reqwest::Client::new(),
                Arc::new(store),
            )),
            started_at: Instant::now(),
            prometheus,
        }
    }

    fn degraded_state() -> AppState {
        AppState {
            backend: None,
            started_at: Instant::now(),
            prometheus: test_prometheus_handle(),
        }
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn quota_report_covers_every_account() {
        let base = start_upstream().await;
        let dir = tempfile::tempdir().unwrap();
        let state = state_with_store(&base, &dir, test_prometheus_handle()).await;

        let (status, json) =
            get_json(build_router(state, 16), "/v0/management/antigravity-quota").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["total_accounts"], 2);
        assert_eq!(json["active_accounts"], 1);
        assert_eq!(json["inactive_accounts"], 1);
        assert_eq!(json["error_accounts"], 0);
        assert!(json["last_updated"].is_string());

        let accounts = json["accounts"].as_array().unwrap();
        let ok = accounts
            .iter()
            .find(|a| a["email"] == "ok@example.com")
            .unwrap();
        assert_eq!(ok["status"], "active");
        assert_eq!(ok["model_quotas"][0]["model"], "gemini-2.5-pro");
        assert_eq!(ok["model_quotas"][0]["display_name"], "Gemini 2.5 Pro");
        assert_eq!(ok["model_quotas"][0]["remaining_percent"], 25.0);
        assert!(ok.get("error").is_none());
        assert!(ok.get("project_id").is_none());

        let revoked = accounts
            .iter()
            .find(|a| a["email"] == "revoked@example.com")
            .unwrap();
        assert_eq!(revoked["status"], "inactive");
        assert_eq!(revoked["error"], "Access token expired. Please re-login");
        assert!(revoked.get("model_quotas").is_none());
    }

    #[tokio::test]
    async fn empty_store_returns_empty_report() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::load(dir.path().join("credentials.json"))
            .await
            .unwrap();
        let state = AppState {
            backend: Some(build_backend(
                &test_config("http://127.0.0.1:1"),
                reqwest::Client::new(),
                Arc::new(store),
            )),
            started_at: Instant::now(),
            prometheus: test_prometheus_handle(),
        };

        let (status, json) =
            get_json(build_router(state, 16), "/v0/management/antigravity-quota").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["total_accounts"], 0);
        assert_eq!(json["accounts"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn quota_without_store_is_503() {
        let (status, json) = get_json(
            build_router(degraded_state(), 16),
            "/v0/management/antigravity-quota",
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["error"], "credential store not configured");
    }

    struct OfflineStore;

    impl CredentialSource for OfflineStore {
        fn list(
            &self,
        ) -> Pin<Box<dyn Future<Output = antigravity_auth::Result<Vec<CredentialRecord>>> + Send + '_>>
        {
            Box::pin(async { Err(antigravity_auth::Error::Io("store offline".into())) })
        }

        fn get_by_id<'a>(
            &'a self,
            _id: &'a str,
        ) -> Pin<Box<dyn Future<Output = Option<CredentialRecord>> + Send + 'a>> {
            Box::pin(async { None })
        }

        fn update(
            &self,
            _record: CredentialRecord,
        ) -> Pin<Box<dyn Future<Output = antigravity_auth::Result<()>> + Send + '_>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn quota_with_failing_store_is_503() {
        let state = AppState {
            backend: Some(build_backend(
                &test_config("http://127.0.0.1:1"),
                reqwest::Client::new(),
                Arc::new(OfflineStore),
            )),
            started_at: Instant::now(),
            prometheus: test_prometheus_handle(),
        };

        let (status, json) =
            get_json(build_router(state, 16), "/v0/management/antigravity-quota").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(json["error"].as_str().unwrap().contains("store offline"));
    }

    #[tokio::test]
    async fn health_reports_loaded_store() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with_store("http://127.0.0.1:1", &dir, test_prometheus_handle()).await;

        let (status, json) = get_json(build_router(state, 16), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["credential_store"], "loaded");
        assert!(json["uptime_seconds"].is_u64());
    }

    #[tokio::test]
    async fn health_is_degraded_without_store() {
        let (status, json) = get_json(build_router(degraded_state(), 16), "/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["status"], "degraded");
    }

    #[tokio::test]
    async fn metrics_endpoint_renders_report_counters() {
        let base = start_upstream().await;
        let dir = tempfile::tempdir().unwrap();
        let (recorder, handle) = crate::metrics::isolated_recorder();
        let _guard = ::metrics::set_default_local_recorder(&recorder);
        let state = state_with_store(&base, &dir, handle).await;
        let app = build_router(state, 16);

        let (status, _) = get_json(app.clone(), "/v0/management/antigravity-quota").await;
        assert_eq!(status, StatusCode::OK);

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("quota_accounts_total{status=\"active\"} 1"), "{text}");
        assert!(text.contains("quota_accounts_total{status=\"inactive\"} 1"), "{text}");
        assert!(text.contains("quota_upstream_errors_total{kind=\"unauthorized\"} 1"), "{text}");
        assert!(text.contains("quota_aggregation_duration_seconds_bucket"), "{text}");
    }
}
