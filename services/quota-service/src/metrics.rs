//! Prometheus metrics exposition
//!
//! Metrics emitted by the quota pipeline:
//!
//! - `quota_accounts_total` (counter): label `status`
//! - `quota_upstream_errors_total` (counter): label `kind`
//! - `quota_token_refresh_total` (counter): label `outcome`
//! - `quota_aggregation_duration_seconds` (histogram)

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Bucket boundaries for a whole-report aggregation: 10ms up to 60s, which
/// covers several sequential 10s upstream timeouts per account.
const AGGREGATION_BUCKETS: &[f64] = &[
    0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0,
];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full("quota_aggregation_duration_seconds".to_string()),
        AGGREGATION_BUCKETS,
    )
}

/// Install the global Prometheus recorder and return a handle for `/metrics`.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = builder()?.install_recorder()?;
    describe();
    Ok(handle)
}

fn describe() {
    metrics::describe_counter!(
        "quota_accounts_total",
        "Accounts resolved, by terminal status"
    );
    metrics::describe_counter!(
        "quota_upstream_errors_total",
        "Failed quota API calls, by error kind"
    );
    metrics::describe_counter!(
        "quota_token_refresh_total",
        "Access token refresh attempts, by outcome"
    );
    metrics::describe_histogram!(
        "quota_aggregation_duration_seconds",
        metrics::Unit::Seconds,
        "Wall time to build one quota report"
    );
}

#[cfg(test)]
pub(crate) fn isolated_recorder() -> (
    metrics_exporter_prometheus::PrometheusRecorder,
    PrometheusHandle,
) {
    let recorder = builder().unwrap().build_recorder();
    let handle = recorder.handle();
    (recorder, handle)
}
