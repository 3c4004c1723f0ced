//! Metrics definitions for the IAM service
//!
//! All metrics follow Prometheus naming conventions:
//! - `iam_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `kind`: access, refresh
//! - `status`: success, error
//! - `reason`: fixed set per call site (expired, signature, not_found, ...)
//! - `operation`: bounded by code
//! - `resource_type` / `action`: closed enums in the policy engine
//! - `endpoint`: normalized route templates

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("iam_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Token signing is sub-millisecond; bcrypt-bound logins land in the upper buckets
        .set_buckets_for_metric(
            Matcher::Prefix("iam_token_issuance".to_string()),
            &[0.0005, 0.001, 0.005, 0.010, 0.050, 0.100, 0.250, 0.500],
        )
        .map_err(|e| format!("Failed to set token issuance buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("iam_directory_operation".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set directory operation buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// Token Metrics
// ============================================================================

/// Record token issuance duration and outcome
///
/// Metric: `iam_token_issuance_duration_seconds`, `iam_token_issuance_total`
/// Labels: `kind`, `status`
pub fn record_token_issuance(kind: &str, status: &str, duration: Duration) {
    histogram!("iam_token_issuance_duration_seconds", "kind" => kind.to_string(), "status" => status.to_string())
        .record(duration.as_secs_f64());

    counter!("iam_token_issuance_total", "kind" => kind.to_string(), "status" => status.to_string())
        .increment(1);
}

/// Record token validation result
///
/// Metric: `iam_token_validations_total`
/// Labels: `kind`, `status`, `reason`
pub fn record_token_validation(kind: &str, status: &str, reason: Option<&str>) {
    let reason = reason.unwrap_or("none");
    counter!("iam_token_validations_total",
        "kind" => kind.to_string(),
        "status" => status.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

// ============================================================================
// Session Metrics
// ============================================================================

/// Record a session lifecycle operation
///
/// Metric: `iam_session_operations_total`
/// Labels: `operation` (issue, rotate, resolve, revoke, end_all), `status`, `reason`
///
/// `reason` carries the internal failure cause that callers never see
/// (not_found, inactive, expired, signature, subject_mismatch, superseded).
pub fn record_session_operation(operation: &str, status: &str, reason: Option<&str>) {
    let reason = reason.unwrap_or("none");
    counter!("iam_session_operations_total",
        "operation" => operation.to_string(),
        "status" => status.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

// ============================================================================
// Authorization Metrics
// ============================================================================

/// Record a policy decision
///
/// Metric: `iam_authz_decisions_total`
/// Labels: `resource_type`, `action`, `decision` (allow, deny, error)
pub fn record_authz_decision(resource_type: &str, action: &str, decision: &str) {
    counter!("iam_authz_decisions_total",
        "resource_type" => resource_type.to_string(),
        "action" => action.to_string(),
        "decision" => decision.to_string()
    )
    .increment(1);
}

// ============================================================================
// Crypto / Directory Metrics
// ============================================================================

/// Record a field cipher or hasher failure
///
/// Metric: `iam_crypto_failures_total`
/// Labels: `operation`
pub fn record_crypto_failure(operation: &str) {
    counter!("iam_crypto_failures_total", "operation" => operation.to_string()).increment(1);
}

/// Record an identity directory operation
///
/// Metric: `iam_directory_operation_duration_seconds`, `iam_directory_operations_total`
/// Labels: `operation`, `status`
pub fn record_directory_operation(operation: &str, status: &str, duration: Duration) {
    histogram!("iam_directory_operation_duration_seconds",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("iam_directory_operations_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `iam_http_requests_total`, `iam_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("iam_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("iam_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path to prevent label cardinality explosion
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/health"
        | "/metrics"
        | "/api/v1/me"
        | "/api/v1/auth/register"
        | "/api/v1/auth/login"
        | "/api/v1/auth/refresh"
        | "/api/v1/auth/logout"
        | "/api/v1/auth/logout-all" => path.to_string(),
        _ => {
            let parts: Vec<&str> = path.split('/').collect();
            // /api/v1/users/{id}
            if parts.len() == 5 && path.starts_with("/api/v1/users/") {
                return "/api/v1/users/{id}".to_string();
            }
            "/other".to_string()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    #[test]
    fn test_normalize_endpoint_static_paths() {
        assert_eq!(normalize_endpoint("/health"), "/health");
        assert_eq!(normalize_endpoint("/api/v1/auth/login"), "/api/v1/auth/login");
        assert_eq!(normalize_endpoint("/api/v1/me"), "/api/v1/me");
    }

    #[test]
    fn test_normalize_endpoint_user_ids() {
        assert_eq!(
            normalize_endpoint("/api/v1/users/8d3c2c1e-3a8f-4c55-9d19-0e0f0a0b0c0d"),
            "/api/v1/users/{id}"
        );
        assert_eq!(normalize_endpoint("/api/v1/users/x/extra"), "/other");
        assert_eq!(normalize_endpoint("/random"), "/other");
    }

    #[test]
    fn test_categorize_status_code() {
        assert_eq!(categorize_status_code(200), "success");
        assert_eq!(categorize_status_code(201), "success");
        assert_eq!(categorize_status_code(504), "timeout");
        assert_eq!(categorize_status_code(401), "error");
    }

    #[test]
    fn test_session_failure_reason_is_labelled() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_session_operation("rotate", "error", Some("inactive"));
            record_session_operation("rotate", "error", Some("inactive"));
            record_session_operation("rotate", "success", None);
        });

        let snapshot = snapshotter.snapshot().into_vec();
        let inactive = snapshot.iter().find(|(key, _, _, _)| {
            key.key().name() == "iam_session_operations_total"
                && key
                    .key()
                    .labels()
                    .any(|l| l.key() == "reason" && l.value() == "inactive")
        });

        let (_, _, _, value) = inactive.expect("inactive reason should be recorded");
        assert_eq!(value, &DebugValue::Counter(2));
    }

    #[test]
    fn test_recording_functions_emit_metrics() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_token_issuance("access", "success", Duration::from_millis(1));
            record_token_validation("refresh", "error", Some("expired"));
            record_authz_decision("settings", "read", "deny");
            record_crypto_failure("decrypt");
            record_directory_operation("create", "success", Duration::from_millis(3));
            record_http_request("GET", "/health", 200, Duration::from_millis(2));
        });

        let names: Vec<String> = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .map(|(key, _, _, _)| key.key().name().to_string())
            .collect();

        for expected in [
            "iam_token_issuance_total",
            "iam_token_validations_total",
            "iam_authz_decisions_total",
            "iam_crypto_failures_total",
            "iam_directory_operations_total",
            "iam_http_requests_total",
        ] {
            assert!(
                names.iter().any(|n| n == expected),
                "{expected} not recorded"
            );
        }
    }
}
