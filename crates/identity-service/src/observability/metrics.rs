//! Metrics definitions for the identity service
//!
//! All metrics follow Prometheus naming conventions:
//! - `identity_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `kind`: 6 values (actor kinds)
//! - `status`: 2 values (success, error)
//! - `decision`: allow, allow_branch_conflict, or one deny reason
//! - `error_category`: 4 values (authentication, validation, enrollment, internal)
//! - `operation`: bounded by code (hash, verify, handler names)
//!
//! Contact addresses, login handles and ids never appear as label values.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and return the handle that renders
/// `/metrics`.
///
/// # Errors
///
/// Fails if a global recorder is already installed.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // bcrypt at cost 10-14 takes tens to hundreds of milliseconds
        .set_buckets_for_metric(
            Matcher::Full("identity_bcrypt_duration_seconds".to_string()),
            &[0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500],
        )
        .map_err(|e| format!("Failed to set bcrypt duration buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Authentication Metrics
// ============================================================================

/// Record a login attempt.
///
/// Metric: `identity_login_total`
/// Labels: `kind`, `status`
pub fn record_login(kind: &str, status: &str) {
    counter!("identity_login_total", "kind" => kind.to_string(), "status" => status.to_string())
        .increment(1);
}

/// Record a token pair mint.
///
/// Metric: `identity_token_mint_total`
/// Labels: `status`
pub fn record_token_mint(status: &str) {
    counter!("identity_token_mint_total", "status" => status.to_string()).increment(1);
}

/// Record bcrypt hashing or verification duration.
///
/// Metric: `identity_bcrypt_duration_seconds`
/// Labels: `operation` (hash, verify)
pub fn record_bcrypt_duration(operation: &str, duration: Duration) {
    histogram!("identity_bcrypt_duration_seconds", "operation" => operation.to_string())
        .record(duration.as_secs_f64());
}

// ============================================================================
// One-Time Code Metrics
// ============================================================================

/// Record a one-time code issuance and dispatch.
///
/// Metric: `identity_otp_issued_total`
/// Labels: `kind`, `status`
pub fn record_otp_issued(kind: &str, status: &str) {
    counter!("identity_otp_issued_total", "kind" => kind.to_string(), "status" => status.to_string())
        .increment(1);
}

/// Record a one-time code confirmation attempt.
///
/// Metric: `identity_otp_confirm_total`
/// Labels: `kind`, `status`
pub fn record_otp_confirm(kind: &str, status: &str) {
    counter!("identity_otp_confirm_total", "kind" => kind.to_string(), "status" => status.to_string())
        .increment(1);
}

// ============================================================================
// Enrollment Metrics
// ============================================================================

/// Record an eligibility decision.
///
/// Metric: `identity_enrollment_decisions_total`
/// Labels: `decision`
pub fn record_enrollment_decision(decision: &str) {
    counter!("identity_enrollment_decisions_total", "decision" => decision.to_string())
        .increment(1);
}

// ============================================================================
// Error Metrics
// ============================================================================

/// Record an error returned to a caller.
///
/// Metric: `identity_errors_total`
/// Labels: `operation`, `error_category`, `status_code`
pub fn record_error(operation: &str, error_category: &str, status_code: u16) {
    counter!(
        "identity_errors_total",
        "operation" => operation.to_string(),
        "error_category" => error_category.to_string(),
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    type Snapshot = Vec<(
        metrics_util::CompositeKey,
        Option<metrics::Unit>,
        Option<metrics::SharedString>,
        DebugValue,
    )>;

    fn counter_value(snapshot: &Snapshot, name: &str) -> u64 {
        snapshot
            .iter()
            .filter(|(key, _, _, _)| key.key().name() == name)
            .map(|(_, _, _, value)| match value {
                DebugValue::Counter(v) => *v,
                _ => 0,
            })
            .sum()
    }

    #[test]
    fn test_login_counter_increments() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_login("student", "success");
            record_login("student", "error");
            record_login("teacher", "error");
        });

        let snapshot = snapshotter.snapshot().into_vec();
        assert_eq!(counter_value(&snapshot, "identity_login_total"), 3);
    }

    #[test]
    fn test_enrollment_and_error_counters() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_enrollment_decision("allow");
            record_enrollment_decision("too_late_to_register");
            record_error("register_for_event", "enrollment", 409);
        });

        let snapshot = snapshotter.snapshot().into_vec();
        assert_eq!(
            counter_value(&snapshot, "identity_enrollment_decisions_total"),
            2
        );
        assert_eq!(counter_value(&snapshot, "identity_errors_total"), 1);
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_otp_issued("student", "success");
        record_otp_confirm("manager", "error");
        record_token_mint("success");
        record_bcrypt_duration("hash", Duration::from_millis(120));
    }
}
