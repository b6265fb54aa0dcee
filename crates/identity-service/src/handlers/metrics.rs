//! Prometheus scrape endpoint.
//!
//! Unauthenticated. Labels are bounded (kind, status, operation, category)
//! and never carry contact addresses or login handles.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// GET /metrics
#[tracing::instrument(skip_all, name = "identity.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
