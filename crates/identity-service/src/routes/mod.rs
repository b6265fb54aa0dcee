//! HTTP routes for the identity service.

use crate::handlers::{
    self, actor_handler, auth_handler, enrollment_handler, event_handler, AppState,
};
use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

pub use crate::observability::metrics::init_metrics_recorder;

/// Build the application router.
///
/// - `/health`, `/metrics` - operational, unversioned
/// - `/api/v1/actors/:kind[/:id]` - actor records per kind
/// - `/api/v1/actors/:kind/:id/exists` - liveness check
/// - `/api/v1/auth/:kind/...` - login, registration, password change
/// - `/api/v1/events[/:id]`, `/api/v1/events/:id/eligibility`
/// - `/api/v1/event-registrations[/:id]`, `/api/v1/students/:id/events`
///
/// Every request gets a TraceLayer span and a 30 second timeout.
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::health_check))
        // Actor records
        .route(
            "/api/v1/actors/:kind",
            post(actor_handler::create_actor).get(actor_handler::list_actors),
        )
        .route(
            "/api/v1/actors/:kind/:id",
            get(actor_handler::get_actor)
                .put(actor_handler::update_actor)
                .delete(actor_handler::delete_actor),
        )
        .route(
            "/api/v1/actors/:kind/:id/exists",
            get(actor_handler::check_actor),
        )
        // Authentication flows
        .route("/api/v1/auth/:kind/login", post(auth_handler::handle_login))
        .route(
            "/api/v1/auth/:kind/register",
            post(auth_handler::handle_register),
        )
        .route(
            "/api/v1/auth/:kind/register/confirm",
            post(auth_handler::handle_register_confirm),
        )
        .route(
            "/api/v1/auth/:kind/change-password",
            post(auth_handler::handle_change_password),
        )
        // Events
        .route(
            "/api/v1/events",
            post(event_handler::create_event).get(event_handler::list_events),
        )
        .route(
            "/api/v1/events/:id",
            get(event_handler::get_event)
                .put(event_handler::update_event)
                .delete(event_handler::delete_event),
        )
        .route(
            "/api/v1/events/:id/eligibility",
            get(event_handler::check_eligibility),
        )
        // Enrollment
        .route(
            "/api/v1/event-registrations",
            post(enrollment_handler::register_for_event),
        )
        .route(
            "/api/v1/event-registrations/:id",
            get(enrollment_handler::get_registration)
                .delete(enrollment_handler::delete_registration),
        )
        .route(
            "/api/v1/students/:id/events",
            get(enrollment_handler::student_events),
        )
        .with_state(state);

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    api_routes
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}
