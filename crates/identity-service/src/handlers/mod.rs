//! HTTP request handlers.
//!
//! Bodies are deserialized by hand so malformed JSON produces the service's
//! own `VALIDATION_ERROR` body instead of axum's plain-text rejection.

pub mod actor_handler;
pub mod auth_handler;
pub mod enrollment_handler;
pub mod event_handler;
pub mod health;
pub mod metrics;

pub use health::health_check;
pub use metrics::metrics_handler;

use crate::errors::IdentityError;
use crate::models::ActorKind;
use crate::services::{EnrollmentService, EventService, IdentityService};
use axum::body::Bytes;
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// Application state shared across handlers.
pub struct AppState {
    pub identity: IdentityService,
    pub events: EventService,
    pub enrollment: EnrollmentService,
}

pub(crate) fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, IdentityError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(target: "identity.handlers", error = %e, "Invalid request body");
        IdentityError::Validation(format!("Invalid request body: {}", e))
    })
}

pub(crate) fn parse_kind(segment: &str) -> Result<ActorKind, IdentityError> {
    ActorKind::from_path_segment(segment)
        .ok_or_else(|| IdentityError::NotFound(format!("actor kind {}", segment)))
}

pub(crate) fn parse_id(raw: &str) -> Result<Uuid, IdentityError> {
    Uuid::parse_str(raw).map_err(|_| IdentityError::Validation("id must be a UUID".to_string()))
}
