//! Event registration handlers.
//!
//! - `POST   /api/v1/event-registrations`
//! - `GET    /api/v1/event-registrations/:id`
//! - `DELETE /api/v1/event-registrations/:id`
//! - `GET    /api/v1/students/:id/events`

use super::{parse_body, parse_id, AppState};
use crate::errors::IdentityError;
use crate::models::{EventRegistration, NewEventRegistration, StudentEvent};
use crate::observability::track_error;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;

/// Checks eligibility, then creates the registration. Denials map to 409.
#[instrument(skip_all, name = "identity.enrollment.register")]
pub async fn register_for_event(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<EventRegistration>), IdentityError> {
    let request: NewEventRegistration = parse_body(&body)?;
    let registration = state
        .enrollment
        .register_for_event(request, Utc::now())
        .await
        .map_err(|e| track_error("register_for_event", e))?;
    Ok((StatusCode::CREATED, Json(registration)))
}

#[instrument(skip_all, name = "identity.enrollment.get")]
pub async fn get_registration(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<EventRegistration>, IdentityError> {
    let id = parse_id(&id)?;
    let registration = state
        .enrollment
        .get_registration(id)
        .await
        .map_err(|e| track_error("get_registration", e))?;
    Ok(Json(registration))
}

#[instrument(skip_all, name = "identity.enrollment.delete")]
pub async fn delete_registration(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, IdentityError> {
    let id = parse_id(&id)?;
    state
        .enrollment
        .delete_registration(id)
        .await
        .map_err(|e| track_error("delete_registration", e))?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip_all, name = "identity.enrollment.student_events")]
pub async fn student_events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<StudentEvent>>, IdentityError> {
    let id = parse_id(&id)?;
    let events = state
        .enrollment
        .student_events(id)
        .await
        .map_err(|e| track_error("student_events", e))?;
    Ok(Json(events))
}
