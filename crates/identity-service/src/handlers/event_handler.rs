//! Event handlers.
//!
//! - `POST   /api/v1/events`
//! - `GET    /api/v1/events?search=&offset=&limit=`
//! - `GET    /api/v1/events/:id`
//! - `PUT    /api/v1/events/:id`
//! - `DELETE /api/v1/events/:id`
//! - `GET    /api/v1/events/:id/eligibility?student_id=` (dry run)

use super::{parse_body, parse_id, AppState};
use crate::errors::IdentityError;
use crate::models::{EligibilityQuery, Event, EventInput, EventList};
use crate::observability::track_error;
use crate::services::Eligibility;
use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use common::types::ListFilter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

/// Dry-run eligibility result.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EligibilityResponse {
    pub eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub branch_conflict: bool,
}

impl From<Eligibility> for EligibilityResponse {
    fn from(eligibility: Eligibility) -> Self {
        match eligibility {
            Eligibility::Allow { branch_conflict } => Self {
                eligible: true,
                reason: None,
                branch_conflict,
            },
            Eligibility::Deny(reason) => Self {
                eligible: false,
                reason: Some(reason.as_str().to_string()),
                branch_conflict: matches!(reason, crate::services::DenyReason::BranchConflict),
            },
        }
    }
}

#[instrument(skip_all, name = "identity.events.create")]
pub async fn create_event(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<Event>), IdentityError> {
    let input: EventInput = parse_body(&body)?;
    let event = state
        .events
        .create(input)
        .await
        .map_err(|e| track_error("create_event", e))?;
    Ok((StatusCode::CREATED, Json(event)))
}

#[instrument(skip_all, name = "identity.events.list")]
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    filter: Result<Query<ListFilter>, QueryRejection>,
) -> Result<Json<EventList>, IdentityError> {
    let Query(filter) =
        filter.map_err(|e| IdentityError::Validation(format!("Invalid query: {}", e)))?;
    let list = state
        .events
        .get_list(&filter)
        .await
        .map_err(|e| track_error("list_events", e))?;
    Ok(Json(list))
}

#[instrument(skip_all, name = "identity.events.get")]
pub async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Event>, IdentityError> {
    let id = parse_id(&id)?;
    let event = state
        .events
        .get_by_id(id)
        .await
        .map_err(|e| track_error("get_event", e))?;
    Ok(Json(event))
}

#[instrument(skip_all, name = "identity.events.update")]
pub async fn update_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Event>, IdentityError> {
    let id = parse_id(&id)?;
    let input: EventInput = parse_body(&body)?;
    let event = state
        .events
        .update(id, input)
        .await
        .map_err(|e| track_error("update_event", e))?;
    Ok(Json(event))
}

#[instrument(skip_all, name = "identity.events.delete")]
pub async fn delete_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, IdentityError> {
    let id = parse_id(&id)?;
    state
        .events
        .delete(id)
        .await
        .map_err(|e| track_error("delete_event", e))?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip_all, name = "identity.events.eligibility")]
pub async fn check_eligibility(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    query: Result<Query<EligibilityQuery>, QueryRejection>,
) -> Result<Json<EligibilityResponse>, IdentityError> {
    let id = parse_id(&id)?;
    let Query(query) =
        query.map_err(|e| IdentityError::Validation(format!("Invalid query: {}", e)))?;
    let eligibility = state
        .enrollment
        .check_eligibility(id, query.student_id, Utc::now())
        .await
        .map_err(|e| track_error("check_eligibility", e))?;
    Ok(Json(eligibility.into()))
}
