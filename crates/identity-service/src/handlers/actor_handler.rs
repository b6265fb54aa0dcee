//! Actor record handlers, one route set shared by all kinds.
//!
//! - `POST   /api/v1/actors/:kind`
//! - `GET    /api/v1/actors/:kind?search=&offset=&limit=`
//! - `GET    /api/v1/actors/:kind/:id`
//! - `PUT    /api/v1/actors/:kind/:id`
//! - `DELETE /api/v1/actors/:kind/:id`
//! - `GET    /api/v1/actors/:kind/:id/exists`

use super::{parse_body, parse_id, parse_kind, AppState};
use crate::errors::IdentityError;
use crate::models::{Actor, ActorList, ActorProfile, CheckResponse, NewActor};
use crate::observability::track_error;
use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use common::types::ListFilter;
use std::sync::Arc;
use tracing::instrument;

#[instrument(skip_all, name = "identity.actors.create")]
pub async fn create_actor(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<Actor>), IdentityError> {
    let kind = parse_kind(&kind)?;
    let draft: NewActor = parse_body(&body)?;
    let actor = state
        .identity
        .create(kind, draft)
        .await
        .map_err(|e| track_error("create_actor", e))?;
    Ok((StatusCode::CREATED, Json(actor)))
}

#[instrument(skip_all, name = "identity.actors.list")]
pub async fn list_actors(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    filter: Result<Query<ListFilter>, QueryRejection>,
) -> Result<Json<ActorList>, IdentityError> {
    let kind = parse_kind(&kind)?;
    let Query(filter) =
        filter.map_err(|e| IdentityError::Validation(format!("Invalid query: {}", e)))?;
    let list = state
        .identity
        .get_list(kind, &filter)
        .await
        .map_err(|e| track_error("list_actors", e))?;
    Ok(Json(list))
}

#[instrument(skip_all, name = "identity.actors.get")]
pub async fn get_actor(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<Actor>, IdentityError> {
    let kind = parse_kind(&kind)?;
    let id = parse_id(&id)?;
    let actor = state
        .identity
        .get_by_id(kind, id)
        .await
        .map_err(|e| track_error("get_actor", e))?;
    Ok(Json(actor))
}

#[instrument(skip_all, name = "identity.actors.update")]
pub async fn update_actor(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<Actor>, IdentityError> {
    let kind = parse_kind(&kind)?;
    let id = parse_id(&id)?;
    let profile: ActorProfile = parse_body(&body)?;
    let actor = state
        .identity
        .update(kind, id, profile)
        .await
        .map_err(|e| track_error("update_actor", e))?;
    Ok(Json(actor))
}

#[instrument(skip_all, name = "identity.actors.delete")]
pub async fn delete_actor(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<StatusCode, IdentityError> {
    let kind = parse_kind(&kind)?;
    let id = parse_id(&id)?;
    state
        .identity
        .delete(kind, id)
        .await
        .map_err(|e| track_error("delete_actor", e))?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip_all, name = "identity.actors.exists")]
pub async fn check_actor(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<CheckResponse>, IdentityError> {
    let kind = parse_kind(&kind)?;
    let id = parse_id(&id)?;
    let check = state
        .identity
        .check(kind, id)
        .await
        .map_err(|e| track_error("check_actor", e))?;
    Ok(Json(CheckResponse { check }))
}
