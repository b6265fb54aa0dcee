//! Authentication flows per actor kind.
//!
//! - `POST /api/v1/auth/:kind/login`
//! - `POST /api/v1/auth/:kind/register`
//! - `POST /api/v1/auth/:kind/register/confirm`
//! - `POST /api/v1/auth/:kind/change-password`
//!
//! OTP failures share one public error code, and login failures never say
//! whether the handle exists.

use super::{parse_body, parse_kind, AppState};
use crate::errors::IdentityError;
use crate::models::{
    ChangePasswordRequest, ChangePasswordResponse, LoginRequest, RegisterConfirmRequest,
    RegisterConfirmResponse, RegisterRequest, RegisterResponse, TokenPair,
};
use crate::observability::track_error;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::instrument;

/// POST /api/v1/auth/:kind/login
#[instrument(skip_all, name = "identity.auth.login")]
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    body: Bytes,
) -> Result<Json<TokenPair>, IdentityError> {
    let kind = parse_kind(&kind)?;
    let request: LoginRequest = parse_body(&body)?;
    let tokens = state
        .identity
        .login(kind, request)
        .await
        .map_err(|e| track_error("login", e))?;
    Ok(Json(tokens))
}

/// POST /api/v1/auth/:kind/register
///
/// Sends a one-time code to the address. Responds 202 because delivery is
/// out of band.
#[instrument(skip_all, name = "identity.auth.register")]
pub async fn handle_register(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<RegisterResponse>), IdentityError> {
    let kind = parse_kind(&kind)?;
    let request: RegisterRequest = parse_body(&body)?;
    let response = state
        .identity
        .register(kind, &request.email)
        .await
        .map_err(|e| track_error("register", e))?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// POST /api/v1/auth/:kind/register/confirm
#[instrument(skip_all, name = "identity.auth.register_confirm")]
pub async fn handle_register_confirm(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<RegisterConfirmResponse>), IdentityError> {
    let kind = parse_kind(&kind)?;
    let request: RegisterConfirmRequest = parse_body(&body)?;
    let response = state
        .identity
        .register_confirm(kind, request)
        .await
        .map_err(|e| track_error("register_confirm", e))?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/v1/auth/:kind/change-password
#[instrument(skip_all, name = "identity.auth.change_password")]
pub async fn handle_change_password(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    body: Bytes,
) -> Result<Json<ChangePasswordResponse>, IdentityError> {
    let kind = parse_kind(&kind)?;
    let request: ChangePasswordRequest = parse_body(&body)?;
    let response = state
        .identity
        .change_password(kind, request)
        .await
        .map_err(|e| track_error("change_password", e))?;
    Ok(Json(response))
}
