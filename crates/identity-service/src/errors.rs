use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    /// No live record for the given id or handle.
    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Incorrect login")]
    IncorrectLogin,

    #[error("Password mismatch")]
    PasswordMismatch,

    #[error("One-time code expired or absent")]
    OtpExpiredOrAbsent,

    #[error("One-time code mismatch")]
    OtpMismatch,

    #[error("Notification dispatch failed: {0}")]
    DispatchFailure(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Token signing failed: {0}")]
    Signing(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Key-value store error: {0}")]
    Store(String),

    #[error("Less than the minimum lead time is left before the event starts")]
    TooLateToRegister,

    #[error("Student is already registered for this event")]
    AlreadyRegistered,

    #[error("Student is registered for another branch's event on the same day")]
    BranchConflict,

    #[error("Event not found")]
    EventNotFound,

    #[error("Invalid time: {0}")]
    TimeParse(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal server error")]
    Internal,
}

impl IdentityError {
    /// HTTP status used when this error crosses the service boundary.
    pub fn status_code(&self) -> StatusCode {
        match self {
            IdentityError::NotFound(_) | IdentityError::EventNotFound => StatusCode::NOT_FOUND,
            IdentityError::InvalidCredentials
            | IdentityError::IncorrectLogin
            | IdentityError::PasswordMismatch
            | IdentityError::OtpExpiredOrAbsent
            | IdentityError::OtpMismatch
            | IdentityError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            IdentityError::DispatchFailure(_) => StatusCode::BAD_GATEWAY,
            IdentityError::TooLateToRegister
            | IdentityError::AlreadyRegistered
            | IdentityError::BranchConflict => StatusCode::CONFLICT,
            IdentityError::TimeParse(_) | IdentityError::Validation(_) => StatusCode::BAD_REQUEST,
            IdentityError::Hashing(_)
            | IdentityError::Signing(_)
            | IdentityError::Database(_)
            | IdentityError::Store(_)
            | IdentityError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for IdentityError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (code, message) = match &self {
            IdentityError::NotFound(what) => ("NOT_FOUND", format!("{} not found", what)),
            IdentityError::InvalidCredentials => (
                "INVALID_CREDENTIALS",
                "Invalid login or password".to_string(),
            ),
            IdentityError::IncorrectLogin => ("INCORRECT_LOGIN", "Incorrect login".to_string()),
            IdentityError::PasswordMismatch => {
                ("PASSWORD_MISMATCH", "Password mismatch".to_string())
            }
            // Both one-time-code failures share one public code.
            IdentityError::OtpExpiredOrAbsent | IdentityError::OtpMismatch => {
                ("INCORRECT_OTP", "Incorrect one-time code".to_string())
            }
            IdentityError::DispatchFailure(_) => (
                "DISPATCH_FAILED",
                "The verification message could not be delivered".to_string(),
            ),
            IdentityError::InvalidToken(reason) => ("INVALID_TOKEN", reason.clone()),
            IdentityError::TooLateToRegister => (
                "TOO_LATE_TO_REGISTER",
                "Too little time is left before the event starts".to_string(),
            ),
            IdentityError::AlreadyRegistered => (
                "ALREADY_REGISTERED",
                "Student is already registered for this event".to_string(),
            ),
            IdentityError::BranchConflict => (
                "BRANCH_CONFLICT",
                "Student is registered for another branch's event on the same day".to_string(),
            ),
            IdentityError::EventNotFound => ("EVENT_NOT_FOUND", "Event not found".to_string()),
            IdentityError::TimeParse(reason) => ("INVALID_TIME", reason.clone()),
            IdentityError::Validation(reason) => ("VALIDATION_ERROR", reason.clone()),
            IdentityError::Hashing(_)
            | IdentityError::Signing(_)
            | IdentityError::Database(_)
            | IdentityError::Store(_)
            | IdentityError::Internal => {
                tracing::error!(target: "identity.errors", error = %self, "Internal failure");
                ("INTERNAL_ERROR", "An internal error occurred".to_string())
            }
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(error_response)).into_response()
    }
}
