//! Observability for the identity service.
//!
//! # Privacy by Default
//!
//! Service entry points use `#[instrument(skip_all)]` and add fields
//! explicitly. Fields fall into three groups:
//! - **SAFE**: logged as-is (actor kind, ids generated by the service, outcomes)
//! - **HASHED**: logged through [`hash_for_correlation`] (contact addresses,
//!   login handles)
//! - **NEVER**: passwords, one-time codes, tokens, signing secrets

pub mod metrics;

use crate::errors::IdentityError;
use sha2::{Digest, Sha256};

/// Hash a value for correlation in logs (SHA-256, first 8 hex chars).
///
/// One-way and truncated: enough to follow one address through a flow,
/// not enough to recover it.
pub fn hash_for_correlation(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    hex::encode(digest).chars().take(8).collect()
}

/// Bounded error categories for metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Credential, password and one-time-code failures
    Authentication,
    /// Malformed input, unknown records
    Validation,
    /// Enrollment denials
    Enrollment,
    /// Storage, hashing, signing, dispatch
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Enrollment => "enrollment",
            ErrorCategory::Internal => "internal",
        }
    }
}

impl From<&IdentityError> for ErrorCategory {
    fn from(err: &IdentityError) -> Self {
        match err {
            IdentityError::InvalidCredentials
            | IdentityError::IncorrectLogin
            | IdentityError::PasswordMismatch
            | IdentityError::OtpExpiredOrAbsent
            | IdentityError::OtpMismatch
            | IdentityError::InvalidToken(_) => ErrorCategory::Authentication,
            IdentityError::NotFound(_)
            | IdentityError::EventNotFound
            | IdentityError::TimeParse(_)
            | IdentityError::Validation(_) => ErrorCategory::Validation,
            IdentityError::TooLateToRegister
            | IdentityError::AlreadyRegistered
            | IdentityError::BranchConflict => ErrorCategory::Enrollment,
            IdentityError::DispatchFailure(_)
            | IdentityError::Hashing(_)
            | IdentityError::Signing(_)
            | IdentityError::Database(_)
            | IdentityError::Store(_)
            | IdentityError::Internal => ErrorCategory::Internal,
        }
    }
}

/// Count an error against the operation that produced it and pass it on.
pub fn track_error(operation: &str, err: IdentityError) -> IdentityError {
    let category = ErrorCategory::from(&err);
    metrics::record_error(operation, category.as_str(), err.status_code().as_u16());
    err
}
