//! Types shared between the identity service and its test utilities.

#![warn(clippy::pedantic)]

/// Connection settings for backing stores
pub mod config;

/// Secret types that prevent accidental logging
pub mod secret;

/// Pagination and listing types
pub mod types;
