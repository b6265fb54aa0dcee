//! Identity Service Library
//!
//! Accounts, authentication and event enrollment for the campus CRM.
//! Six actor kinds (students, teachers, support teachers, managers,
//! administrators, superadmins) share one identity lifecycle: password
//! login, email one-time-code registration, password change, and record
//! management.
//!
//! # Modules
//!
//! - `config` - Service configuration
//! - `crypto` - Password hashing, one-time codes, digests
//! - `errors` - Error types
//! - `handlers` - HTTP request handlers
//! - `models` - Data models
//! - `otp` - One-time code storage and delivery
//! - `repositories` - Database access layer
//! - `routes` - Router assembly
//! - `services` - Business logic layer

pub mod config;
pub mod crypto;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod observability;
pub mod otp;
pub mod repositories;
pub mod routes;
pub mod services;
