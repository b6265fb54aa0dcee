//! # Identity Test Utilities
//!
//! Shared test utilities for the identity service.
//!
//! This crate provides:
//! - Fixed test IDs and secrets (deterministic, reproducible tests)
//! - Request body builders (ActorDraftBuilder, EventBuilder)
//! - Server test harness (TestIdentityServer over in-memory stores)
//! - Custom assertions (TokenAssertions trait)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use identity_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestIdentityServer::spawn().await?;
//!
//!     let body = ActorDraftBuilder::student("Ann").build();
//!     let response = server
//!         .client()
//!         .post(format!("{}/api/v1/actors/students", server.url()))
//!         .json(&body)
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 201);
//!     Ok(())
//! }
//! ```

pub mod assertions;
pub mod builders;
pub mod server_harness;
pub mod test_ids;

// Re-export commonly used items
pub use assertions::*;
pub use builders::*;
pub use server_harness::*;
pub use test_ids::*;
