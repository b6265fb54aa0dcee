//! Storage seams for the service layer.
//!
//! Each trait has a PostgreSQL implementation and an in-memory `mock`
//! implementation used by unit tests and the test server harness.

pub mod actors;
pub mod event_registrations;
pub mod events;

pub use actors::{ActorRepository, PgActorRepository};
pub use event_registrations::{EventRegistrationRepository, PgEventRegistrationRepository};
pub use events::{EventRepository, PgEventRepository};
