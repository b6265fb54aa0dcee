pub mod enrollment_service;
pub mod event_service;
pub mod identity_service;
pub mod otp_service;
pub mod token_service;

pub use enrollment_service::{DenyReason, Eligibility, EnrollmentPolicy, EnrollmentService};
pub use event_service::EventService;
pub use identity_service::IdentityService;
pub use otp_service::{ConfirmationTicket, OtpIssuer, OtpPolicy};
pub use token_service::TokenMinter;
