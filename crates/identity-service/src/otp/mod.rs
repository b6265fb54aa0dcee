//! One-time code storage and delivery seams.

pub mod notifier;
pub mod store;

pub use notifier::{LogNotifier, Notifier, WebhookNotifier};
pub use store::{OtpStore, RedisOtpStore};
