//! Out-of-band delivery of one-time codes.
//!
//! `LogNotifier` is the local development sender: it logs the message
//! instead of delivering it. `WebhookNotifier` hands the message to a mail
//! relay over HTTP.

use crate::errors::IdentityError;
use crate::observability::hash_for_correlation;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Timeout for a single relay request.
const RELAY_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Subject line used for one-time code messages.
pub const OTP_MESSAGE_SUBJECT: &str = "CRM registration code";

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `message` to `address`, or fail with `DispatchFailure`.
    async fn send(&self, address: &str, message: &str) -> Result<(), IdentityError>;
}

/// Development sender that logs instead of delivering.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, address: &str, message: &str) -> Result<(), IdentityError> {
        info!(
            target: "identity.notifier",
            address_hash = %hash_for_correlation(address),
            "Notification send stub"
        );
        // Local operators read issued codes from here.
        debug!(target: "identity.notifier", body = %message, "Notification body");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct RelayMessage<'a> {
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Sender that POSTs `{to, subject, body}` JSON to a mail relay.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    /// # Errors
    ///
    /// Returns `IdentityError::Internal` if the HTTP client cannot be built.
    pub fn new(url: String) -> Result<Self, IdentityError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(RELAY_REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| {
                error!(target: "identity.notifier", error = %e, "Failed to build HTTP client");
                IdentityError::Internal
            })?;

        Ok(Self { client, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    #[instrument(skip_all, fields(address_hash = %hash_for_correlation(address)))]
    async fn send(&self, address: &str, message: &str) -> Result<(), IdentityError> {
        let payload = RelayMessage {
            to: address,
            subject: OTP_MESSAGE_SUBJECT,
            body: message,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                warn!(target: "identity.notifier", error = %e, "Relay request failed");
                IdentityError::DispatchFailure("Mail relay is unreachable".to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(target: "identity.notifier", status = %status, "Relay rejected message");
            return Err(IdentityError::DispatchFailure(format!(
                "Mail relay returned {}",
                status.as_u16()
            )));
        }

        Ok(())
    }
}

pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Mutex;

    /// Records every message instead of sending it.
    #[derive(Default)]
    pub struct CapturingNotifier {
        sent: Mutex<Vec<(String, String)>>,
        failing: AtomicBool,
    }

    impl CapturingNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        /// A notifier whose channel is down.
        pub fn failing() -> Self {
            let notifier = Self::default();
            notifier.set_failing(true);
            notifier
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        /// All `(address, message)` pairs sent so far, including failed ones.
        pub async fn messages(&self) -> Vec<(String, String)> {
            self.sent.lock().await.clone()
        }

        /// The 6-digit code in the latest message sent to `address`.
        pub async fn last_code_for(&self, address: &str) -> Option<String> {
            let sent = self.sent.lock().await;
            sent.iter()
                .rev()
                .find(|(to, _)| to == address)
                .and_then(|(_, body)| {
                    body.split(|c: char| !c.is_ascii_digit())
                        .find(|run| run.len() == 6)
                        .map(str::to_string)
                })
        }
    }

    #[async_trait]
    impl Notifier for CapturingNotifier {
        async fn send(&self, address: &str, message: &str) -> Result<(), IdentityError> {
            self.sent
                .lock()
                .await
                .push((address.to_string(), message.to_string()));
            if self.failing.load(Ordering::SeqCst) {
                return Err(IdentityError::DispatchFailure(
                    "Mock channel down".to_string(),
                ));
            }
            Ok(())
        }
    }

}
