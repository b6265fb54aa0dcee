//! One-time code issuance and the confirm side of the registration saga.
//!
//! # Flow
//!
//! 1. `issue_and_dispatch` stores `{code, issuance_id}` under
//!    `otp:{role_tag}:{contact}` and sends the code out of band.
//! 2. `confirm` checks the submitted code and returns a
//!    [`ConfirmationTicket`]. With `invalidate_on_confirm`, it first records a
//!    pending marker under `registration:{role_tag}:{contact}` and then
//!    deletes the code, so the code cannot confirm a second issuance but a
//!    retry of the same confirmation still resolves to the same ticket.
//! 3. `complete` removes the pending marker once the actor exists.
//!
//! The ticket's `issuance_id` doubles as the actor registration key, which
//! makes actor creation idempotent across retries.

use crate::crypto::{code_digest, digests_match, generate_otp_code};
use crate::errors::IdentityError;
use crate::models::ActorKind;
use crate::observability::hash_for_correlation;
use crate::observability::metrics::{record_otp_confirm, record_otp_issued};
use crate::otp::{Notifier, OtpStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Value stored under the code key.
#[derive(Debug, Serialize, Deserialize)]
struct IssuedCode {
    code: String,
    issuance_id: Uuid,
}

/// Value stored under the pending-registration key.
#[derive(Debug, Serialize, Deserialize)]
struct PendingRegistration {
    issuance_id: Uuid,
    code_digest: String,
}

/// Proof that a contact address was confirmed for one issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationTicket {
    pub contact: String,
    pub issuance_id: Uuid,
}

#[derive(Debug, Clone, Copy)]
pub struct OtpPolicy {
    pub ttl: Duration,
    pub saga_ttl: Duration,
    pub invalidate_on_confirm: bool,
}

pub fn otp_key(kind: ActorKind, contact: &str) -> String {
    format!("otp:{}:{}", kind.role_tag(), contact)
}

pub fn registration_key(kind: ActorKind, contact: &str) -> String {
    format!("registration:{}:{}", kind.role_tag(), contact)
}

fn otp_message(code: &str) -> String {
    format!(
        "Your otp code is: {}, for registering CRM system. Don't give it to anyone",
        code
    )
}

fn corrupt(what: &str, e: serde_json::Error) -> IdentityError {
    IdentityError::Store(format!("Malformed {} value: {}", what, e))
}

pub struct OtpIssuer {
    store: Arc<dyn OtpStore>,
    notifier: Arc<dyn Notifier>,
    policy: OtpPolicy,
}

impl OtpIssuer {
    pub fn new(store: Arc<dyn OtpStore>, notifier: Arc<dyn Notifier>, policy: OtpPolicy) -> Self {
        Self {
            store,
            notifier,
            policy,
        }
    }

    /// Generate, store and send a fresh code, replacing any earlier one.
    ///
    /// A dispatch failure is reported, but the stored code stays valid for
    /// its TTL.
    #[instrument(skip_all, fields(kind = %kind, contact_hash = %hash_for_correlation(contact)))]
    pub async fn issue_and_dispatch(
        &self,
        kind: ActorKind,
        contact: &str,
    ) -> Result<(), IdentityError> {
        let issued = IssuedCode {
            code: generate_otp_code()?,
            issuance_id: Uuid::new_v4(),
        };
        let value = serde_json::to_string(&issued).map_err(|e| corrupt("code", e))?;

        if let Err(e) = self
            .store
            .set_with_expiry(&otp_key(kind, contact), &value, self.policy.ttl)
            .await
        {
            record_otp_issued(kind.role_tag(), "store_error");
            return Err(e);
        }

        if let Err(e) = self.notifier.send(contact, &otp_message(&issued.code)).await {
            warn!(target: "identity.otp", error = %e, "Code stored but dispatch failed");
            record_otp_issued(kind.role_tag(), "dispatch_failed");
            return Err(e);
        }

        info!(target: "identity.otp", issuance_id = %issued.issuance_id, "Code issued");
        record_otp_issued(kind.role_tag(), "success");
        Ok(())
    }

    /// Check a submitted code for `contact`.
    #[instrument(skip_all, fields(kind = %kind, contact_hash = %hash_for_correlation(contact)))]
    pub async fn confirm(
        &self,
        kind: ActorKind,
        contact: &str,
        submitted: &str,
    ) -> Result<ConfirmationTicket, IdentityError> {
        let result = self.check(kind, contact, submitted).await;
        let status = match &result {
            Ok(_) => "success",
            Err(IdentityError::OtpMismatch) => "mismatch",
            Err(IdentityError::OtpExpiredOrAbsent) => "expired",
            Err(_) => "error",
        };
        record_otp_confirm(kind.role_tag(), status);
        result
    }

    async fn check(
        &self,
        kind: ActorKind,
        contact: &str,
        submitted: &str,
    ) -> Result<ConfirmationTicket, IdentityError> {
        let submitted_digest = code_digest(contact, submitted);
        let mut awaiting_completion = false;

        if self.policy.invalidate_on_confirm {
            if let Some(pending) = self.pending(kind, contact).await? {
                awaiting_completion = true;
                if digests_match(&pending.code_digest, &submitted_digest) {
                    info!(
                        target: "identity.otp",
                        issuance_id = %pending.issuance_id,
                        "Resuming pending registration"
                    );
                    return Ok(ConfirmationTicket {
                        contact: contact.to_string(),
                        issuance_id: pending.issuance_id,
                    });
                }
            }
        }

        let key = otp_key(kind, contact);
        let Some(raw) = self.store.get(&key).await? else {
            return Err(if awaiting_completion {
                IdentityError::OtpMismatch
            } else {
                IdentityError::OtpExpiredOrAbsent
            });
        };
        let issued: IssuedCode = serde_json::from_str(&raw).map_err(|e| corrupt("code", e))?;

        if !digests_match(&code_digest(contact, &issued.code), &submitted_digest) {
            return Err(IdentityError::OtpMismatch);
        }

        if self.policy.invalidate_on_confirm {
            let pending = PendingRegistration {
                issuance_id: issued.issuance_id,
                code_digest: submitted_digest,
            };
            let value = serde_json::to_string(&pending).map_err(|e| corrupt("registration", e))?;
            // Marker first: a crash after it leaves the confirmation resumable.
            self.store
                .set_with_expiry(&registration_key(kind, contact), &value, self.policy.saga_ttl)
                .await?;
            self.store.delete(&key).await?;
        }

        Ok(ConfirmationTicket {
            contact: contact.to_string(),
            issuance_id: issued.issuance_id,
        })
    }

    async fn pending(
        &self,
        kind: ActorKind,
        contact: &str,
    ) -> Result<Option<PendingRegistration>, IdentityError> {
        match self.store.get(&registration_key(kind, contact)).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| corrupt("registration", e)),
            None => Ok(None),
        }
    }

    /// Close the saga for `ticket` once the actor is stored.
    ///
    /// Failure here is logged only; the marker expires on its own.
    #[instrument(skip_all, fields(kind = %kind, issuance_id = %ticket.issuance_id))]
    pub async fn complete(&self, kind: ActorKind, ticket: &ConfirmationTicket) {
        if !self.policy.invalidate_on_confirm {
            return;
        }

        let pending = match self.pending(kind, &ticket.contact).await {
            Ok(pending) => pending,
            Err(e) => {
                warn!(target: "identity.otp", error = %e, "Could not read pending registration");
                return;
            }
        };

        // A newer confirmation may own the marker by now.
        if pending.is_some_and(|p| p.issuance_id == ticket.issuance_id) {
            if let Err(e) = self
                .store
                .delete(&registration_key(kind, &ticket.contact))
                .await
            {
                warn!(target: "identity.otp", error = %e, "Could not clear pending registration");
            }
        }
    }
}
