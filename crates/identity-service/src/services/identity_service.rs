//! Identity lifecycle shared by all six actor kinds.
//!
//! Every operation takes the [`ActorKind`] it acts for; the kind selects the
//! role tag, login prefix and field set, so there is one implementation
//! rather than one per kind.

use crate::crypto::{dummy_password_hash, hash_password, verify_password};
use crate::errors::IdentityError;
use crate::models::{
    is_valid_email, validate_password, Actor, ActorKind, ActorList, ActorProfile,
    ChangePasswordRequest, ChangePasswordResponse, LoginRequest, NewActor,
    RegisterConfirmRequest, RegisterConfirmResponse, RegisterResponse, TokenPair,
};
use crate::observability::hash_for_correlation;
use crate::observability::metrics::record_login;
use crate::repositories::ActorRepository;
use crate::services::otp_service::OtpIssuer;
use crate::services::token_service::TokenMinter;
use common::secret::ExposeSecret;
use common::types::ListFilter;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub struct IdentityService {
    actors: Arc<dyn ActorRepository>,
    otp: OtpIssuer,
    tokens: Arc<TokenMinter>,
    bcrypt_cost: u32,
    /// Verified in place of a real digest when a login handle is unknown.
    dummy_hash: String,
}

/// Canonical form of a contact address: trimmed and lowercased.
pub fn normalize_contact(address: &str) -> String {
    address.trim().to_lowercase()
}

fn not_found(kind: ActorKind) -> IdentityError {
    IdentityError::NotFound(kind.display_name().to_string())
}

impl IdentityService {
    pub fn new(
        actors: Arc<dyn ActorRepository>,
        otp: OtpIssuer,
        tokens: Arc<TokenMinter>,
        bcrypt_cost: u32,
    ) -> Result<Self, IdentityError> {
        let dummy_hash = dummy_password_hash(bcrypt_cost)?;
        Ok(Self {
            actors,
            otp,
            tokens,
            bcrypt_cost,
            dummy_hash,
        })
    }

    // ========================================================================
    // Record management
    // ========================================================================

    #[instrument(skip_all, fields(kind = %kind))]
    pub async fn create(&self, kind: ActorKind, draft: NewActor) -> Result<Actor, IdentityError> {
        draft.profile.validate_for(kind)?;
        let password = draft.password.expose_secret();
        validate_password(password)?;

        let digest = hash_password(password, self.bcrypt_cost)?;
        let actor = self
            .actors
            .create(kind, &draft.profile, &digest, None)
            .await?;

        info!(
            target: "identity.service",
            actor_id = %actor.id,
            login_hash = %hash_for_correlation(&actor.user_login),
            "Actor created"
        );
        Ok(actor)
    }

    #[instrument(skip_all, fields(kind = %kind, actor_id = %id))]
    pub async fn update(
        &self,
        kind: ActorKind,
        id: Uuid,
        profile: ActorProfile,
    ) -> Result<Actor, IdentityError> {
        profile.validate_for(kind)?;
        self.actors
            .update(kind, id, &profile)
            .await?
            .ok_or_else(|| not_found(kind))
    }

    #[instrument(skip_all, fields(kind = %kind))]
    pub async fn get_list(
        &self,
        kind: ActorKind,
        filter: &ListFilter,
    ) -> Result<ActorList, IdentityError> {
        self.actors.get_all(kind, filter).await
    }

    #[instrument(skip_all, fields(kind = %kind, actor_id = %id))]
    pub async fn get_by_id(&self, kind: ActorKind, id: Uuid) -> Result<Actor, IdentityError> {
        self.actors
            .get_by_id(kind, id)
            .await?
            .ok_or_else(|| not_found(kind))
    }

    #[instrument(skip_all, fields(kind = %kind, actor_id = %id))]
    pub async fn delete(&self, kind: ActorKind, id: Uuid) -> Result<(), IdentityError> {
        if self.actors.delete(kind, id).await? {
            info!(target: "identity.service", "Actor soft-deleted");
            Ok(())
        } else {
            Err(not_found(kind))
        }
    }

    /// Whether a live actor of this kind has the given id.
    #[instrument(skip_all, fields(kind = %kind, actor_id = %id))]
    pub async fn check(&self, kind: ActorKind, id: Uuid) -> Result<bool, IdentityError> {
        self.actors.exists(kind, id).await
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    /// Exchange a login handle and password for a token pair.
    ///
    /// Unknown handles and wrong passwords produce the same error, and an
    /// unknown handle still costs one bcrypt verification.
    #[instrument(skip_all, fields(kind = %kind, login_hash = %hash_for_correlation(&request.user_login)))]
    pub async fn login(
        &self,
        kind: ActorKind,
        request: LoginRequest,
    ) -> Result<TokenPair, IdentityError> {
        let credential = self
            .actors
            .get_credential_by_login(kind, &request.user_login)
            .await?;

        let digest = credential
            .as_ref()
            .map_or(self.dummy_hash.as_str(), |c| c.password_hash.as_str());

        let is_valid = match verify_password(request.password.expose_secret(), digest) {
            Ok(valid) => valid,
            Err(e) => {
                warn!(target: "identity.service", error = %e, "Stored digest could not be verified");
                false
            }
        };

        let Some(credential) = credential.filter(|_| is_valid) else {
            record_login(kind.role_tag(), "failure");
            return Err(IdentityError::InvalidCredentials);
        };

        let tokens = self.tokens.mint(credential.subject_id, kind)?;
        record_login(kind.role_tag(), "success");
        info!(target: "identity.service", actor_id = %credential.subject_id, "Login succeeded");
        Ok(tokens)
    }

    /// Start self-registration: send a one-time code to `email`.
    #[instrument(skip_all, fields(kind = %kind))]
    pub async fn register(
        &self,
        kind: ActorKind,
        email: &str,
    ) -> Result<RegisterResponse, IdentityError> {
        let contact = normalize_contact(email);
        if !is_valid_email(&contact) {
            return Err(IdentityError::Validation("email is malformed".to_string()));
        }

        self.otp.issue_and_dispatch(kind, &contact).await?;

        Ok(RegisterResponse {
            comment: "Otp code sent to your email".to_string(),
        })
    }

    /// Finish self-registration.
    ///
    /// The actor is created only after the code for this exact address and
    /// kind is confirmed, and it is keyed by the confirmed issuance, so a
    /// retried request returns the same actor instead of a second one.
    #[instrument(skip_all, fields(kind = %kind))]
    pub async fn register_confirm(
        &self,
        kind: ActorKind,
        request: RegisterConfirmRequest,
    ) -> Result<RegisterConfirmResponse, IdentityError> {
        let contact = normalize_contact(&request.email);
        if !is_valid_email(&contact) {
            return Err(IdentityError::Validation("email is malformed".to_string()));
        }

        let NewActor {
            mut profile,
            password,
        } = request.actor;
        profile.email = Some(contact.clone());
        profile.validate_for(kind)?;
        validate_password(password.expose_secret())?;

        let ticket = self
            .otp
            .confirm(kind, &contact, request.otp.expose_secret())
            .await?;

        let digest = hash_password(password.expose_secret(), self.bcrypt_cost)?;
        let actor = self
            .actors
            .create(kind, &profile, &digest, Some(ticket.issuance_id))
            .await?;

        self.otp.complete(kind, &ticket).await;

        let tokens = self.tokens.mint(actor.id, kind)?;
        info!(
            target: "identity.service",
            actor_id = %actor.id,
            issuance_id = %ticket.issuance_id,
            "Registration confirmed"
        );

        Ok(RegisterConfirmResponse {
            tokens,
            subject_id: actor.id,
            user_login: actor.user_login,
        })
    }

    #[instrument(skip_all, fields(kind = %kind, login_hash = %hash_for_correlation(&request.user_login)))]
    pub async fn change_password(
        &self,
        kind: ActorKind,
        request: ChangePasswordRequest,
    ) -> Result<ChangePasswordResponse, IdentityError> {
        let new_password = request.new_password.expose_secret();
        validate_password(new_password)?;

        let Some(current) = self
            .actors
            .get_password(kind, &request.user_login)
            .await?
        else {
            return Err(IdentityError::IncorrectLogin);
        };

        if !verify_password(request.old_password.expose_secret(), &current)? {
            return Err(IdentityError::PasswordMismatch);
        }

        let digest = hash_password(new_password, self.bcrypt_cost)?;
        // A concurrent change since the read means the old password we
        // verified is no longer current.
        if !self
            .actors
            .replace_password_hash(kind, &request.user_login, &current, &digest)
            .await?
        {
            return Err(IdentityError::PasswordMismatch);
        }

        info!(target: "identity.service", "Password changed");
        Ok(ChangePasswordResponse {
            comment: "Password changed successfully".to_string(),
        })
    }
}
