use crate::config::MIN_SIGNING_SECRET_BYTES;
use crate::crypto::{self, Claims, TokenUse, JWT_CLOCK_SKEW_SECONDS};
use crate::errors::IdentityError;
use crate::models::{ActorKind, TokenPair};
use crate::observability::metrics::record_token_mint;
use chrono::Utc;
use common::secret::{ExposeSecret, SecretBox};
use std::time::Duration;
use tracing::instrument;
use uuid::Uuid;

/// Random bytes behind each token's `jti`.
const TOKEN_ID_BYTES: usize = 16;

/// Mints and verifies the stateless access/refresh pair.
///
/// The signing secret is loaded once at startup and shared by every kind;
/// the kind only changes the `role` claim.
pub struct TokenMinter {
    secret: SecretBox<Vec<u8>>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenMinter {
    /// # Errors
    ///
    /// Returns `IdentityError::Signing` if the secret is shorter than
    /// `MIN_SIGNING_SECRET_BYTES`.
    pub fn new(
        secret: SecretBox<Vec<u8>>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Result<Self, IdentityError> {
        if secret.expose_secret().len() < MIN_SIGNING_SECRET_BYTES {
            return Err(IdentityError::Signing(format!(
                "Signing secret must be at least {} bytes",
                MIN_SIGNING_SECRET_BYTES
            )));
        }
        Ok(Self {
            secret,
            access_ttl,
            refresh_ttl,
        })
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    #[instrument(skip_all, fields(role = %kind))]
    pub fn mint(&self, subject_id: Uuid, kind: ActorKind) -> Result<TokenPair, IdentityError> {
        let result = self.mint_pair(subject_id, kind);
        record_token_mint(if result.is_ok() { "success" } else { "error" });
        result
    }

    fn mint_pair(&self, subject_id: Uuid, kind: ActorKind) -> Result<TokenPair, IdentityError> {
        let now = Utc::now().timestamp();
        let access = self.sign(subject_id, kind, TokenUse::Access, now, self.access_ttl)?;
        let refresh = self.sign(subject_id, kind, TokenUse::Refresh, now, self.refresh_ttl)?;

        Ok(TokenPair {
            access_token: access,
            refresh_token: refresh,
            token_type: "Bearer".to_string(),
            expires_in: self.access_ttl.as_secs(),
        })
    }

    fn sign(
        &self,
        subject_id: Uuid,
        kind: ActorKind,
        token_use: TokenUse,
        issued_at: i64,
        ttl: Duration,
    ) -> Result<String, IdentityError> {
        let ttl_seconds = i64::try_from(ttl.as_secs())
            .map_err(|_| IdentityError::Signing("Token lifetime out of range".to_string()))?;
        let claims = Claims {
            subject_id: subject_id.to_string(),
            role: kind.role_tag().to_string(),
            token_use,
            issued_at,
            expires_at: issued_at.saturating_add(ttl_seconds),
            jti: hex::encode(crypto::generate_random_bytes(TOKEN_ID_BYTES)?),
        };
        crypto::sign_token(&claims, self.secret.expose_secret())
    }

    /// Verify a token and check it is the expected half of the pair.
    pub fn verify(&self, token: &str, expected: TokenUse) -> Result<Claims, IdentityError> {
        let claims = crypto::verify_token(token, self.secret.expose_secret(), JWT_CLOCK_SKEW_SECONDS)?;
        if claims.token_use != expected {
            return Err(IdentityError::InvalidToken(
                "The token is invalid or expired".to_string(),
            ));
        }
        Ok(claims)
    }
}
