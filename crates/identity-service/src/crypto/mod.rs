use crate::config::{MAX_BCRYPT_COST, MIN_BCRYPT_COST};
use crate::errors::IdentityError;
use crate::observability::metrics::record_bcrypt_duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Instant;
use tracing::instrument;

/// Maximum accepted token size in bytes. Larger tokens are rejected before
/// any decoding work.
const MAX_JWT_SIZE_BYTES: usize = 4096;

/// Tolerated clock drift when checking `iat`.
pub const JWT_CLOCK_SKEW_SECONDS: i64 = 300;

/// Number of digits in a one-time code.
pub const OTP_CODE_DIGITS: usize = 6;

const OTP_CODE_SPACE: u32 = 1_000_000;

/// Largest multiple of `OTP_CODE_SPACE` that fits in a `u32`; samples at or
/// above it are redrawn so every code is equally likely.
const OTP_REJECTION_BOUND: u32 = u32::MAX - (u32::MAX % OTP_CODE_SPACE);

const DUMMY_PASSWORD: &str = "dummy-password-for-unknown-handles";

/// Which half of a token pair a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenUse {
    Access,
    Refresh,
}

/// Claims carried by access and refresh tokens.
///
/// `subject_id` identifies a person, so `Debug` redacts it.
#[derive(Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "sub")]
    pub subject_id: String,
    pub role: String,
    pub token_use: TokenUse,
    #[serde(rename = "iat")]
    pub issued_at: i64,
    #[serde(rename = "exp")]
    pub expires_at: i64,
    pub jti: String,
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("subject_id", &"[REDACTED]")
            .field("role", &self.role)
            .field("token_use", &self.token_use)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("jti", &self.jti)
            .finish()
    }
}

/// Sign claims with HMAC-SHA256.
#[instrument(skip_all)]
pub fn sign_token(claims: &Claims, secret: &[u8]) -> Result<String, IdentityError> {
    if secret.is_empty() {
        return Err(IdentityError::Signing("Empty signing secret".to_string()));
    }

    let mut header = Header::new(Algorithm::HS256);
    header.typ = Some("JWT".to_string());

    encode(&header, claims, &EncodingKey::from_secret(secret))
        .map_err(|e| IdentityError::Signing(format!("JWT signing operation failed: {}", e)))
}

/// Verify signature, expiry and issued-at of a token.
#[instrument(skip_all)]
pub fn verify_token(
    token: &str,
    secret: &[u8],
    clock_skew_seconds: i64,
) -> Result<Claims, IdentityError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "identity.crypto",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(invalid_token());
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.leeway = 0;

    let token_data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)
        .map_err(|e| {
            tracing::debug!(target: "identity.crypto", error = %e, "Token verification failed");
            invalid_token()
        })?;

    let max_iat = chrono::Utc::now().timestamp() + clock_skew_seconds;
    if token_data.claims.issued_at > max_iat {
        tracing::debug!(
            target: "identity.crypto",
            iat = token_data.claims.issued_at,
            max_allowed = max_iat,
            "Token rejected: iat too far in the future"
        );
        return Err(invalid_token());
    }

    Ok(token_data.claims)
}

fn invalid_token() -> IdentityError {
    IdentityError::InvalidToken("The token is invalid or expired".to_string())
}

/// Hash a password with bcrypt at the given cost.
#[instrument(skip_all)]
/// bcrypt digest verified when a login handle does not exist.
///
/// Must be produced at the same cost as real digests, or unknown handles
/// answer faster than wrong passwords.
pub fn dummy_password_hash(cost: u32) -> Result<String, IdentityError> {
    hash_password(DUMMY_PASSWORD, cost)
}

pub fn hash_password(plaintext: &str, cost: u32) -> Result<String, IdentityError> {
    if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
        return Err(IdentityError::Hashing(format!(
            "Invalid bcrypt cost: {} (must be {}-{})",
            cost, MIN_BCRYPT_COST, MAX_BCRYPT_COST
        )));
    }

    let start = Instant::now();
    let result = bcrypt::hash(plaintext, cost)
        .map_err(|e| IdentityError::Hashing(format!("Password hashing failed: {}", e)));
    record_bcrypt_duration("hash", start.elapsed());
    result
}

/// Check a password against a stored bcrypt digest.
///
/// Returns `Ok(false)` on mismatch and an error only when the digest itself
/// is malformed.
#[instrument(skip_all)]
pub fn verify_password(plaintext: &str, digest: &str) -> Result<bool, IdentityError> {
    let start = Instant::now();
    let result = bcrypt::verify(plaintext, digest)
        .map_err(|e| IdentityError::Hashing(format!("Password verification failed: {}", e)));
    record_bcrypt_duration("verify", start.elapsed());
    result
}

pub fn generate_random_bytes(len: usize) -> Result<Vec<u8>, IdentityError> {
    let rng = SystemRandom::new();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes)
        .map_err(|_| IdentityError::Internal)?;
    Ok(bytes)
}

/// Draw a uniformly distributed 6-digit code from the system CSPRNG.
#[instrument(skip_all)]
pub fn generate_otp_code() -> Result<String, IdentityError> {
    let rng = SystemRandom::new();
    loop {
        let mut buf = [0u8; 4];
        rng.fill(&mut buf).map_err(|_| IdentityError::Internal)?;
        let sample = u32::from_be_bytes(buf);
        if sample < OTP_REJECTION_BOUND {
            return Ok(format!(
                "{:0width$}",
                sample % OTP_CODE_SPACE,
                width = OTP_CODE_DIGITS
            ));
        }
    }
}

/// SHA-256 digest binding a code to the address it was sent to.
pub fn code_digest(contact: &str, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(contact.as_bytes());
    hasher.update([0u8]);
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare two digests without short-circuiting on the first differing byte.
pub fn digests_match(a: &str, b: &str) -> bool {
    ring::constant_time::verify_slices_are_equal(a.as_bytes(), b.as_bytes()).is_ok()
}
