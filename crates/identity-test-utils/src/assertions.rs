//! Custom test assertions for expressive tests
//!
//! Provides trait-based assertions for issued tokens.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use serde::Deserialize;

/// JWT header structure
#[derive(Debug, Deserialize)]
struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

/// JWT claims structure
#[derive(Debug, Deserialize)]
struct JwtClaims {
    pub sub: String,
    pub role: String,
    pub token_use: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

fn segment(token: &str, index: usize) -> Vec<u8> {
    let part = token
        .split('.')
        .nth(index)
        .unwrap_or_else(|| panic!("JWT is missing segment {}", index));
    URL_SAFE_NO_PAD
        .decode(part)
        .unwrap_or_else(|e| panic!("Failed to base64 decode JWT segment {}: {}", index, e))
}

fn claims(token: &str) -> JwtClaims {
    serde_json::from_slice(&segment(token, 1)).expect("Failed to parse JWT claims")
}

/// Custom assertions for issued tokens
///
/// # Example
/// ```rust,ignore
/// tokens.access_token
///     .assert_valid_jwt()
///     .assert_role("student")
///     .assert_token_use("access")
///     .assert_expires_in(3600);
/// ```
pub trait TokenAssertions {
    /// Assert that the token is an HS256 JWT with readable claims
    fn assert_valid_jwt(&self) -> &Self;

    /// Assert the role claim
    fn assert_role(&self, role: &str) -> &Self;

    /// Assert whether this is an access or refresh token
    fn assert_token_use(&self, token_use: &str) -> &Self;

    /// Assert that the token expires within the specified seconds
    fn assert_expires_in(&self, seconds: u64) -> &Self;

    /// Assert that the token is for the specified subject
    fn assert_for_subject(&self, subject: &str) -> &Self;
}

impl TokenAssertions for String {
    fn assert_valid_jwt(&self) -> &Self {
        assert_eq!(
            self.split('.').count(),
            3,
            "JWT must have 3 parts (header.payload.signature)"
        );

        let header: JwtHeader =
            serde_json::from_slice(&segment(self, 0)).expect("Failed to parse JWT header JSON");
        assert_eq!(header.alg, "HS256", "Expected HS256 algorithm");
        assert_eq!(header.typ, "JWT", "Expected JWT type");

        let claims = claims(self);
        assert!(claims.exp > claims.iat, "exp must be after iat");
        assert!(!claims.jti.is_empty(), "jti must be set");

        self
    }

    fn assert_role(&self, role: &str) -> &Self {
        let claims = claims(self);
        assert_eq!(claims.role, role, "Unexpected role claim");
        self
    }

    fn assert_token_use(&self, token_use: &str) -> &Self {
        let claims = claims(self);
        assert_eq!(claims.token_use, token_use, "Unexpected token_use claim");
        self
    }

    fn assert_expires_in(&self, seconds: u64) -> &Self {
        let claims = claims(self);
        let remaining = claims.exp - Utc::now().timestamp();
        // Allow a few seconds for test execution time
        assert!(
            remaining <= seconds as i64 && remaining >= seconds as i64 - 5,
            "Token expires in {}s, expected about {}s",
            remaining,
            seconds
        );
        self
    }

    fn assert_for_subject(&self, subject: &str) -> &Self {
        let claims = claims(self);
        assert_eq!(claims.sub, subject, "Unexpected subject");
        self
    }
}
