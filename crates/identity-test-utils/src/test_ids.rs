//! Fixed test IDs for deterministic tests
//!
//! Using fixed UUIDs prevents flaky tests caused by random data.

use uuid::Uuid;

// Branch IDs (1-99)
pub const TEST_BRANCH_CHILONZOR: Uuid = Uuid::from_u128(1);
pub const TEST_BRANCH_YUNUSOBOD: Uuid = Uuid::from_u128(2);

// Group IDs (100-199)
pub const TEST_GROUP_IELTS_A: Uuid = Uuid::from_u128(100);

// IDs that are never stored (1000-1099)
pub const TEST_MISSING_ID: Uuid = Uuid::from_u128(1000);

/// HS256 signing secret for test servers. Exactly the minimum length.
pub const TEST_SIGNING_SECRET: [u8; 32] = *b"identity-test-signing-secret-32b";

// Passwords
pub const TEST_PASSWORD: &str = "correct-horse-battery";
pub const TEST_NEW_PASSWORD: &str = "staple-horse-correct";

// Contacts
pub const TEST_EMAIL_ANN: &str = "ann@example.com";
pub const TEST_EMAIL_BOB: &str = "bob@example.com";
