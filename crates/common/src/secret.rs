//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports [`secrecy`] so every crate in the workspace wraps passwords,
//! one-time codes and signing keys the same way. `SecretBox<T>` and
//! `SecretString` implement `Debug` with redaction, so a request struct that
//! derives `Debug` stays safe to log.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct LoginRequest {
//!     user_login: String,
//!     password: SecretString,
//! }
//!
//! let req = LoginRequest {
//!     user_login: "S00001".to_string(),
//!     password: SecretString::from("hunter2hunter2"),
//! };
//!
//! assert!(!format!("{req:?}").contains("hunter2"));
//! let password: &str = req.password.expose_secret();
//! assert_eq!(password, "hunter2hunter2");
//! ```
//!
//! With the `serde` feature of `secrecy` enabled, request bodies can carry
//! secrets directly:
//!
//! ```rust
//! use serde::Deserialize;
//! use common::secret::SecretString;
//!
//! #[derive(Debug, Deserialize)]
//! struct ChangePassword {
//!     user_login: String,
//!     old_password: SecretString,
//!     new_password: SecretString,
//! }
//!
//! let json = r#"{"user_login": "T00004", "old_password": "a", "new_password": "b"}"#;
//! let body: ChangePassword = serde_json::from_str(json).unwrap();
//! assert_eq!(body.user_login, "T00004");
//! ```

// Re-export the main types from secrecy
pub use secrecy::{ExposeSecret, SecretBox, SecretString};
