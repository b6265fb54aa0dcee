//! Short-lived key-value storage for one-time codes.
//!
//! # Key Patterns
//!
//! - `otp:{role_tag}:{contact}` - issued code (JSON, expires with the code TTL)
//! - `registration:{role_tag}:{contact}` - pending registration marker (JSON,
//!   expires with the saga TTL)
//!
//! `MultiplexedConnection` is cheap to clone and safe to use concurrently, so
//! every operation clones it instead of locking.

use crate::errors::IdentityError;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::time::Duration;
use tracing::{error, instrument};

#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value, expiring
    /// after `ttl`.
    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), IdentityError>;

    async fn get(&self, key: &str) -> Result<Option<String>, IdentityError>;

    async fn delete(&self, key: &str) -> Result<(), IdentityError>;
}

/// Redis-backed store.
#[derive(Clone)]
pub struct RedisOtpStore {
    connection: MultiplexedConnection,
}

impl RedisOtpStore {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Store` if the URL is invalid or the server is
    /// unreachable.
    pub async fn connect(redis_url: &str) -> Result<Self, IdentityError> {
        let client = Client::open(redis_url).map_err(|e| {
            // The URL may embed a password; log only the error.
            error!(target: "identity.otp.store", error = %e, "Failed to open Redis client");
            IdentityError::Store(format!("Failed to open Redis client: {e}"))
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                error!(target: "identity.otp.store", error = %e, "Failed to connect to Redis");
                IdentityError::Store(format!("Failed to connect to Redis: {e}"))
            })?;

        Ok(Self { connection })
    }
}

#[async_trait]
impl OtpStore for RedisOtpStore {
    #[instrument(skip_all)]
    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), IdentityError> {
        let mut conn = self.connection.clone();
        let seconds = ttl.as_secs().max(1);
        let _: () = conn.set_ex(key, value, seconds).await.map_err(|e| {
            error!(target: "identity.otp.store", error = %e, "SET EX failed");
            IdentityError::Store(format!("Failed to store value: {e}"))
        })?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn get(&self, key: &str) -> Result<Option<String>, IdentityError> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await.map_err(|e| {
            error!(target: "identity.otp.store", error = %e, "GET failed");
            IdentityError::Store(format!("Failed to read value: {e}"))
        })?;
        Ok(value)
    }

    #[instrument(skip_all)]
    async fn delete(&self, key: &str) -> Result<(), IdentityError> {
        let mut conn = self.connection.clone();
        let _: () = conn.del(key).await.map_err(|e| {
            error!(target: "identity.otp.store", error = %e, "DEL failed");
            IdentityError::Store(format!("Failed to delete value: {e}"))
        })?;
        Ok(())
    }
}

pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Mutex;
    use tokio::time::Instant;

    /// In-memory store with expiry measured on the tokio clock, so tests can
    /// move time with `tokio::time::advance`.
    #[derive(Default)]
    pub struct InMemoryOtpStore {
        entries: Mutex<HashMap<String, (String, Instant)>>,
        unavailable: AtomicBool,
    }

    impl InMemoryOtpStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every subsequent call fail, as if the store were down.
        pub fn set_unavailable(&self, unavailable: bool) {
            self.unavailable.store(unavailable, Ordering::SeqCst);
        }

        /// Live value under `key`, bypassing the failure switch.
        pub async fn peek(&self, key: &str) -> Option<String> {
            let entries = self.entries.lock().await;
            entries
                .get(key)
                .filter(|(_, expires_at)| Instant::now() < *expires_at)
                .map(|(value, _)| value.clone())
        }

        fn check_available(&self) -> Result<(), IdentityError> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(IdentityError::Store("Mock store unavailable".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl OtpStore for InMemoryOtpStore {
        async fn set_with_expiry(
            &self,
            key: &str,
            value: &str,
            ttl: Duration,
        ) -> Result<(), IdentityError> {
            self.check_available()?;
            self.entries
                .lock()
                .await
                .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
            Ok(())
        }

        async fn get(&self, key: &str) -> Result<Option<String>, IdentityError> {
            self.check_available()?;
            let mut entries = self.entries.lock().await;
            let expired = entries
                .get(key)
                .is_some_and(|(_, expires_at)| Instant::now() >= *expires_at);
            if expired {
                entries.remove(key);
            }
            Ok(entries.get(key).map(|(value, _)| value.clone()))
        }

        async fn delete(&self, key: &str) -> Result<(), IdentityError> {
            self.check_available()?;
            self.entries.lock().await.remove(key);
            Ok(())
        }
    }

}
