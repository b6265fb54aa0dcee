//! Connection settings shared by services and test harnesses.

use serde::{Deserialize, Serialize};

/// Default size of the PostgreSQL connection pool.
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// Database settings with the default pool size.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: DEFAULT_DB_MAX_CONNECTIONS,
        }
    }
}

/// Redis configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL. May embed credentials, so never log it.
    pub url: String,
}
