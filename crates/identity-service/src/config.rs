use base64::{engine::general_purpose, Engine as _};
use common::config::{DatabaseConfig, RedisConfig, DEFAULT_DB_MAX_CONNECTIONS};
use common::secret::SecretBox;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default bcrypt cost factor for password hashing.
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// Minimum accepted bcrypt cost. Lower values hash too quickly to resist
/// offline guessing.
pub const MIN_BCRYPT_COST: u32 = 10;

/// Maximum accepted bcrypt cost. Higher values make login unacceptably slow.
pub const MAX_BCRYPT_COST: u32 = 14;

/// Minimum length of the decoded token signing secret, in bytes.
pub const MIN_SIGNING_SECRET_BYTES: usize = 32;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8083";
pub const DEFAULT_ACCESS_TOKEN_TTL_SECONDS: u64 = 3600;
pub const DEFAULT_REFRESH_TOKEN_TTL_SECONDS: u64 = 86_400;
pub const DEFAULT_OTP_TTL_SECONDS: u64 = 120;
pub const DEFAULT_REGISTRATION_SAGA_TTL_SECONDS: u64 = 900;
pub const DEFAULT_ENROLLMENT_BUFFER_HOURS: f64 = 5.0;
pub const DEFAULT_ENROLLMENT_MIN_LEAD_HOURS: f64 = 3.0;

#[derive(Debug)]
pub struct Config {
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub bind_address: String,
    /// HMAC key for access and refresh tokens.
    pub jwt_signing_secret: SecretBox<Vec<u8>>,
    pub bcrypt_cost: u32,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub otp_ttl: Duration,
    pub registration_saga_ttl: Duration,
    pub invalidate_otp_on_confirm: bool,
    pub enrollment_buffer_hours: f64,
    pub enrollment_min_lead_hours: f64,
    pub enforce_branch_conflict: bool,
    /// Mail relay endpoint. `None` selects the logging notifier.
    pub notifier_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid signing secret: {0}")]
    InvalidSigningSecret(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = required(vars, "DATABASE_URL")?;
        let redis_url = required(vars, "REDIS_URL")?;

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let secret_base64 = required(vars, "JWT_SIGNING_SECRET")?;
        let secret = general_purpose::STANDARD
            .decode(secret_base64.trim())
            .map_err(ConfigError::Base64Error)?;
        if secret.len() < MIN_SIGNING_SECRET_BYTES {
            return Err(ConfigError::InvalidSigningSecret(format!(
                "Expected at least {} bytes, got {}",
                MIN_SIGNING_SECRET_BYTES,
                secret.len()
            )));
        }

        let bcrypt_cost = parse_or(vars, "BCRYPT_COST", DEFAULT_BCRYPT_COST)?;
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&bcrypt_cost) {
            return Err(invalid(
                "BCRYPT_COST",
                format!(
                    "must be between {} and {}, got {}",
                    MIN_BCRYPT_COST, MAX_BCRYPT_COST, bcrypt_cost
                ),
            ));
        }

        let access_ttl = parse_or(
            vars,
            "ACCESS_TOKEN_TTL_SECONDS",
            DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
        )?;
        let refresh_ttl = parse_or(
            vars,
            "REFRESH_TOKEN_TTL_SECONDS",
            DEFAULT_REFRESH_TOKEN_TTL_SECONDS,
        )?;
        if access_ttl == 0 {
            return Err(invalid("ACCESS_TOKEN_TTL_SECONDS", "must be positive"));
        }
        if refresh_ttl <= access_ttl {
            return Err(invalid(
                "REFRESH_TOKEN_TTL_SECONDS",
                "must be greater than ACCESS_TOKEN_TTL_SECONDS",
            ));
        }

        let otp_ttl = parse_or(vars, "OTP_TTL_SECONDS", DEFAULT_OTP_TTL_SECONDS)?;
        if otp_ttl == 0 {
            return Err(invalid("OTP_TTL_SECONDS", "must be positive"));
        }
        let saga_ttl = parse_or(
            vars,
            "REGISTRATION_SAGA_TTL_SECONDS",
            DEFAULT_REGISTRATION_SAGA_TTL_SECONDS,
        )?;
        if saga_ttl == 0 {
            return Err(invalid("REGISTRATION_SAGA_TTL_SECONDS", "must be positive"));
        }

        let buffer_hours = parse_or(
            vars,
            "ENROLLMENT_BUFFER_HOURS",
            DEFAULT_ENROLLMENT_BUFFER_HOURS,
        )?;
        let min_lead_hours = parse_or(
            vars,
            "ENROLLMENT_MIN_LEAD_HOURS",
            DEFAULT_ENROLLMENT_MIN_LEAD_HOURS,
        )?;
        if !buffer_hours.is_finite() || buffer_hours < 0.0 {
            return Err(invalid("ENROLLMENT_BUFFER_HOURS", "must be non-negative"));
        }
        if !min_lead_hours.is_finite() || min_lead_hours < 0.0 {
            return Err(invalid("ENROLLMENT_MIN_LEAD_HOURS", "must be non-negative"));
        }

        let max_connections = parse_or(vars, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?;
        if max_connections == 0 {
            return Err(invalid("DB_MAX_CONNECTIONS", "must be positive"));
        }

        let notifier_url = vars
            .get("NOTIFIER_URL")
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        Ok(Config {
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            redis: RedisConfig { url: redis_url },
            bind_address,
            jwt_signing_secret: SecretBox::new(Box::new(secret)),
            bcrypt_cost,
            access_token_ttl: Duration::from_secs(access_ttl),
            refresh_token_ttl: Duration::from_secs(refresh_ttl),
            otp_ttl: Duration::from_secs(otp_ttl),
            registration_saga_ttl: Duration::from_secs(saga_ttl),
            invalidate_otp_on_confirm: parse_bool_or(vars, "INVALIDATE_OTP_ON_CONFIRM", true)?,
            enrollment_buffer_hours: buffer_hours,
            enrollment_min_lead_hours: min_lead_hours,
            enforce_branch_conflict: parse_bool_or(vars, "ENFORCE_BRANCH_CONFLICT", false)?,
            notifier_url,
        })
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn invalid(name: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn parse_or<T>(vars: &HashMap<String, String>, name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match vars.get(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| invalid(name, e.to_string())),
        None => Ok(default),
    }
}

fn parse_bool_or(
    vars: &HashMap<String, String>,
    name: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    match vars.get(name).map(|raw| raw.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(value) => match value.as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => Err(invalid(name, format!("expected a boolean, got '{}'", other))),
        },
    }
}
