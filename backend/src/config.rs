use std::{env, fmt::Display, str::FromStr};

use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Clone, Debug)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub webhook_secret: String,
    pub api_base: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub jwt_secret: String,
    pub razorpay: RazorpayConfig,
    /// Price of the 12-month subscription in minor currency units.
    pub subscription_price: i64,
    pub currency: String,
    pub cors_origin: Option<String>,
    pub cookie_secure: bool,
    pub expiry_sweep_interval_secs: u64,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let razorpay = RazorpayConfig {
            key_id: required("RAZORPAY_KEY_ID")?,
            key_secret: required("RAZORPAY_KEY_SECRET")?,
            webhook_secret: required("RAZORPAY_WEBHOOK_SECRET")?,
            api_base: try_load("RAZORPAY_API_BASE", "https://api.razorpay.com/v1")?,
        };

        let subscription_price: i64 = try_load("SUBSCRIPTION_PRICE", "99900")?;
        if subscription_price <= 0 {
            return Err(ConfigError::Invalid {
                key: "SUBSCRIPTION_PRICE",
                reason: "must be positive".to_string(),
            });
        }

        Ok(Self {
            database_url: try_load("DATABASE_URL", "sqlite://edustream.db")?,
            bind_addr: try_load("BIND_ADDR", "127.0.0.1:3000")?,
            jwt_secret: required("JWT_SECRET")?,
            razorpay,
            subscription_price,
            currency: try_load("CURRENCY", "INR")?,
            cors_origin: optional("CORS_ORIGIN"),
            cookie_secure: try_load("COOKIE_SECURE", "false")?,
            expiry_sweep_interval_secs: try_load("EXPIRY_SWEEP_INTERVAL_SECS", "3600")?,
            admin_email: optional("ADMIN_EMAIL"),
            admin_password: optional("ADMIN_PASSWORD"),
        })
    }

    /// Fixed configuration for tests and local tooling.
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            jwt_secret: "test-jwt-secret".to_string(),
            razorpay: RazorpayConfig {
                key_id: "rzp_test_key".to_string(),
                key_secret: "test-key-secret".to_string(),
                webhook_secret: "test-webhook-secret".to_string(),
                api_base: "http://127.0.0.1:9".to_string(),
            },
            subscription_price: 99900,
            currency: "INR".to_string(),
            cors_origin: None,
            cookie_secure: false,
            expiry_sweep_interval_secs: 3600,
            admin_email: None,
            admin_password: None,
        }
    }
}

fn optional(key: &'static str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    optional(key).ok_or(ConfigError::Missing(key))
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    optional(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse::<T>()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                key,
                reason: e.to_string(),
            }
        })
}
