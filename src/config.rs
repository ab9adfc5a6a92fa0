//! Service configuration, read from the environment (and `.env` via dotenvy).

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::application::checkout::CheckoutSettings;
use crate::domain::aggregates::stock_ledger::DEFAULT_NEAR_EXPIRY_DAYS;
use crate::domain::services::PricingPolicy;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub nats_url: Option<String>,
    pub nats_subject_prefix: String,
    pub pricing: PricingPolicy,
    pub checkout: CheckoutSettings,
    pub near_expiry_days: u32,
    pub seed_catalog: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let text = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let defaults = PricingPolicy::default();
        let pricing = PricingPolicy {
            currency: text("CURRENCY").unwrap_or(defaults.currency).to_uppercase(),
            tax_rate: setting(&text, "TAX_RATE", defaults.tax_rate)?,
            free_shipping_threshold: setting(&text, "FREE_SHIPPING_THRESHOLD", defaults.free_shipping_threshold)?,
            flat_shipping_fee: setting(&text, "FLAT_SHIPPING_FEE", defaults.flat_shipping_fee)?,
        };
        if pricing.tax_rate < Decimal::ZERO {
            return Err(ConfigError::Invalid { name: "TAX_RATE", value: pricing.tax_rate.to_string() });
        }
        if pricing.flat_shipping_fee < Decimal::ZERO {
            return Err(ConfigError::Invalid { name: "FLAT_SHIPPING_FEE", value: pricing.flat_shipping_fee.to_string() });
        }

        let max_attempts: u32 = setting(&text, "CHECKOUT_MAX_ATTEMPTS", 5)?;
        if max_attempts == 0 {
            return Err(ConfigError::Invalid { name: "CHECKOUT_MAX_ATTEMPTS", value: "0".into() });
        }
        let timeout_ms: u64 = setting(&text, "CHECKOUT_TIMEOUT_MS", 5000)?;

        Ok(Self {
            port: setting(&text, "PORT", 8083)?,
            database_url: text("DATABASE_URL"),
            database_max_connections: setting(&text, "DATABASE_MAX_CONNECTIONS", 10)?,
            nats_url: text("NATS_URL"),
            nats_subject_prefix: text("NATS_SUBJECT_PREFIX").unwrap_or_else(|| "commerce".to_string()),
            pricing,
            checkout: CheckoutSettings { max_attempts, timeout: Duration::from_millis(timeout_ms) },
            near_expiry_days: setting(&text, "NEAR_EXPIRY_DAYS", DEFAULT_NEAR_EXPIRY_DAYS)?,
            seed_catalog: text("SEED_CATALOG").map(PathBuf::from),
        })
    }
}

fn setting<T: FromStr>(text: &impl Fn(&str) -> Option<String>, name: &'static str, default: T) -> Result<T, ConfigError> {
    match text(name) {
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
