//! Server configuration loaded from the process environment.
//!
//! `dotenvy` is invoked once in `main` before this runs, so a local `.env`
//! file works in development. Every secret is required: a missing webhook
//! token or vault key is a hard startup failure, never a silent default.

use anyhow::{Context, Result};
use carrier_tracking::CarrierConfig;
use credential_vault::VAULT_KEY_ENV;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Postgres connection string
    pub database_url: String,
    /// Hex-encoded AES-256 key for the credential vault
    pub vault_key_hex: String,
    /// Shared secret presented by the pharmacy system on its webhooks
    pub pharmacy_webhook_token: String,
    /// HMAC key for payment processor webhook signatures
    pub processor_webhook_secret: String,
    /// Payment processor API base URL
    pub processor_base_url: String,
    /// Payment processor API key
    pub processor_api_key: String,
    /// HS256 key for provider/admin JWTs
    pub jwt_secret: String,
    /// Payment link lifetime in hours
    pub link_ttl_hours: i64,
    /// Seconds between expiry sweeper passes
    pub sweep_interval_secs: u64,
    /// Carrier API access; tracking enrichment is disabled when absent
    pub carrier: Option<CarrierConfig>,
}

/// Default payment link lifetime when `PAYMENT_LINK_TTL_HOURS` is unset.
const DEFAULT_LINK_TTL_HOURS: i64 = 72;
/// Default sweeper cadence when `EXPIRY_SWEEP_INTERVAL_SECS` is unset.
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

impl ServerConfig {
    /// Load configuration from the environment. Missing required variables
    /// are fatal at startup.
    pub fn from_env() -> Result<Self> {
        let carrier = match std::env::var("CARRIER_CLIENT_ID") {
            Ok(client_id) => Some(CarrierConfig {
                client_id,
                client_secret: required("CARRIER_CLIENT_SECRET")?,
                base_url: required("CARRIER_BASE_URL")?,
            }),
            Err(_) => {
                tracing::info!("CARRIER_CLIENT_ID not set; carrier tracking enrichment disabled");
                None
            }
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            vault_key_hex: required(VAULT_KEY_ENV)?,
            pharmacy_webhook_token: required("PHARMACY_WEBHOOK_TOKEN")?,
            processor_webhook_secret: required("PROCESSOR_WEBHOOK_SECRET")?,
            processor_base_url: required("PROCESSOR_BASE_URL")?,
            processor_api_key: required("PROCESSOR_API_KEY")?,
            jwt_secret: required("JWT_SECRET")?,
            link_ttl_hours: parse_or("PAYMENT_LINK_TTL_HOURS", DEFAULT_LINK_TTL_HOURS)?,
            sweep_interval_secs: parse_or("EXPIRY_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS)?,
            carrier,
        })
    }
}

fn required(name: &str) -> Result<String> {
    let value = std::env::var(name).with_context(|| format!("{name} must be set"))?;
    if value.trim().is_empty() {
        anyhow::bail!("{name} must not be empty");
    }
    Ok(value)
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{name} is not a valid value")),
        Err(_) => Ok(default),
    }
}
