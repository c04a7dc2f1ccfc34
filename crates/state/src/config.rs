//! State layer configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPFRONT_API_URL` - Base URL of the storefront API (absolute http(s) URL)
//!
//! ## Optional
//! - `SHOPFRONT_API_TOKEN` - Bearer token for admin endpoints (high entropy)
//! - `SHOPFRONT_STATE_DIR` - Directory for persisted stores (default: .shopfront)
//! - `SHOPFRONT_GST_RATE` - GST rate in percent (default: 18)
//! - `SHOPFRONT_RECONNECT_ATTEMPTS` - Reconnect budget before polling (default: 5)
//! - `SHOPFRONT_RECONNECT_DELAY_MS` - Initial reconnect delay (default: 1000)
//! - `SHOPFRONT_MAX_RECONNECT_DELAY_MS` - Reconnect delay cap (default: 30000)
//! - `SHOPFRONT_POLL_INTERVAL_SECS` - Polling fallback interval (default: 30)
//! - `SHOPFRONT_STALL_TIMEOUT_SECS` - Silence before a refetch (default: 60)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::SecretString;
use shopfront_core::DEFAULT_GST_RATE;
use thiserror::Error;
use url::Url;

const API_TOKEN_VAR: &str = "SHOPFRONT_API_TOKEN";
const MIN_TOKEN_LEN: usize = 20;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Fragments left in tokens copied from sample `.env` files (case-insensitive)
const PLACEHOLDER_MARKERS: &[&str] = &["your-", "changeme", "placeholder", "token-here", "xxx"];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// State layer configuration.
#[derive(Debug, Clone)]
pub struct StateConfig {
    /// Storefront API base URL
    pub api_url: Url,
    /// Bearer token for privileged endpoints
    pub api_token: Option<SecretString>,
    /// Directory holding persisted stores
    pub state_dir: PathBuf,
    /// GST rate in percent
    pub gst_rate: Decimal,
    /// Real-time channel tuning
    pub realtime: RealtimeConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Reconnect, stall, and polling parameters for the real-time channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RealtimeConfig {
    /// Failed connection attempts allowed before falling back to polling.
    pub max_reconnect_attempts: u32,
    /// Delay before the first reconnect; doubles per attempt.
    pub reconnect_delay: Duration,
    /// Upper bound for the reconnect delay.
    pub max_reconnect_delay: Duration,
    /// Interval between refetches once polling.
    pub poll_interval: Duration,
    /// Silence on an open connection before a refetch is forced.
    pub stall_timeout: Duration,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 5,
            reconnect_delay: Duration::from_millis(1000),
            max_reconnect_delay: Duration::from_secs(30),
            poll_interval: Duration::from_secs(30),
            stall_timeout: Duration::from_secs(60),
        }
    }
}

impl StateConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the API token fails validation (length, placeholder, entropy).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_url = parse_api_url("SHOPFRONT_API_URL", &get_required_env("SHOPFRONT_API_URL")?)?;
        let api_token = get_optional_env(API_TOKEN_VAR)
            .map(|token| {
                validate_api_token(&token)?;
                Ok::<_, ConfigError>(SecretString::from(token))
            })
            .transpose()?;
        let state_dir = PathBuf::from(get_env_or_default("SHOPFRONT_STATE_DIR", ".shopfront"));
        let gst_rate = parse_env::<Decimal>("SHOPFRONT_GST_RATE", &DEFAULT_GST_RATE.to_string())?;
        if gst_rate.is_sign_negative() {
            return Err(ConfigError::InvalidEnvVar(
                "SHOPFRONT_GST_RATE".to_string(),
                "must not be negative".to_string(),
            ));
        }

        let realtime = RealtimeConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");

        Ok(Self {
            api_url,
            api_token,
            state_dir,
            gst_rate,
            realtime,
            sentry_dsn,
            sentry_environment,
        })
    }

    /// Build a configuration for `api_url` with every optional setting at its default.
    #[must_use]
    pub fn with_api_url(api_url: Url) -> Self {
        Self {
            api_url,
            api_token: None,
            state_dir: PathBuf::from(".shopfront"),
            gst_rate: Decimal::from(DEFAULT_GST_RATE),
            realtime: RealtimeConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }
}

impl RealtimeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            max_reconnect_attempts: parse_env(
                "SHOPFRONT_RECONNECT_ATTEMPTS",
                &defaults.max_reconnect_attempts.to_string(),
            )?,
            reconnect_delay: Duration::from_millis(parse_env("SHOPFRONT_RECONNECT_DELAY_MS", "1000")?),
            max_reconnect_delay: Duration::from_millis(parse_env(
                "SHOPFRONT_MAX_RECONNECT_DELAY_MS",
                "30000",
            )?),
            poll_interval: Duration::from_secs(parse_env("SHOPFRONT_POLL_INTERVAL_SECS", "30")?),
            stall_timeout: Duration::from_secs(parse_env("SHOPFRONT_STALL_TIMEOUT_SECS", "60")?),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse the API base URL, requiring an absolute http(s) URL.
fn parse_api_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "URL must have a host".to_string(),
        ));
    }
    Ok(url)
}

/// Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }
    let len: usize = freq.values().sum();
    if len == 0 {
        return 0.0;
    }

    #[allow(clippy::cast_precision_loss)] // token lengths are far below f64 precision
    let len = len as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Reject bearer tokens that cannot be a generated credential.
fn validate_api_token(token: &str) -> Result<(), ConfigError> {
    let insecure = |reason: String| Err(ConfigError::InsecureSecret(API_TOKEN_VAR.to_string(), reason));

    if token.chars().any(char::is_whitespace) {
        return insecure("contains whitespace".to_string());
    }
    if token.chars().count() < MIN_TOKEN_LEN {
        return insecure(format!("shorter than {MIN_TOKEN_LEN} characters"));
    }
    let lower = token.to_lowercase();
    if let Some(marker) = PLACEHOLDER_MARKERS.iter().find(|marker| lower.contains(*marker)) {
        return insecure(format!("looks like a placeholder (contains '{marker}')"));
    }
    let entropy = shannon_entropy(token);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return insecure(format!(
            "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
        ));
    }
    Ok(())
}
