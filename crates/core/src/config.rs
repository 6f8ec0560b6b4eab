//! Configuration types
//!
//! Layered the usual way: built-in defaults, then an optional config file,
//! then `ORACLE_*` environment variables.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::errors::{ConfigError, ConfigResult};
use crate::types::DEFAULT_CURRENCY;

/// Environment variable prefix for all settings
pub const ENV_PREFIX: &str = "ORACLE";

/// Config file looked up when `ORACLE_CONFIG` is unset (any supported extension)
pub const DEFAULT_CONFIG_FILE: &str = "config/oracle";

pub const COINBASE_API_URL: &str = "https://api.coinbase.com";
pub const KRAKEN_API_URL: &str = "https://api.kraken.com";

/// Runtime configuration for the oracle process
#[derive(Debug, Clone, PartialEq)]
pub struct OracleConfig {
    pub host: String,
    pub port: u16,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub currency: String,
    pub log_json: bool,
    pub sources: SourcesConfig,
}

/// Endpoints of the built-in price sources
#[derive(Debug, Clone, PartialEq)]
pub struct SourcesConfig {
    pub coinbase_url: String,
    pub coinbase_product: String,
    pub kraken_url: String,
    pub kraken_pair: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            coinbase_url: COINBASE_API_URL.to_string(),
            coinbase_product: "BTC-USD".to_string(),
            kraken_url: KRAKEN_API_URL.to_string(),
            kraken_pair: "XXBTZUSD".to_string(),
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            poll_interval: Duration::from_secs(10),
            request_timeout: Duration::from_secs(3),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(200),
            currency: DEFAULT_CURRENCY.to_string(),
            log_json: false,
            sources: SourcesConfig::default(),
        }
    }
}

/// Flat shape the config crate deserializes into; durations are still text here
#[derive(Debug, Deserialize)]
struct RawConfig {
    host: String,
    port: u16,
    poll_interval: String,
    request_timeout: String,
    max_retries: u32,
    retry_base_delay: String,
    currency: String,
    log_json: bool,
    coinbase_url: String,
    coinbase_product: String,
    kraken_url: String,
    kraken_pair: String,
}

impl OracleConfig {
    /// Load from `.env`-populated environment and the optional config file
    pub fn load() -> ConfigResult<Self> {
        let path = std::env::var(format!("{ENV_PREFIX}_CONFIG"))
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        Self::layered(&path, Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }

    /// Defaults, then the file at `path` if it exists, then `env`
    pub fn layered(path: &str, env: Environment) -> ConfigResult<Self> {
        let config = Self::builder()?
            .add_source(File::with_name(path).required(false))
            .add_source(env)
            .build()?;

        Self::from_config(config)
    }

    /// Builder pre-seeded with every default, ready for extra sources
    pub fn builder() -> ConfigResult<ConfigBuilder<DefaultState>> {
        let defaults = Self::default();

        let builder = Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", i64::from(defaults.port))?
            .set_default("poll_interval", "10s")?
            .set_default("request_timeout", "3s")?
            .set_default("max_retries", i64::from(defaults.max_retries))?
            .set_default("retry_base_delay", "200ms")?
            .set_default("currency", defaults.currency)?
            .set_default("log_json", defaults.log_json)?
            .set_default("coinbase_url", defaults.sources.coinbase_url)?
            .set_default("coinbase_product", defaults.sources.coinbase_product)?
            .set_default("kraken_url", defaults.sources.kraken_url)?
            .set_default("kraken_pair", defaults.sources.kraken_pair)?;

        Ok(builder)
    }

    /// Deserialize and validate an already-built config
    pub fn from_config(config: Config) -> ConfigResult<Self> {
        let raw: RawConfig = config.try_deserialize()?;

        let parsed = Self {
            host: raw.host,
            port: raw.port,
            poll_interval: duration_field("poll_interval", &raw.poll_interval)?,
            request_timeout: duration_field("request_timeout", &raw.request_timeout)?,
            max_retries: raw.max_retries,
            retry_base_delay: duration_field("retry_base_delay", &raw.retry_base_delay)?,
            currency: raw.currency,
            log_json: raw.log_json,
            sources: SourcesConfig {
                coinbase_url: raw.coinbase_url,
                coinbase_product: raw.coinbase_product,
                kraken_url: raw.kraken_url,
                kraken_pair: raw.kraken_pair,
            },
        };

        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid("poll_interval must be positive".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid("request_timeout must be positive".into()));
        }
        if self.currency.trim().is_empty() {
            return Err(ConfigError::Invalid("currency must not be empty".into()));
        }
        Ok(())
    }
}

fn duration_field(key: &'static str, value: &str) -> ConfigResult<Duration> {
    parse_duration(value).map_err(|reason| ConfigError::InvalidDuration { key, reason })
}

/// Parse a duration such as `250ms`, `3s`, `1.5m` or `1h`
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    let split = input
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .ok_or_else(|| format!("missing unit in {input:?}"))?;
    let (number, unit) = input.split_at(split);

    let value: f64 = number
        .parse()
        .map_err(|_| format!("invalid number in {input:?}"))?;

    let seconds = match unit {
        "ms" => value / 1_000.0,
        "s" => value,
        "m" => value * 60.0,
        "h" => value * 3_600.0,
        other => return Err(format!("unknown unit {other:?}")),
    };

    Duration::try_from_secs_f64(seconds).map_err(|e| e.to_string())
}
