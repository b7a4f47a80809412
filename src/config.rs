//! Service configuration.
//!
//! Configuration is loaded from environment variables (a `.env` file is read
//! first when present) with fallback to defaults.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Pricing service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string of the CRM database
    pub database_url: String,

    /// Address the HTTP server binds to
    pub bind_addr: SocketAddr,

    /// Maximum number of pooled database connections
    pub database_max_connections: u32,

    /// Time to live of cached currencies and product types
    pub cache_ttl: Duration,

    /// Cache refresh interval; `None` disables the background warmer
    pub cache_warm_interval: Option<Duration>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ConfigError::MissingRequired("DATABASE_URL".to_string()))?;

        let bind_addr = parse_or(&lookup, "BIND_ADDR", "0.0.0.0:8090")?;
        let database_max_connections: u32 = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", "5")?;
        if database_max_connections == 0 {
            return Err(ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS".to_string()));
        }

        let cache_ttl_secs: u64 = parse_or(&lookup, "CACHE_TTL_SECS", "600")?;
        if cache_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue("CACHE_TTL_SECS".to_string()));
        }

        let cache_warm_interval_secs: u64 = parse_or(&lookup, "CACHE_WARM_INTERVAL_SECS", "600")?;

        Ok(Config {
            database_url,
            bind_addr,
            database_max_connections,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            cache_warm_interval: (cache_warm_interval_secs > 0)
                .then(|| Duration::from_secs(cache_warm_interval_secs)),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .unwrap_or_else(|| default.to_string())
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
