use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Runtime settings. Every value can be overridden from the environment
/// (or a `.env` file) and falls back to a default otherwise.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: String,
    pub pool_max: u32,
    pub idle_timeout: Duration,
    pub connect_timeout: Duration,
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    pub api_prefix: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://duties.db?mode=rwc".to_string(),
            pool_max: 10,
            idle_timeout: Duration::from_millis(30_000),
            connect_timeout: Duration::from_millis(2_000),
            host: "0.0.0.0".to_string(),
            port: 3001,
            cors_origin: "*".to_string(),
            api_prefix: "/api".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. `from_env` is this
    /// with the process environment as source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_prefix = lookup("API_PREFIX").unwrap_or(defaults.api_prefix);
        if !api_prefix.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                key: "API_PREFIX".to_string(),
                message: format!("'{}' must start with '/'", api_prefix),
            });
        }

        let pool_max: u32 = parse_or(&lookup, "DB_POOL_MAX", defaults.pool_max)?;
        if pool_max == 0 {
            return Err(ConfigError::InvalidValue {
                key: "DB_POOL_MAX".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        Ok(Self {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            pool_max,
            idle_timeout: Duration::from_millis(parse_or(&lookup, "DB_IDLE_TIMEOUT", 30_000)?),
            connect_timeout: Duration::from_millis(parse_or(
                &lookup,
                "DB_CONNECTION_TIMEOUT",
                2_000,
            )?),
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port)?,
            cors_origin: lookup("CORS_ORIGIN").unwrap_or(defaults.cors_origin),
            api_prefix: api_prefix.trim_end_matches('/').to_string(),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{}': {}", raw, e),
        }),
    }
}
