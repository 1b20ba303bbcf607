//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if a variable is set but malformed.

use crate::error::{Error, Result};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub otel_endpoint: Option<String>,
    pub log_level: String,
    /// Number of consumer tasks the demo worker pool starts.
    pub workers: usize,
    /// Processing budget for fast requests.
    pub fast_timeout: Duration,
    /// Processing budget for slow requests.
    pub slow_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let workers: usize = parsed_var("FIFO_WORKERS", 4)?;
        if workers == 0 {
            return Err(Error::Config("FIFO_WORKERS must be at least 1".to_string()));
        }

        Ok(Self {
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            workers,
            fast_timeout: Duration::from_millis(parsed_var("FIFO_FAST_TIMEOUT_MS", 1_000)?),
            slow_timeout: Duration::from_millis(parsed_var("FIFO_SLOW_TIMEOUT_MS", 10_000)?),
        })
    }
}

fn parsed_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("invalid value {raw:?} for {name}: {e}"))),
        Err(_) => Ok(default),
    }
}
