use dotenvy::dotenv;
use std::{env, time::Duration};
use url::Url;

use crate::error::ConfigError;

const DEFAULT_API_URL: &str = "http://localhost:8080";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 300;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: Url,
    pub http_timeout: Duration,
    pub search_debounce: Duration,
}

impl Config {
    /// Reads settings from the process environment, after loading `.env`
    /// if one is present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let raw_url = non_empty("BOOKING_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = Url::parse(raw_url.trim()).map_err(|source| ConfigError::InvalidUrl {
            key: "BOOKING_API_URL",
            source,
        })?;
        if api_url.cannot_be_a_base() || !matches!(api_url.scheme(), "http" | "https") {
            return Err(ConfigError::NotABaseUrl {
                key: "BOOKING_API_URL",
                value: raw_url,
            });
        }

        let http_timeout = positive(
            "BOOKING_HTTP_TIMEOUT_SECS",
            non_empty("BOOKING_HTTP_TIMEOUT_SECS"),
            DEFAULT_HTTP_TIMEOUT_SECS,
        )?;
        let search_debounce = positive(
            "BOOKING_SEARCH_DEBOUNCE_MS",
            non_empty("BOOKING_SEARCH_DEBOUNCE_MS"),
            DEFAULT_SEARCH_DEBOUNCE_MS,
        )?;

        Ok(Config {
            api_url,
            http_timeout: Duration::from_secs(http_timeout),
            search_debounce: Duration::from_millis(search_debounce),
        })
    }
}

fn positive(key: &'static str, value: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => match value.trim().parse::<u64>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ConfigError::InvalidNumber { key, value }),
        },
    }
}
