use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub classifier_url: String,
    pub classifier_api_key: Option<String>,
    pub classifier_batch_size: usize,
    pub classifier_concurrency: usize,
    pub classifier_timeout: Duration,
    pub refresh_interval: Duration,
    pub refresh_cooldown: Duration,
    pub max_reply_depth: usize,
    pub store_page_size: i64,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let config = Config {
            database_url: require_env("DATABASE_URL")?,
            classifier_url: require_env("CLASSIFIER_URL")?,
            classifier_api_key: std::env::var("CLASSIFIER_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            classifier_batch_size: env_or("CLASSIFIER_BATCH_SIZE", 64)?,
            classifier_concurrency: env_or("CLASSIFIER_CONCURRENCY", 4)?,
            classifier_timeout: Duration::from_secs(env_or("CLASSIFIER_TIMEOUT_SECS", 60)?),
            refresh_interval: Duration::from_secs(env_or("REFRESH_INTERVAL_SECS", 30)?),
            refresh_cooldown: Duration::from_secs(env_or("REFRESH_COOLDOWN_SECS", 5)?),
            max_reply_depth: env_or("MAX_REPLY_DEPTH", 512)?,
            store_page_size: env_or("STORE_PAGE_SIZE", 500)?,
            port: env_or("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.classifier_batch_size == 0 {
            bail!("CLASSIFIER_BATCH_SIZE must be at least 1");
        }
        if self.classifier_concurrency == 0 {
            bail!("CLASSIFIER_CONCURRENCY must be at least 1");
        }
        if self.store_page_size <= 0 {
            bail!("STORE_PAGE_SIZE must be positive");
        }
        Ok(())
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("{key} must be a valid number, got '{raw}'"))
}
