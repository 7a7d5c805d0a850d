use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::warn;

use msgr_api::ChatLimits;

const DEV_JWT_SECRET: &str = "dev-secret-change-me";
const MAX_HISTORY_PAGE_SIZE: u32 = 500;

/// Placeholder JWT secrets that should never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", DEV_JWT_SECRET];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub limits: ChatLimits,
}

impl Config {
    /// Read configuration from the environment (after `.env` was loaded).
    pub fn from_env() -> Result<Self> {
        let jwt_secret = std::env::var("MSGR_JWT_SECRET").unwrap_or_default();
        let jwt_secret = if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            warn!("MSGR_JWT_SECRET is unset or a placeholder; tokens are forgeable");
            DEV_JWT_SECRET.to_string()
        } else {
            jwt_secret
        };

        let defaults = ChatLimits::default();
        let limits = ChatLimits {
            max_message_len: env_parse("MSGR_MAX_MESSAGE_LEN", defaults.max_message_len)?,
            history_page_size: check_page_size(env_parse(
                "MSGR_HISTORY_PAGE_SIZE",
                defaults.history_page_size,
            )?)?,
        };

        Ok(Self {
            host: std::env::var("MSGR_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_parse("MSGR_PORT", 8000)?,
            db_path: std::env::var("MSGR_DB_PATH")
                .unwrap_or_else(|_| "msgr.db".into())
                .into(),
            jwt_secret,
            limits,
        })
    }
}

fn check_page_size(size: u32) -> Result<u32> {
    if size == 0 || size > MAX_HISTORY_PAGE_SIZE {
        bail!(
            "MSGR_HISTORY_PAGE_SIZE must be between 1 and {}, got {}",
            MAX_HISTORY_PAGE_SIZE,
            size
        );
    }
    Ok(size)
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        Err(_) => Ok(default),
    }
}
