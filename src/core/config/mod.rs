use std::time::Duration;

use crate::tickets::store::DEFAULT_STORE_TIMEOUT;

pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_DB_PORT: u16 = 5432;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bot: BotConfig,
    pub database: DatabaseConfig,
    /// The single account allowed to answer tickets.
    pub admin_id: i64,
    pub poll_timeout_secs: u64,
    pub store_timeout_secs: u64,
}

#[derive(Clone)]
pub struct BotConfig {
    pub token: String,
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig").field("token", &"<redacted>").finish()
    }
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig").field("url", &"<redacted>").finish()
    }
}

impl DatabaseConfig {
    fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = non_empty(lookup, "DATABASE_URL") {
            return Ok(Self { url });
        }

        let host = non_empty(lookup, "DB_HOST").ok_or(ConfigError::Missing("DB_HOST"))?;
        let user = non_empty(lookup, "DB_USER").ok_or(ConfigError::Missing("DB_USER"))?;
        let pass = lookup("DB_PASS").unwrap_or_default();
        let name = non_empty(lookup, "DB_NAME").ok_or(ConfigError::Missing("DB_NAME"))?;
        let port = parse_or(lookup, "DB_PORT", DEFAULT_DB_PORT)?;

        Ok(Self {
            url: format!("postgres://{user}:{pass}@{host}:{port}/{name}"),
        })
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match non_empty(lookup, key) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = non_empty(&lookup, "BOT_TOKEN").ok_or(ConfigError::Missing("BOT_TOKEN"))?;

        let raw_admin = non_empty(&lookup, "ADMIN_ID").ok_or(ConfigError::Missing("ADMIN_ID"))?;
        let admin_id = raw_admin.parse::<i64>().map_err(|_| ConfigError::Invalid {
            key: "ADMIN_ID",
            value: raw_admin.clone(),
        })?;

        Ok(Self {
            bot: BotConfig { token },
            database: DatabaseConfig::from_lookup(&lookup)?,
            admin_id,
            poll_timeout_secs: parse_or(&lookup, "POLL_TIMEOUT_SECS", DEFAULT_POLL_TIMEOUT_SECS)?,
            store_timeout_secs: parse_or(
                &lookup,
                "STORE_TIMEOUT_SECS",
                DEFAULT_STORE_TIMEOUT.as_secs(),
            )?,
        })
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs.max(1))
    }
}
