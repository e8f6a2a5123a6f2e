use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::users::DefaultUserSeed;

#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl DbConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub db: DbConfig,
    pub default_users: Vec<DefaultUserSeed>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let db = DbConfig {
            url: lookup("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: lookup("DB_MAX_CONNECTIONS")
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(10),
            acquire_timeout_secs: lookup("DB_ACQUIRE_TIMEOUT_SECS")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5),
        };
        let default_users = match lookup("DEFAULT_USERS") {
            Some(raw) if !raw.trim().is_empty() => {
                serde_json::from_str(&raw).context("DEFAULT_USERS must be a JSON array of users")?
            }
            _ => Vec::new(),
        };
        Ok(Self { db, default_users })
    }
}
