use anyhow::{Context, Result};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub busy_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5555,
            database_url: "sqlite://app.db".to_string(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(10),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Reads settings from the process environment (after `.env` has been loaded).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Config::default();

        if let Some(host) = lookup("HOST") {
            cfg.host = host;
        }
        if let Some(port) = lookup("PORT") {
            cfg.port = port.parse().context("Invalid PORT")?;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            cfg.database_url = url;
        }
        if let Some(max) = lookup("DATABASE_MAX_CONNECTIONS") {
            cfg.max_connections = max.parse().context("Invalid DATABASE_MAX_CONNECTIONS")?;
        }
        if let Some(secs) = lookup("DATABASE_ACQUIRE_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .context("Invalid DATABASE_ACQUIRE_TIMEOUT_SECS")?;
            cfg.acquire_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = lookup("DATABASE_BUSY_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().context("Invalid DATABASE_BUSY_TIMEOUT_SECS")?;
            cfg.busy_timeout = Duration::from_secs(secs);
        }

        Ok(cfg)
    }

    /// Single-connection in-memory store; every pooled connection to
    /// `sqlite::memory:` would otherwise see its own empty database.
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..Config::default()
        }
    }
}
