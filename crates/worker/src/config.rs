use std::time::Duration;

use anyhow::{anyhow, Context};
use rfpdesk_core::presence::PRESENCE_TTL_SECS;
use rfpdesk_db::DEFAULT_MAX_CONNECTIONS;

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    /// How often stale presence rows are swept.
    pub presence_sweep_interval: Duration,
    /// Presence rows not refreshed for this many seconds are deactivated.
    pub presence_stale_secs: i64,
}

impl WorkerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                        | Default      |
    /// |--------------------------------|--------------|
    /// | `DATABASE_URL`                 | (required)   |
    /// | `DB_MAX_CONNECTIONS`           | `20`         |
    /// | `PRESENCE_SWEEP_INTERVAL_SECS` | `60`         |
    /// | `PRESENCE_STALE_SECS`          | `300`        |
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL").ok_or_else(|| anyhow!("DATABASE_URL must be set"))?;

        let db_max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        let sweep_secs: u64 = parse_or(&lookup, "PRESENCE_SWEEP_INTERVAL_SECS", 60)?;
        let presence_stale_secs: i64 = parse_or(&lookup, "PRESENCE_STALE_SECS", PRESENCE_TTL_SECS)?;

        if sweep_secs == 0 {
            return Err(anyhow!("PRESENCE_SWEEP_INTERVAL_SECS must be greater than zero"));
        }
        if presence_stale_secs <= 0 {
            return Err(anyhow!("PRESENCE_STALE_SECS must be greater than zero"));
        }

        Ok(Self {
            database_url,
            db_max_connections,
            presence_sweep_interval: Duration::from_secs(sweep_secs),
            presence_stale_secs,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a valid number, got {raw:?}")),
        None => Ok(default),
    }
}
