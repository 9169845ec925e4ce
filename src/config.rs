use std::{str::FromStr, time::Duration};

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub cors_origin: String,
    pub outbound_capacity: usize,
    pub ping_interval: Duration,
    pub idle_timeout: Duration,
    pub sweep_interval: Duration,
    /// How long a room that never had members may exist.
    pub empty_room_grace: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_address: "0.0.0.0:8080".to_owned(),
            database_url: "sqlite://portal.db?mode=rwc".to_owned(),
            cors_origin: "http://localhost:5173".to_owned(),
            outbound_capacity: 64,
            ping_interval: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(90),
            sweep_interval: Duration::from_secs(60),
            empty_room_grace: Duration::from_secs(300),
        }
    }
}

impl Config {
    /// Reads the environment (and `.env`, if the caller loaded it).
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            server_address: normalize_address(&var_or("SERVER_ADDRESS", defaults.server_address)),
            database_url: var_or("DATABASE_URL", defaults.database_url),
            cors_origin: var_or("CORS_ORIGIN", defaults.cors_origin),
            outbound_capacity: parse_or("OUTBOUND_QUEUE_CAPACITY", defaults.outbound_capacity)?,
            ping_interval: secs_or("PING_INTERVAL_SECS", defaults.ping_interval)?,
            idle_timeout: secs_or("IDLE_TIMEOUT_SECS", defaults.idle_timeout)?,
            sweep_interval: secs_or("SWEEP_INTERVAL_SECS", defaults.sweep_interval)?,
            empty_room_grace: secs_or("EMPTY_ROOM_GRACE_SECS", defaults.empty_room_grace)?,
        })
    }
}

fn var_or(key: &str, default: String) -> String {
    dotenv::var(key)
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or(default)
}

fn parse_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match dotenv::var(key).ok().filter(|value| !value.is_empty()) {
        Some(value) => value
            .parse()
            .with_context(|| format!("{key}={value:?} is not a valid value")),
        None => Ok(default),
    }
}

fn secs_or(key: &str, default: Duration) -> anyhow::Result<Duration> {
    let secs = parse_or(key, default.as_secs())?;
    anyhow::ensure!(secs > 0, "{key} must be at least 1 second");
    Ok(Duration::from_secs(secs))
}

/// `:8080` means every interface.
fn normalize_address(address: &str) -> String {
    if address.starts_with(':') {
        format!("0.0.0.0{address}")
    } else {
        address.to_owned()
    }
}
