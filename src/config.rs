use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_START_URL: &str = "https://auto.ria.com/uk/car/used/";

#[derive(Debug, Clone)]
pub struct Config {
    pub start_url: String,
    pub database_url: String,
    pub max_concurrency: usize,
    pub delay_ms: u64,
    pub index_timeout: Duration,
    pub detail_timeout: Duration,
    pub phone_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            start_url: env::var("START_URL").unwrap_or_else(|_| DEFAULT_START_URL.to_string()),
            database_url: env::var("DATABASE_URL")?,
            max_concurrency: env_or("MAX_CONCURRENCY", 8)?,
            delay_ms: env_or("DELAY_MS", 300)?,
            index_timeout: Duration::from_secs(env_or("INDEX_TIMEOUT_SECS", 30)?),
            detail_timeout: Duration::from_secs(env_or("DETAIL_TIMEOUT_SECS", 30)?),
            phone_timeout: Duration::from_secs(env_or("PHONE_TIMEOUT_SECS", 15)?),
        })
    }
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => Ok(raw.parse()?),
        Err(_) => Ok(default),
    }
}
