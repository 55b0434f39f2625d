use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: Url,
    pub http_timeout: Duration,
    pub away_limit: Duration,
    pub timer_tick: Duration,
    pub multi_select: bool,
    pub session_file: PathBuf,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let raw_base = get_env("API_BASE_URL")?;
        Ok(Self {
            api_base_url: parse_base_url(&raw_base)?,
            http_timeout: Duration::from_secs(get_env_parse_or("HTTP_TIMEOUT_SECS", 30)?),
            away_limit: Duration::from_secs(get_env_parse_or("AWAY_LIMIT_SECS", 180)?),
            timer_tick: Duration::from_millis(get_env_parse_or("TIMER_TICK_MILLIS", 1000)?),
            multi_select: get_env_parse_or("QUIZ_MULTI_SELECT", false)?,
            session_file: env::var("SESSION_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".quiz-session.json")),
        })
    }
}

/// Endpoint paths are joined onto the base, so it must end with a slash.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };
    let url = Url::parse(&normalized)?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(Error::Config(format!(
            "API_BASE_URL must use http or https, got '{}'",
            url.scheme()
        )));
    }
    Ok(url)
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
