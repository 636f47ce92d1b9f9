// Application configuration
// Built once at startup and passed explicitly to every component

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Connection settings for the remote judge
#[derive(Debug, Clone)]
pub struct JudgeConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub host: Option<String>,
    /// Per-call timeout for enqueue and query calls
    pub request_timeout: Duration,
    /// Per-call timeout for single submissions that wait for completion
    pub wait_timeout: Duration,
}

impl JudgeConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            host: None,
            request_timeout: Duration::from_secs(10),
            wait_timeout: Duration::from_secs(30),
        }
    }
}

/// Bound on how long a single status request keeps polling the judge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 15,
            interval: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub redis_url: String,
    pub store_backend: StoreBackend,
    pub languages_path: PathBuf,
    pub judge: JudgeConfig,
    pub poll: PollPolicy,
}

impl AppConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let base_url = get("JUDGE0_URL").ok_or(ConfigError::Missing("JUDGE0_URL"))?;
        let mut judge = JudgeConfig::new(base_url);
        judge.api_key = get("JUDGE0_API_KEY");
        judge.host = get("JUDGE0_HOST");
        if let Some(raw) = get("JUDGE_REQUEST_TIMEOUT_SECS") {
            judge.request_timeout = Duration::from_secs(parse("JUDGE_REQUEST_TIMEOUT_SECS", &raw)?);
        }
        if let Some(raw) = get("JUDGE_WAIT_TIMEOUT_SECS") {
            judge.wait_timeout = Duration::from_secs(parse("JUDGE_WAIT_TIMEOUT_SECS", &raw)?);
        }

        let mut poll = PollPolicy::default();
        if let Some(raw) = get("POLL_MAX_ATTEMPTS") {
            poll.max_attempts = parse("POLL_MAX_ATTEMPTS", &raw)?;
            if poll.max_attempts == 0 {
                return Err(ConfigError::Invalid {
                    key: "POLL_MAX_ATTEMPTS",
                    value: raw,
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        if let Some(raw) = get("POLL_INTERVAL_MS") {
            poll.interval = Duration::from_millis(parse("POLL_INTERVAL_MS", &raw)?);
        }

        let store_backend = match get("STORE_BACKEND").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("redis") => StoreBackend::Redis,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "STORE_BACKEND",
                    value: other.to_string(),
                    reason: "expected `redis` or `memory`".to_string(),
                })
            }
        };

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            redis_url: get("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
            store_backend,
            languages_path: get("LANGUAGES_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config/languages.json")),
            judge,
            poll,
        })
    }
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
