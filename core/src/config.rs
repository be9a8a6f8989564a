//! Client configuration.
//!
//! Values come from the process environment with defaults for anything
//! unset. `from_lookup` takes the lookup as a function so parsing can be
//! exercised without mutating the real environment.

use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::keys::StalePolicy;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn is_dev(self) -> bool {
        matches!(self, Environment::Dev)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Dev),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Prod),
            other => Err(format!("unknown environment {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend root including the API prefix, e.g. `http://localhost:8000/api`.
    pub base_url: String,
    pub environment: Environment,
    pub timeout: Duration,
    /// Immediate retries for a failed read. Writes are never retried.
    pub read_retries: u32,
    /// Log method and path of every request, and error payloads.
    pub log_requests: bool,
    pub stale: StalePolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/api".to_string(),
            environment: Environment::Dev,
            timeout: Duration::from_secs(10),
            read_retries: 1,
            log_requests: true,
            stale: StalePolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = ClientConfig::default();
        if let Some(base_url) = lookup("TODO_API_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(environment) = parse(&lookup, "TODO_API_ENV")? {
            config.environment = environment;
        }
        config.log_requests = config.environment.is_dev();
        if let Some(secs) = parse::<u64>(&lookup, "TODO_API_TIMEOUT_SECS")? {
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "TODO_API_TIMEOUT_SECS",
                    value: secs.to_string(),
                    reason: "timeout must be at least one second".to_string(),
                });
            }
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = parse(&lookup, "TODO_API_READ_RETRIES")? {
            config.read_retries = retries;
        }
        Ok(config)
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    let Some(value) = lookup(key) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key,
            value,
            reason: e.to_string(),
        })
}
