use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const API_KEY_ENV: &str = "DEEPSEEK_API_KEY";
pub const API_BASE_ENV: &str = "BRANDPAGE_API_BASE";
pub const MODEL_ENV: &str = "BRANDPAGE_MODEL";
pub const PORT_ENV: &str = "PORT";
pub const ALLOWED_ORIGIN_ENV: &str = "BRANDPAGE_ALLOWED_ORIGIN";

pub const DEFAULT_API_BASE: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-r1-0528:free";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:5173";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is missing from the environment")]
    MissingCredential(&'static str),
    #[error("invalid port '{0}'")]
    InvalidPort(String),
}

/// Settings for [`crate::generation::ChatCompletionClient`].
#[derive(Clone)]
pub struct ChatCompletionConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub temperature: f64,
    pub timeout: Duration,
}

impl ChatCompletionConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = first_non_empty(&lookup, &[API_KEY_ENV])
            .ok_or(ConfigError::MissingCredential(API_KEY_ENV))?;
        let mut config = Self::new(api_key);
        if let Some(base) = first_non_empty(&lookup, &[API_BASE_ENV]) {
            config.api_base = base;
        }
        if let Some(model) = first_non_empty(&lookup, &[MODEL_ENV]) {
            config.model = model;
        }
        Ok(config)
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }
}

impl fmt::Debug for ChatCompletionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatCompletionConfig")
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// `None` accepts browser connections from any origin.
    pub allowed_origin: Option<String>,
    pub events_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            allowed_origin: Some(DEFAULT_ALLOWED_ORIGIN.to_string()),
            events_path: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = first_non_empty(&lookup, &[PORT_ENV]) {
            config.port = parse_port(&raw)?;
        }
        if let Some(origin) = first_non_empty(&lookup, &[ALLOWED_ORIGIN_ENV]) {
            config.allowed_origin = if origin == "*" { None } else { Some(origin) };
        }
        Ok(config)
    }

    pub fn listen_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            return format!("[{}]:{}", self.host, self.port);
        }
        format!("{}:{}", self.host, self.port)
    }
}

pub fn parse_port(raw: &str) -> Result<u16, ConfigError> {
    raw.trim()
        .parse::<u16>()
        .map_err(|_| ConfigError::InvalidPort(raw.to_string()))
}

fn first_non_empty(lookup: &impl Fn(&str) -> Option<String>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| lookup(key))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}
