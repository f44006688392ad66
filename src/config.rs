//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Public Gemini REST origin.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Placeholder avatar image service.
pub const DEFAULT_AVATAR_BASE_URL: &str = "https://api.dicebear.com/7.x/personas/png";

/// Models offered when discovery fails or no credential is available.
pub const DEFAULT_MODELS: [&str; 3] = ["gemini-1.5-flash", "gemini-1.5-pro", "gemini-pro"];

/// Trainer configuration, loaded from the environment.
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    /// Server-side API key. Clients may still supply their own.
    pub api_key: Option<SecretString>,
    /// Preferred model when a client has not picked one.
    pub default_model: Option<String>,
    pub bind_addr: String,
    pub port: u16,
    pub gemini_base_url: String,
    pub request_timeout: Duration,
    pub avatar_base_url: String,
    /// Sampling temperature forwarded to the model, if set.
    pub temperature: Option<f32>,
    /// Directory for rolling log files. Stderr only when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_model: None,
            bind_addr: "0.0.0.0".to_string(),
            port: 8080,
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(60),
            avatar_base_url: DEFAULT_AVATAR_BASE_URL.to_string(),
            temperature: None,
            log_dir: None,
        }
    }
}

impl TrainerConfig {
    /// Load configuration from `GEMINI_API_KEY` and the `NEXUS_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = match non_empty("NEXUS_PORT") {
            Some(raw) => parse_value::<u16>("NEXUS_PORT", &raw)?,
            None => defaults.port,
        };

        let request_timeout = match non_empty("NEXUS_REQUEST_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = parse_value::<u64>("NEXUS_REQUEST_TIMEOUT_SECS", &raw)?;
                if secs == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: "NEXUS_REQUEST_TIMEOUT_SECS".to_string(),
                        message: "must be greater than zero".to_string(),
                    });
                }
                Duration::from_secs(secs)
            }
            None => defaults.request_timeout,
        };

        let temperature = match non_empty("NEXUS_TEMPERATURE") {
            Some(raw) => {
                let t = parse_value::<f32>("NEXUS_TEMPERATURE", &raw)?;
                if !(0.0..=2.0).contains(&t) {
                    return Err(ConfigError::InvalidValue {
                        key: "NEXUS_TEMPERATURE".to_string(),
                        message: format!("{t} is outside 0.0..=2.0"),
                    });
                }
                Some(t)
            }
            None => None,
        };

        Ok(Self {
            api_key: non_empty("GEMINI_API_KEY").map(SecretString::from),
            default_model: non_empty("NEXUS_MODEL"),
            bind_addr: non_empty("NEXUS_BIND").unwrap_or(defaults.bind_addr),
            port,
            gemini_base_url: non_empty("NEXUS_GEMINI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.gemini_base_url),
            request_timeout,
            avatar_base_url: non_empty("NEXUS_AVATAR_BASE_URL").unwrap_or(defaults.avatar_base_url),
            temperature,
            log_dir: non_empty("NEXUS_LOG_DIR").map(PathBuf::from),
        })
    }

    /// Socket address string for the HTTP listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{raw:?}: {e}"),
    })
}
