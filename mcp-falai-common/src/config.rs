//! Configuration module for loading environment variables and settings.

use crate::error::ConfigError;

/// Environment variable holding the fal.ai API key.
pub const API_KEY_VAR: &str = "FALAI_API_KEY";

/// Default base URL for fal.ai synchronous model endpoints.
pub const DEFAULT_API_BASE: &str = "https://fal.run";

/// Default upstream request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// fal.ai API key (required)
    pub api_key: String,
    /// Base URL that model ids are appended to
    pub api_base: String,
    /// Timeout applied to every upstream request
    pub timeout_secs: u64,
    /// Download result images and return them base64-encoded instead of as URLs
    pub embed_images: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .field("embed_images", &self.embed_images)
            .finish()
    }
}

impl Config {
    /// Build a configuration with defaults for everything but the key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            embed_images: false,
        }
    }

    /// Load configuration from environment variables and .env file.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingEnvVar` if FALAI_API_KEY is not set, and
    /// `ConfigError::InvalidValue` for malformed optional settings.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_VAR)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::missing_env_var(API_KEY_VAR))?;

        let api_base = lookup("FALAI_API_BASE")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let timeout_secs = match lookup("FALAI_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ConfigError::invalid_value(
                        "FALAI_TIMEOUT_SECS",
                        format!("expected a positive number of seconds, got '{}'", raw),
                    ));
                }
            },
            None => DEFAULT_TIMEOUT_SECS,
        };

        let embed_images = match lookup("FALAI_EMBED_IMAGES") {
            Some(raw) => parse_flag(&raw)
                .ok_or_else(|| ConfigError::invalid_value("FALAI_EMBED_IMAGES", raw))?,
            None => false,
        };

        Ok(Self {
            api_key,
            api_base,
            timeout_secs,
            embed_images,
        })
    }

    /// Get the fal.ai endpoint URL for a model id such as `fal-ai/flux/dev`.
    pub fn endpoint(&self, model: &str) -> String {
        format!("{}/{}", self.api_base, model.trim_start_matches('/'))
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
