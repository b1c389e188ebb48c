//! Error types for the common library.
//!
//! This module provides a unified error hierarchy using `thiserror` for consistent
//! error handling across the fal.ai MCP server.
//!
//! # Error Categories
//!
//! - `ConfigError`: Missing or invalid configuration
//! - `Error::Validation`: Missing or invalid tool arguments (no upstream call made)
//! - `Error::Api`: fal.ai API errors (includes endpoint and status)
//! - `Error::GenerationFailed`: Any failure of the image generation call
//! - `Error::Timeout`: Upstream call exceeded the configured timeout
//! - `Error::UnknownTool`: Tool name not served by this server

use thiserror::Error;

/// Unified error type for the common library.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration errors (missing env vars, invalid values)
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// API errors with endpoint and HTTP status context.
    ///
    /// A status code of 0 means no response was received.
    #[error("API error for {endpoint} (HTTP {status_code}): {message}")]
    Api {
        /// The API endpoint that was called
        endpoint: String,
        /// HTTP status code returned by the API
        status_code: u16,
        /// Error message from the API or describing the failure
        message: String,
    },

    /// Image generation failed; carries the underlying failure message
    #[error("Failed to generate image: {0}")]
    GenerationFailed(String),

    /// Input validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Upstream call timeout
    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    /// Tool name not recognized by the dispatcher
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

impl Error {
    /// Create a new API error with endpoint, status code, and message.
    ///
    /// # Example
    ///
    /// ```
    /// use mcp_falai_common::error::Error;
    ///
    /// let err = Error::api("https://fal.run/fal-ai/esrgan", 500, "Internal server error");
    /// assert!(err.to_string().contains("fal.run"));
    /// assert!(err.to_string().contains("500"));
    /// ```
    pub fn api(endpoint: impl Into<String>, status_code: u16, message: impl Into<String>) -> Self {
        Error::Api {
            endpoint: endpoint.into(),
            status_code,
            message: message.into(),
        }
    }

    /// Create a new validation error.
    ///
    /// # Example
    ///
    /// ```
    /// use mcp_falai_common::error::Error;
    ///
    /// let err = Error::validation("Prompt is required");
    /// assert!(err.to_string().contains("Prompt is required"));
    /// ```
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// Wrap any failure of the generation call.
    ///
    /// Nested generation failures are not wrapped twice.
    pub fn generation_failed(source: Error) -> Self {
        match source {
            Error::GenerationFailed(message) => Error::GenerationFailed(message),
            other => Error::GenerationFailed(other.to_string()),
        }
    }

    /// Create a new timeout error.
    pub fn timeout(seconds: u64) -> Self {
        Error::Timeout(seconds)
    }

    /// Create a new unknown tool error.
    pub fn unknown_tool(name: impl Into<String>) -> Self {
        Error::UnknownTool(name.into())
    }

    /// Map a `reqwest` transport failure for `endpoint` into an error.
    ///
    /// Timeouts become `Error::Timeout` carrying the configured limit.
    pub fn from_request(endpoint: &str, err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            return Error::timeout(timeout_secs);
        }
        let status_code = err.status().map(|s| s.as_u16()).unwrap_or(0);
        Error::api(endpoint, status_code, format!("Request failed: {}", err))
    }

    /// Whether this error was raised before any upstream call was attempted.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

/// Configuration errors.
///
/// These errors occur when loading or validating configuration from
/// environment variables or configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set
    #[error("Required environment variable {0} is not set")]
    MissingEnvVar(String),

    /// An environment variable has an invalid value
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl ConfigError {
    /// Create a new missing environment variable error.
    pub fn missing_env_var(name: impl Into<String>) -> Self {
        ConfigError::MissingEnvVar(name.into())
    }

    /// Create a new invalid value error.
    pub fn invalid_value(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue(name.into(), reason.into())
    }
}

/// Result type alias using the unified Error type.
pub type Result<T> = std::result::Result<T, Error>;
