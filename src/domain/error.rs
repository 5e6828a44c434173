//! Domain-level error types for slack-channel-export.
//!
//! All errors are typed with `thiserror` and provide meaningful context
//! without exposing the access token or raw payloads to end users.

use thiserror::Error;

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// The Web API answered with `"ok": false`.
    #[error("Slack API error in {method}: {error}")]
    Api { method: String, error: String },

    /// The Web API asked us to slow down.
    #[error("Rate limited in {method}")]
    RateLimited {
        method: String,
        /// Seconds advertised by the `Retry-After` header, if any.
        retry_after: Option<u64>,
    },

    /// Transport or HTTP status failure.
    #[error("HTTP error: {message}")]
    Http {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Every retry attempt was spent on rate limits.
    #[error("Max retries exceeded for {method} after {attempts} attempts")]
    RetriesExhausted { method: String, attempts: u32 },

    /// JSON parsing or serialization failed.
    #[error("JSON error: {message}")]
    JsonParse {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Configuration or environment error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The token can see no channels at all.
    #[error("No channels found or token missing proper read scopes")]
    NoChannels,

    /// Channel selection could not be resolved.
    #[error("Invalid selection: {message}")]
    InvalidSelection { message: String },

    /// The run was cut short by Ctrl-C.
    #[error("Export interrupted by user")]
    Interrupted,

    /// IO operation failed.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl AppError {
    /// Create an HTTP error from a reqwest error.
    pub fn http(err: reqwest::Error) -> Self {
        Self::Http {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create a JSON parse error.
    pub fn json_parse(err: serde_json::Error) -> Self {
        Self::JsonParse {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create an IO error with context.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(err),
        }
    }

    /// Create an API error for a method.
    pub fn api(method: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Api {
            method: method.into(),
            error: error.into(),
        }
    }

    /// Whether the retry loop should try the call again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Api { .. } | Self::RateLimited { .. } | Self::Http { .. }
        )
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
