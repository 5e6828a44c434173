//! Export configuration model.
//!
//! Mirrors the TOML config file. Every field has a default so a partial file
//! (or none at all) still yields a usable configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Connection settings for the Slack Web API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// User token (`xoxp-...`). Usually supplied through `SLACK_TOKEN`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Base URL of the Web API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Attempts per API call before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Page size for channel and history listings.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Page size for thread replies.
    #[serde(default = "default_replies_page_size")]
    pub replies_page_size: u32,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base_url: default_api_base_url(),
            max_retries: default_max_retries(),
            page_size: default_page_size(),
            replies_page_size: default_replies_page_size(),
            request_timeout_secs: default_timeout(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://slack.com/api".to_string()
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_page_size() -> u32 {
    200
}

const fn default_replies_page_size() -> u32 {
    100
}

const fn default_timeout() -> u64 {
    30
}

/// What gets exported and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct ExportConfig {
    /// Directory receiving archives, attachments, key and log.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    #[serde(default = "default_true")]
    pub fetch_threads: bool,

    #[serde(default = "default_true")]
    pub include_reactions: bool,

    #[serde(default)]
    pub download_files: bool,

    #[serde(default)]
    pub create_markdown: bool,

    /// Pseudonymize user ids and scrub text in the JSON archive too.
    #[serde(default = "default_true")]
    pub anonymize_json: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            fetch_threads: true,
            include_reactions: true,
            download_files: false,
            create_markdown: false,
            anonymize_json: true,
        }
    }
}

const fn default_true() -> bool {
    true
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Write a per-run log file into the output directory.
    #[serde(default = "default_true")]
    pub enable_file_log: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_file_log: true,
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub slack: SlackConfig,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Get the output directory, using default if not configured.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.export
            .output_dir
            .clone()
            .unwrap_or_else(Self::default_output_dir)
    }

    /// Default output directory for archives.
    #[must_use]
    pub fn default_output_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("slack-exports")
    }

    /// Directory holding the config file.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".slack-export")
    }

    /// Get the default config file path.
    #[must_use]
    pub fn config_file_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    /// The configured token, if any non-blank one is set.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.slack
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}
