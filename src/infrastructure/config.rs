//! Configuration file management.
//!
//! Handles loading and creating TOML configuration files.

use std::fs;
use std::path::Path;

use crate::domain::{AppConfig, AppError, Result};

/// Default configuration file content.
const DEFAULT_CONFIG: &str = r#"# Slack Channel Export Configuration
# Auto-generated - edit as needed

[slack]
# User token (xoxp-...). Prefer the SLACK_TOKEN environment variable.
# token = "xoxp-..."

# Web API base URL
api_base_url = "https://slack.com/api"

# Attempts per API call before giving up
max_retries = 3

# Page sizes for listings and thread replies
page_size = 200
replies_page_size = 100

# Per-request timeout in seconds
request_timeout_secs = 30

[export]
# Output directory (optional, defaults to ~/slack-exports)
# output_dir = "/path/to/exports"

# Resolve threaded replies (slower)
fetch_threads = true

# Include emoji reactions in text and markdown output
include_reactions = true

# Download file attachments (slower, uses disk space)
download_files = false

# Also write a .md archive per channel
create_markdown = false

# Pseudonymize user ids and scrub text in the JSON archive
anonymize_json = true

[logging]
# Write a per-run log file into the output directory
enable_file_log = true
"#;

/// Load configuration from the default location, or defaults if absent.
///
/// # Errors
/// Returns error if file exists but cannot be read or parsed.
pub fn load_config() -> Result<AppConfig> {
    let config_path = AppConfig::config_file_path();

    if config_path.exists() {
        load_config_from_file(&config_path)
    } else {
        Ok(AppConfig::default())
    }
}

/// Load configuration from a specific file.
///
/// # Errors
/// Returns error if file cannot be read or parsed.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read config file: {}", path.display()), e))?;

    toml::from_str(&content).map_err(|e| AppError::Config {
        message: format!("Failed to parse config file: {e}"),
    })
}

/// Create the annotated default configuration file if it doesn't exist.
///
/// Returns `true` when a new file was written.
///
/// # Errors
/// Returns error if file cannot be created.
pub fn ensure_config_exists(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::io("Failed to create config directory", e))?;
    }

    fs::write(path, DEFAULT_CONFIG)
        .map_err(|e| AppError::io("Failed to create default config", e))?;

    tracing::info!(path = %path.display(), "Created default configuration");

    Ok(true)
}
