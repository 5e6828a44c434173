//! Infrastructure layer - external adapters (Slack Web API, filesystem).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod archive_writer;
pub mod config;
pub mod retry;
pub mod slack_client;

pub use archive_writer::{log_file_name, ArchiveKind, ArchiveWriter};
pub use config::{ensure_config_exists, load_config, load_config_from_file};
pub use retry::{with_retry, RetryPolicy};
pub use slack_client::{HttpSlackClient, SlackApi};
