//! Domain layer - core types and errors.
//!
//! This layer contains pure domain models, configuration and error types
//! without any I/O.

pub mod config;
pub mod error;
pub mod models;

pub use config::{AppConfig, SlackConfig};
pub use error::{AppError, Result};
pub use models::{Channel, ChannelExport, ExportSummary, Message, Page, User};
