//! Application layer - use cases and orchestration.
//!
//! This layer contains the export logic: pagination, anonymization,
//! sanitization, rendering and the per-channel export run.

pub mod anonymizer;
pub mod exporter;
pub mod fetcher;
pub mod formatter;
pub mod sanitizer;
pub mod selection;

pub use exporter::{interruptible, ExportEvent, ExportOptions, Exporter};
pub use fetcher::Fetcher;
pub use formatter::{format_channel_list, format_stats, format_summary_table};
pub use selection::{parse_channel_selection, DateWindow};
