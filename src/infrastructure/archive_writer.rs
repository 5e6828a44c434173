//! Archive file layout and writing.
//!
//! Owns the output directory of one export run: per-channel archives, the
//! attachments tree and the anonymization key all hang off it.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::domain::{AppError, Result};

/// Subdirectory for downloaded attachments.
const ATTACHMENTS_DIR: &str = "attachments";

/// Archive kinds written per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Json,
    Text,
    Markdown,
}

impl ArchiveKind {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "txt",
            Self::Markdown => "md",
        }
    }
}

/// Writes files for a single export run.
#[derive(Debug, Clone)]
pub struct ArchiveWriter {
    output_dir: PathBuf,
    stamp: String,
}

impl ArchiveWriter {
    /// Creates the output directory and fixes the run's file-name stamp.
    ///
    /// # Errors
    /// Returns error if the output directory cannot be created.
    pub fn new(output_dir: impl Into<PathBuf>, started: DateTime<Local>) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir).map_err(|e| {
            AppError::io(
                format!("Failed to create directory {}", output_dir.display()),
                e,
            )
        })?;

        Ok(Self {
            output_dir,
            stamp: run_stamp(started),
        })
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    #[must_use]
    pub fn stamp(&self) -> &str {
        &self.stamp
    }

    /// File name of a channel archive, e.g. `2025-01-31-0930-Slack-Export-general.txt`.
    #[must_use]
    pub fn archive_name(&self, channel: &str, kind: ArchiveKind) -> String {
        format!(
            "{}-Slack-Export-{}.{}",
            self.stamp,
            safe_component(channel),
            kind.extension()
        )
    }

    /// File name of the anonymization key.
    #[must_use]
    pub fn key_name(&self) -> String {
        format!("{}-anonymization-key.json", self.stamp)
    }

    /// Writes a channel archive and returns its file name.
    ///
    /// # Errors
    /// Returns error if the file cannot be written.
    pub fn write_archive(&self, channel: &str, kind: ArchiveKind, content: &str) -> Result<String> {
        let name = self.archive_name(channel, kind);
        self.write_file(&name, content)?;
        tracing::info!("Saved {}: {name}", kind.extension().to_uppercase());
        Ok(name)
    }

    /// Writes the anonymization key and returns its full path.
    ///
    /// # Errors
    /// Returns error if the file cannot be written.
    pub fn write_key(&self, content: &str) -> Result<PathBuf> {
        let name = self.key_name();
        self.write_file(&name, content)?;
        let path = self.output_dir.join(name);
        tracing::info!(path = %path.display(), "Saved anonymization key");
        Ok(path)
    }

    /// Prepares the local path for an attachment.
    ///
    /// Returns the absolute destination and the path relative to the output
    /// directory (always `/`-separated, as it is embedded in archives).
    ///
    /// # Errors
    /// Returns error if the channel's attachment directory cannot be created.
    pub fn attachment_path(&self, channel: &str, ts: &str, file_name: &str) -> Result<(PathBuf, String)> {
        let channel = safe_component(channel);
        let dir = self.output_dir.join(ATTACHMENTS_DIR).join(&channel);
        fs::create_dir_all(&dir)
            .map_err(|e| AppError::io(format!("Failed to create directory {}", dir.display()), e))?;

        let local_name = format!("{}_{}", ts.replace('.', "_"), safe_component(file_name));
        let relative = format!("{ATTACHMENTS_DIR}/{channel}/{local_name}");
        Ok((dir.join(local_name), relative))
    }

    /// Root of the attachments tree.
    #[must_use]
    pub fn attachments_dir(&self) -> PathBuf {
        self.output_dir.join(ATTACHMENTS_DIR)
    }

    fn write_file(&self, name: &str, content: &str) -> Result<()> {
        let path = self.output_dir.join(name);
        fs::write(&path, content)
            .map_err(|e| AppError::io(format!("Failed to write {}", path.display()), e))
    }
}

/// `YYYY-MM-DD-HHMM` stamp shared by every file of a run.
#[must_use]
pub fn run_stamp(started: DateTime<Local>) -> String {
    started.format("%Y-%m-%d-%H%M").to_string()
}

/// Log file name for a run started at `started`.
#[must_use]
pub fn log_file_name(started: DateTime<Local>) -> String {
    format!("slack_export_{}.log", started.format("%Y%m%d_%H%M%S"))
}

/// Strips path separators so remote names can't escape their directory.
fn safe_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();

    match cleaned.trim() {
        "" | "." | ".." => "unknown".to_string(),
        trimmed => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn started() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 7, 9, 5, 42).unwrap()
    }

    #[test]
    fn test_names() {
        let dir = tempdir().unwrap();
        let writer = ArchiveWriter::new(dir.path(), started()).unwrap();

        assert_eq!(writer.stamp(), "2025-03-07-0905");
        assert_eq!(
            writer.archive_name("general", ArchiveKind::Json),
            "2025-03-07-0905-Slack-Export-general.json"
        );
        assert_eq!(
            writer.archive_name("general", ArchiveKind::Markdown),
            "2025-03-07-0905-Slack-Export-general.md"
        );
        assert_eq!(writer.key_name(), "2025-03-07-0905-anonymization-key.json");
        assert_eq!(log_file_name(started()), "slack_export_20250307_090542.log");
    }

    #[test]
    fn test_write_archive_and_key() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("exports");
        let writer = ArchiveWriter::new(&out, started()).unwrap();

        let name = writer
            .write_archive("random", ArchiveKind::Text, "hello\n")
            .unwrap();
        assert_eq!(fs::read_to_string(out.join(&name)).unwrap(), "hello\n");

        let key = writer.write_key("{}").unwrap();
        assert!(key.starts_with(&out));
        assert_eq!(fs::read_to_string(key).unwrap(), "{}");
    }

    #[test]
    fn test_attachment_path() {
        let dir = tempdir().unwrap();
        let writer = ArchiveWriter::new(dir.path(), started()).unwrap();

        let (abs, rel) = writer
            .attachment_path("general", "1700000000.000100", "report.pdf")
            .unwrap();
        assert_eq!(rel, "attachments/general/1700000000_000100_report.pdf");
        assert_eq!(abs, dir.path().join(&rel));
        assert!(abs.parent().unwrap().is_dir());
    }

    #[test]
    fn test_attachment_name_cannot_escape() {
        let dir = tempdir().unwrap();
        let writer = ArchiveWriter::new(dir.path(), started()).unwrap();

        let (_, rel) = writer
            .attachment_path("general", "1.2", "../../etc/passwd")
            .unwrap();
        assert_eq!(rel, "attachments/general/1_2_.._.._etc_passwd");

        let (_, rel) = writer.attachment_path("..", "1.2", "").unwrap();
        assert_eq!(rel, "attachments/unknown/1_2_unknown");
    }
}
