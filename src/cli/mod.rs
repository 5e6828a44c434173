//! CLI interface using clap.
//!
//! Provides command-line arguments and subcommands for the tool.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::application::DateWindow;
use crate::domain::AppConfig;

/// Slack Channel Export - Export channel history into anonymized local archives.
///
/// Export only data you have legitimate access to, and keep the anonymization
/// key secure: it maps pseudonyms back to real users.
#[derive(Parser, Debug)]
#[command(name = "slack-export")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.slack-export/config.toml).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Slack user token (xoxp-...).
    #[arg(long, env = "SLACK_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Directory for archives, attachments, key and log.
    #[arg(short, long, global = true)]
    pub output_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List accessible channels (numbered, alphabetical).
    Channels,

    /// Export channels to JSON/text/markdown archives.
    Export(ExportArgs),

    /// Write an annotated default config file.
    InitConfig,

    /// Print the config file location.
    ConfigPath,
}

#[derive(Args, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct ExportArgs {
    /// Channel numbers from `channels` (e.g. "1,3") or "all". Prompts if omitted.
    #[arg(long)]
    pub channels: Option<String>,

    /// Only export the last 7, 30, 60 or 90 days. Prompts if neither this nor --all-history is given.
    #[arg(long, conflicts_with = "all_history")]
    pub days: Option<DateWindow>,

    /// Export the complete history.
    #[arg(long)]
    pub all_history: bool,

    /// Skip threaded replies (faster).
    #[arg(long)]
    pub no_threads: bool,

    /// Leave emoji reactions out of text and markdown output.
    #[arg(long)]
    pub no_reactions: bool,

    /// Download file attachments.
    #[arg(long)]
    pub download_files: bool,

    /// Also write a markdown archive per channel.
    #[arg(long)]
    pub markdown: bool,

    /// Keep real user ids and unscrubbed text in the JSON archive.
    #[arg(long)]
    pub raw_json: bool,
}

impl Cli {
    /// Config file to read.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(AppConfig::config_file_path)
    }

    /// Applies global flag overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(token) = &self.token {
            config.slack.token = Some(token.clone());
        }
        if let Some(dir) = &self.output_dir {
            config.export.output_dir = Some(dir.clone());
        }
        if let Commands::Export(args) = &self.command {
            args.apply_overrides(config);
        }
    }
}

impl ExportArgs {
    /// Applies export flag overrides. Flags only ever switch a default.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if self.no_threads {
            config.export.fetch_threads = false;
        }
        if self.no_reactions {
            config.export.include_reactions = false;
        }
        if self.download_files {
            config.export.download_files = true;
        }
        if self.markdown {
            config.export.create_markdown = true;
        }
        if self.raw_json {
            config.export.anonymize_json = false;
        }
    }

    /// Window requested on the command line, if any.
    #[must_use]
    pub fn window(&self) -> Option<DateWindow> {
        if self.all_history {
            Some(DateWindow::All)
        } else {
            self.days
        }
    }
}
