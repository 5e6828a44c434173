//! Slack Channel Export - Export Slack channel history into anonymized archives.
//!
//! Reads channels, users and message history through the Slack Web API and
//! writes per-channel JSON, text and Markdown archives with user identities
//! replaced by stable pseudonyms, plus a key to reverse them.
//!
//! QUICK START:
//!   export SLACK_TOKEN=xoxp-...
//!   slack-export channels                            # Numbered channel list
//!   slack-export export                              # Interactive selection
//!   slack-export export --channels 1,3 --days 30     # Non-interactive
//!   slack-export export --channels all --all-history --markdown --download-files

mod application;
mod cli;
mod domain;
mod infrastructure;

use std::fs::File;
use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use chrono::{DateTime, Local};
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use application::{
    format_channel_list, format_stats, format_summary_table, interruptible,
    parse_channel_selection, DateWindow, ExportEvent, ExportOptions, Exporter, Fetcher,
};
use cli::{Cli, Commands, ExportArgs};
use domain::{AppConfig, AppError, Channel};
use infrastructure::{
    ensure_config_exists, load_config, load_config_from_file, log_file_name, ArchiveWriter,
    HttpSlackClient,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Fatal error: {e:#}");
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Main application logic.
async fn run(cli: Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::InitConfig => {
            setup_logging(cli.verbose, None);
            return cmd_init_config(&cli.config_path());
        }
        Commands::ConfigPath => {
            println!("{}", cli.config_path().display());
            return Ok(());
        }
        Commands::Channels | Commands::Export(_) => {}
    }

    let config = effective_config(&cli)?;

    match &cli.command {
        Commands::Export(args) => {
            let started = Local::now();
            let log_path = if config.logging.enable_file_log {
                Some(open_log_file(&config, started)?)
            } else {
                None
            };
            setup_logging(cli.verbose, log_path.as_ref().map(|(_, file)| file));
            cmd_export(&config, args, started, log_path.map(|(name, _)| name)).await?;
        }
        Commands::Channels => {
            setup_logging(cli.verbose, None);
            cmd_channels(&config).await?;
        }
        Commands::InitConfig | Commands::ConfigPath => {}
    }

    Ok(())
}

/// Loads the config file and layers CLI/environment overrides on top.
fn effective_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config_from_file(path)
            .with_context(|| format!("Loading config from {}", path.display()))?,
        None => load_config().context("Loading default config")?,
    };
    cli.apply_overrides(&mut config);

    if config.token().is_none() {
        return Err(AppError::Config {
            message: "No Slack token: set SLACK_TOKEN, pass --token or add it under [slack]".into(),
        }
        .into());
    }

    Ok(config)
}

/// Write the default config file command.
fn cmd_init_config(path: &Path) -> anyhow::Result<()> {
    if ensure_config_exists(path)? {
        println!("{} Created {}", "✓".green().bold(), path.display());
    } else {
        println!("Config already exists at {}", path.display());
    }
    Ok(())
}

fn build_client(config: &AppConfig) -> domain::Result<HttpSlackClient> {
    let token = config.token().ok_or_else(|| AppError::Config {
        message: "No Slack token configured".into(),
    })?;
    HttpSlackClient::new(&config.slack, token)
}

/// List channels command.
async fn cmd_channels(config: &AppConfig) -> anyhow::Result<()> {
    let client = build_client(config)?;
    let options = ExportOptions::from_config(config);
    let channels = Fetcher::new(&client, options.fetch).list_channels().await?;

    println!("{}", "📋 Channels available (alphabetical):".bold());
    print!("{}", format_channel_list(&channels));
    println!();
    println!("Total: {} channel(s)", channels.len());

    Ok(())
}

/// Export command.
async fn cmd_export(
    config: &AppConfig,
    args: &ExportArgs,
    started: DateTime<Local>,
    log_name: Option<String>,
) -> anyhow::Result<()> {
    tracing::info!("Slack Channel Export - Starting");

    let client = build_client(config)?;
    let options = ExportOptions::from_config(config);
    let fetcher = Fetcher::new(&client, options.fetch);

    println!("\n🔗 Connecting to Slack workspace...");
    let users = fetcher.load_users().await?;
    println!("👥 Loaded {} user profiles", users.len());

    let channels = fetcher.list_channels().await?;

    let selection = match &args.channels {
        Some(sel) => sel.clone(),
        None => {
            println!("\n{}", "📋 Channels available (alphabetical):".bold());
            print!("{}", format_channel_list(&channels));
            prompt("\nEnter channel number(s) (comma-separated, or 'all'): ")?
        }
    };
    let selected = parse_channel_selection(&selection, &channels)?;
    log_selection(&selected, channels.len());

    let window = match args.window() {
        Some(window) => window,
        None => prompt_window()?,
    };
    let cutoff = window.cutoff(Local::now());
    match window {
        DateWindow::Days(days) => println!("⏱ Exporting messages newer than {days} days ago.\n"),
        DateWindow::All => println!("📜 Exporting all available messages.\n"),
    }
    tracing::info!("Date filter: {}", window.describe());

    let writer = ArchiveWriter::new(config.output_dir(), started)?;
    println!("Files will be created in:\n📂 {}\n", writer.output_dir().display());
    if options.download_files {
        println!("📥 File downloads enabled - this may take longer\n");
        tracing::info!("File downloads: ENABLED");
    }

    let mut exporter = Exporter::new(&client, options, users, writer);
    let summary = interruptible(exporter.run(&selected, cutoff, print_event), ctrl_c()).await?;
    let writer = exporter.writer();

    if summary.exported.is_empty() && summary.skipped.is_empty() {
        println!("\n{} No channels were exported.", "⚠️".yellow());
        return Ok(());
    }

    println!("\n{}", "🧾 EXPORT SUMMARY".bold());
    if !summary.exported.is_empty() {
        println!("{}", format_summary_table(&summary));
    }

    if !summary.skipped.is_empty() {
        println!("\n⚠️  Channels with no messages in date range (files not created):");
        for name in &summary.skipped {
            println!("   • {name}");
        }
    }

    if !summary.failed.is_empty() {
        println!("\n{} Channels that failed:", "❌".red());
        for (name, error) in &summary.failed {
            println!("   • {name}: {error}");
        }
    }

    println!("\n🎯 Files saved to: {}", writer.output_dir().display());
    if options.download_files && writer.attachments_dir().exists() {
        println!("📥 Attachments saved to: {}", writer.attachments_dir().display());
    }

    if let Some(key) = &summary.anonymization_key {
        let name = key.file_name().map_or_else(
            || key.display().to_string(),
            |n| n.to_string_lossy().into_owned(),
        );
        println!("🔑 Anonymization key saved to: {name}");
        println!("    (Keep this file secure - it maps anonymous IDs back to real usernames)");
    }

    println!();
    println!("{}", format_stats(&summary));
    if let Some(name) = log_name {
        println!("  • Log file: {name}");
    }

    Ok(())
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

/// Console progress for an export run.
fn print_event(event: ExportEvent<'_>) {
    match event {
        ExportEvent::ChannelStarted { channel } => {
            println!("📡 Exporting channel: #{}", channel.cyan());
        }
        ExportEvent::DownloadingAttachments { .. } => {
            println!("   → Downloading attachments...");
        }
        ExportEvent::ChannelSkipped { .. } => {
            println!("   ⚠️  No messages found in date range - skipping file creation");
        }
        ExportEvent::ChannelExported(export) => {
            println!(
                "   → Retrieved {} messages ({} with threads)",
                export.message_count, export.thread_count
            );
            println!(
                "   {} Saved {}",
                "✓".green().bold(),
                export.files_created().join(", ")
            );
        }
        ExportEvent::ChannelFailed { channel, error } => {
            println!("   {} Error exporting #{channel}: {error}", "❌".red());
        }
    }
}

fn log_selection(selected: &[Channel], available: usize) {
    if selected.len() == available {
        tracing::info!("User selected: ALL channels");
    } else {
        let names: Vec<&str> = selected.iter().map(|c| c.name.as_str()).collect();
        tracing::info!("User selected {} channel(s): {names:?}", selected.len());
    }
}

/// Date window menu.
fn prompt_window() -> anyhow::Result<DateWindow> {
    println!("\n🕓 Select export window:");
    for (i, days) in DateWindow::PRESETS.iter().enumerate() {
        println!("{}. Last {days} days", i + 1);
    }
    println!("{}. All messages (no filter)", DateWindow::PRESETS.len() + 1);

    let choice = prompt(&format!(
        "Enter selection [1-{}]: ",
        DateWindow::PRESETS.len() + 1
    ))?;
    Ok(DateWindow::from_menu_choice(&choice))
}

/// Reads one line of input after printing a question.
fn prompt(question: &str) -> anyhow::Result<String> {
    print!("{question}");
    std::io::stdout().flush().context("Flushing stdout")?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Reading selection from stdin")?;
    Ok(line.trim().to_string())
}

/// Creates the run's log file in the output directory.
fn open_log_file(config: &AppConfig, started: DateTime<Local>) -> anyhow::Result<(String, File)> {
    let dir = config.output_dir();
    std::fs::create_dir_all(&dir)
        .map_err(|e| AppError::io(format!("Failed to create directory {}", dir.display()), e))?;

    let name = log_file_name(started);
    let file = File::create(dir.join(&name))
        .map_err(|e| AppError::io(format!("Failed to create log file {name}"), e))?;
    Ok((name, file))
}

/// Setup tracing/logging based on verbosity level, optionally mirroring
/// this crate's info-level events into a log file.
fn setup_logging(verbosity: u8, log_file: Option<&File>) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let file_layer = log_file.and_then(|f| f.try_clone().ok()).map(|file| {
        fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(Mutex::new(file))
            .with_filter(Targets::new().with_target(env!("CARGO_CRATE_NAME"), LevelFilter::INFO))
    });

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_filter(filter),
        )
        .with(file_layer)
        .init();
}
