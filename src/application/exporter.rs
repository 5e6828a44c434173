//! Export orchestration.
//!
//! Drives one export run: per channel it fetches history, downloads
//! attachments, renders the archives and writes them, then writes the
//! anonymization key for the whole run.

use std::future::Future;
use std::time::Instant;

use chrono::Local;

use crate::domain::{AppConfig, AppError, Channel, ChannelExport, ExportSummary, Message, Result};
use crate::infrastructure::{ArchiveKind, ArchiveWriter, SlackApi};

use super::anonymizer::{Anonymizer, UserDirectory};
use super::fetcher::{FetchOptions, Fetcher};
use super::formatter::{
    render_json_archive, render_markdown_archive, render_text_archive, RenderOptions,
};

/// Options for an export run.
#[derive(Debug, Clone, Copy)]
#[allow(clippy::struct_excessive_bools)]
pub struct ExportOptions {
    pub fetch: FetchOptions,
    pub render: RenderOptions,
    pub download_files: bool,
    pub create_markdown: bool,
    pub anonymize_json: bool,
}

impl ExportOptions {
    #[must_use]
    pub const fn from_config(config: &AppConfig) -> Self {
        Self {
            fetch: FetchOptions::from_config(&config.slack, config.export.fetch_threads),
            render: RenderOptions {
                include_reactions: config.export.include_reactions,
            },
            download_files: config.export.download_files,
            create_markdown: config.export.create_markdown,
            anonymize_json: config.export.anonymize_json,
        }
    }
}

/// Progress notifications emitted while a run is underway.
#[derive(Debug)]
pub enum ExportEvent<'e> {
    ChannelStarted { channel: &'e str },
    DownloadingAttachments { channel: &'e str },
    ChannelSkipped { channel: &'e str },
    ChannelExported(&'e ChannelExport),
    ChannelFailed { channel: &'e str, error: &'e AppError },
}

/// Exports channels from one workspace into one output directory.
pub struct Exporter<'a, C: SlackApi> {
    client: &'a C,
    options: ExportOptions,
    users: UserDirectory,
    anonymizer: Anonymizer,
    writer: ArchiveWriter,
}

impl<'a, C: SlackApi> Exporter<'a, C> {
    #[must_use]
    pub fn new(client: &'a C, options: ExportOptions, users: UserDirectory, writer: ArchiveWriter) -> Self {
        Self {
            client,
            options,
            users,
            anonymizer: Anonymizer::new(),
            writer,
        }
    }

    #[must_use]
    pub const fn writer(&self) -> &ArchiveWriter {
        &self.writer
    }

    /// Exports each channel in turn and writes the anonymization key.
    ///
    /// A failing channel is reported and skipped; the run carries on.
    ///
    /// # Errors
    /// Returns error only if the anonymization key cannot be written.
    pub async fn run<F>(&mut self, channels: &[Channel], cutoff: Option<f64>, mut on_event: F) -> Result<ExportSummary>
    where
        F: FnMut(ExportEvent<'_>),
    {
        let started = Instant::now();
        let mut summary = ExportSummary::default();

        for channel in channels {
            on_event(ExportEvent::ChannelStarted {
                channel: &channel.name,
            });

            match self.export_channel(channel, cutoff, &mut on_event).await {
                Ok(export) if export.message_count == 0 => {
                    on_event(ExportEvent::ChannelSkipped {
                        channel: &channel.name,
                    });
                    summary.skipped.push(export.channel);
                }
                Ok(export) => {
                    on_event(ExportEvent::ChannelExported(&export));
                    summary.exported.push(export);
                }
                Err(e) => {
                    tracing::error!("Error exporting #{}: {e}", channel.name);
                    on_event(ExportEvent::ChannelFailed {
                        channel: &channel.name,
                        error: &e,
                    });
                    summary.failed.push((channel.name.clone(), e.to_string()));
                }
            }
        }

        if !summary.exported.is_empty() || !summary.skipped.is_empty() {
            let key = self.anonymizer.key(&self.users);
            let content = key.to_json().map_err(AppError::json_parse)?;
            summary.anonymization_key = Some(self.writer.write_key(&content)?);
        }

        if !summary.skipped.is_empty() {
            tracing::info!(
                "Skipped {} empty channels: {:?}",
                summary.skipped.len(),
                summary.skipped
            );
        }

        summary.elapsed = started.elapsed();
        tracing::info!(
            channels = summary.exported.len(),
            messages = summary.total_messages(),
            elapsed_secs = summary.elapsed.as_secs_f64(),
            "Export completed"
        );

        Ok(summary)
    }

    /// Exports a single channel's messages.
    ///
    /// # Errors
    /// Returns error if history cannot be fetched or an archive cannot be written.
    pub async fn export_channel<F>(
        &mut self,
        channel: &Channel,
        cutoff: Option<f64>,
        on_event: &mut F,
    ) -> Result<ChannelExport>
    where
        F: FnMut(ExportEvent<'_>),
    {
        let name = channel.name.as_str();
        tracing::info!("Starting export for channel: #{name}");

        let fetcher = Fetcher::new(self.client, self.options.fetch);
        let mut messages = fetcher.fetch_messages(&channel.id, cutoff).await?;

        let mut files_downloaded = 0;
        if self.options.download_files && !messages.is_empty() {
            on_event(ExportEvent::DownloadingAttachments { channel: name });
            tracing::info!("Downloading attachments for #{name}");
            files_downloaded = self.download_attachments(name, &mut messages).await;
            if files_downloaded > 0 {
                tracing::info!("Downloaded {files_downloaded} files for #{name}");
            }
        }

        if messages.is_empty() {
            tracing::info!("No messages found for #{name} in date range");
            return Ok(ChannelExport::empty(name));
        }

        let message_count = messages.len();
        let thread_count = messages.iter().filter(|m| m.has_thread()).count();
        tracing::info!("Retrieved {message_count} messages ({thread_count} with threads) for #{name}");

        // Text first: pseudonyms are handed out in posting order.
        let text = render_text_archive(&messages, self.options.render, &mut self.anonymizer);
        let markdown = self.options.create_markdown.then(|| {
            render_markdown_archive(
                name,
                &messages,
                Local::now(),
                self.options.render,
                &mut self.anonymizer,
            )
        });
        let json = render_json_archive(&messages, self.options.anonymize_json, &mut self.anonymizer)
            .map_err(AppError::json_parse)?;

        let json_file = self.writer.write_archive(name, ArchiveKind::Json, &json)?;
        let text_file = self.writer.write_archive(name, ArchiveKind::Text, &text)?;
        let markdown_file = markdown
            .map(|md| self.writer.write_archive(name, ArchiveKind::Markdown, &md))
            .transpose()?;

        Ok(ChannelExport {
            channel: name.to_string(),
            message_count,
            thread_count,
            files_downloaded,
            json_file: Some(json_file),
            text_file: Some(text_file),
            markdown_file,
        })
    }

    /// Downloads every attachment of the messages and their replies, recording
    /// the local path on each file. Failures are logged and skipped.
    async fn download_attachments(&self, channel: &str, messages: &mut [Message]) -> usize {
        let mut count = 0;

        for msg in messages.iter_mut() {
            let ts = msg.ts.clone();
            let replies = msg.thread_messages.iter_mut();
            let targets = std::iter::once((ts, &mut msg.files))
                .chain(replies.map(|r| (r.ts.clone(), &mut r.files)));

            for (ts, files) in targets {
                for file in files.iter_mut() {
                    let Some(url) = file.download_url().map(str::to_string) else {
                        tracing::warn!("No download URL found for file: {}", file.display_name());
                        continue;
                    };

                    let (dest, relative) =
                        match self.writer.attachment_path(channel, &ts, file.display_name()) {
                            Ok(paths) => paths,
                            Err(e) => {
                                tracing::warn!("Failed to prepare {}: {e}", file.display_name());
                                continue;
                            }
                        };

                    match self.client.download(&url, &dest).await {
                        Ok(bytes) => {
                            tracing::info!(bytes, "Downloaded: {}", file.display_name());
                            file.local_path = Some(relative);
                            count += 1;
                        }
                        Err(e) => {
                            tracing::warn!("Failed to download {}: {e}", file.display_name());
                            let _ = std::fs::remove_file(&dest);
                        }
                    }
                }
            }
        }

        count
    }
}

/// Runs `work` unless `interrupt` resolves first.
///
/// # Errors
/// Returns `Interrupted` when the interrupt wins, otherwise the error of `work`.
pub async fn interruptible<T>(
    work: impl Future<Output = Result<T>>,
    interrupt: impl Future<Output = ()>,
) -> Result<T> {
    tokio::select! {
        biased;
        () = interrupt => {
            tracing::warn!("Export interrupted by user");
            Err(AppError::Interrupted)
        }
        result = work => result,
    }
}
