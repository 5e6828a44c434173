//! Domain models for Slack workspace data.
//!
//! These models mirror the Web API payloads the exporter consumes. Messages keep
//! any field we don't model explicitly so the JSON archive stays complete.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Profile section of a workspace member.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserProfile {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub real_name: Option<String>,
}

/// A workspace member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub profile: UserProfile,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub is_bot: bool,
}

impl User {
    /// Human-readable label: display name, then handle, then raw id.
    #[must_use]
    pub fn label(&self) -> &str {
        match self.profile.display_name.as_deref() {
            Some(display) if !display.is_empty() => display,
            _ if !self.name.is_empty() => self.name.as_str(),
            _ => self.id.as_str(),
        }
    }
}

/// A channel visible to the token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub num_members: Option<u32>,
}

/// Emoji reaction on a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    pub name: String,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub users: Vec<String>,
}

/// File shared in a message.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SlackFile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mimetype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_private: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_private_download: Option<String>,
    /// Where the attachment was saved, relative to the output directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SlackFile {
    /// Preferred download URL.
    #[must_use]
    pub fn download_url(&self) -> Option<&str> {
        self.url_private_download
            .as_deref()
            .or(self.url_private.as_deref())
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed")
    }

    #[must_use]
    pub fn display_type(&self) -> &str {
        self.mimetype.as_deref().unwrap_or("unknown")
    }
}

/// A single channel message or thread reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Message timestamp, doubles as its id within the channel.
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub reply_count: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reactions: Vec<Reaction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<SlackFile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Value>,
    /// Replies resolved by the exporter (not part of the API payload).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub thread_messages: Vec<Message>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl Message {
    /// Timestamp as fractional epoch seconds.
    #[must_use]
    pub fn ts_seconds(&self) -> Option<f64> {
        self.ts.parse().ok()
    }

    /// Timestamp in the local timezone.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Local>> {
        let (secs, frac) = self.ts.split_once('.').unwrap_or((self.ts.as_str(), "0"));
        let secs: i64 = secs.parse().ok()?;
        let micros: u32 = format!("{frac:0<6}").get(..6)?.parse().ok()?;
        DateTime::from_timestamp(secs, micros * 1000).map(|dt| dt.with_timezone(&Local))
    }

    #[must_use]
    pub fn has_thread(&self) -> bool {
        !self.thread_messages.is_empty()
    }

    /// Preformatted (code) sections of `rich_text` blocks.
    #[must_use]
    pub fn code_blocks(&self) -> Vec<String> {
        let mut out = Vec::new();
        for block in &self.blocks {
            if block.get("type").and_then(Value::as_str) != Some("rich_text") {
                continue;
            }
            let elements = block.get("elements").and_then(Value::as_array);
            for element in elements.into_iter().flatten() {
                if element.get("type").and_then(Value::as_str) != Some("rich_text_preformatted") {
                    continue;
                }
                let code = element
                    .get("elements")
                    .and_then(Value::as_array)
                    .map(|inner| {
                        inner
                            .iter()
                            .map(|e| e.get("text").and_then(Value::as_str).unwrap_or(""))
                            .collect::<Vec<_>>()
                            .join("\n")
                    })
                    .unwrap_or_default();
                out.push(code);
            }
        }
        out
    }
}

/// One page of a cursor-paginated API response.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor for the next page; `None` on the last page.
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// Builds a page, treating an empty cursor as the end.
    #[must_use]
    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self {
            items,
            next_cursor: next_cursor.filter(|c| !c.is_empty()),
        }
    }

    /// A final page.
    #[must_use]
    pub const fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }
}

/// Result of exporting one channel.
#[derive(Debug, Clone)]
pub struct ChannelExport {
    pub channel: String,
    pub message_count: usize,
    pub thread_count: usize,
    pub files_downloaded: usize,
    pub json_file: Option<String>,
    pub text_file: Option<String>,
    pub markdown_file: Option<String>,
}

impl ChannelExport {
    /// A channel with nothing in the requested window.
    #[must_use]
    pub fn empty(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            message_count: 0,
            thread_count: 0,
            files_downloaded: 0,
            json_file: None,
            text_file: None,
            markdown_file: None,
        }
    }

    /// Names of the archive files created for this channel.
    #[must_use]
    pub fn files_created(&self) -> Vec<&str> {
        [&self.json_file, &self.text_file, &self.markdown_file]
            .into_iter()
            .filter_map(Option::as_deref)
            .collect()
    }
}

/// Outcome of a whole export run.
#[derive(Debug, Clone, Default)]
pub struct ExportSummary {
    pub exported: Vec<ChannelExport>,
    /// Channels with no messages in the window.
    pub skipped: Vec<String>,
    /// Channels that failed, with the error message.
    pub failed: Vec<(String, String)>,
    pub anonymization_key: Option<PathBuf>,
    pub elapsed: Duration,
}

impl ExportSummary {
    #[must_use]
    pub fn total_messages(&self) -> usize {
        self.exported.iter().map(|c| c.message_count).sum()
    }

    #[must_use]
    pub fn total_files_downloaded(&self) -> usize {
        self.exported.iter().map(|c| c.files_downloaded).sum()
    }
}
