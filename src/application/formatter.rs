//! Output formatting for exported channel data.
//!
//! Renders the text, Markdown and JSON archives plus the console listings.

use chrono::{DateTime, Local};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};
use serde_json::Value;

use crate::domain::{Channel, ExportSummary, Message};

use super::anonymizer::Anonymizer;
use super::sanitizer::{clean_text, TextStyle};

/// Label used for messages without a posting user (bots, joins, ...).
const SYSTEM_AUTHOR: &str = "System";

/// Keys holding a single user id.
const USER_ID_KEYS: &[&str] = &["user", "user_id", "parent_user_id", "inviter", "author_id"];
/// Keys holding a list of user ids.
const USER_LIST_KEYS: &[&str] = &["users", "reply_users"];
/// Keys that identify a person directly; dropped from the JSON archive.
const IDENTITY_KEYS: &[&str] = &[
    "user_profile",
    "author_name",
    "author_subname",
    "author_link",
    "author_icon",
];

/// Rendering switches for archives.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub include_reactions: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            include_reactions: true,
        }
    }
}

/// Formats a single message (without trailing newline for plain text).
pub fn format_message(
    msg: &Message,
    indent: usize,
    style: TextStyle,
    options: RenderOptions,
    anonymizer: &mut Anonymizer,
) -> String {
    let author = match msg.user.as_deref() {
        Some(uid) if uid != "system" => anonymizer.alias(uid),
        _ => SYSTEM_AUTHOR.to_string(),
    };
    let text = clean_text(&msg.text, style, anonymizer);
    let ts = msg.timestamp().map_or_else(
        || msg.ts.clone(),
        |dt| dt.format("%Y-%m-%d %H:%M:%S").to_string(),
    );
    let prefix = "  ".repeat(indent);
    let mut out = String::new();

    match style {
        TextStyle::Markdown => {
            out.push_str(&format!("{prefix}**{author}** [{ts}]: {text}\n"));

            if options.include_reactions && !msg.reactions.is_empty() {
                let reactions: Vec<String> =
                    msg.reactions.iter().map(|r| format!(":{}:", r.name)).collect();
                out.push_str(&format!("{prefix}*Reactions: {}*\n", reactions.join(" ")));
            }

            for code in msg.code_blocks() {
                out.push_str(&format!("{prefix}```\n{code}\n```\n"));
            }

            for file in &msg.files {
                let name = match &file.local_path {
                    Some(path) => format!("[{}]({path})", file.display_name()),
                    None => file.display_name().to_string(),
                };
                out.push_str(&format!("{prefix}📎 {name} ({})\n", file.display_type()));
            }
        }
        TextStyle::Plain => {
            out.push_str(&format!("{prefix}{author} [{ts}]: {text}"));

            if options.include_reactions && !msg.reactions.is_empty() {
                let reactions: Vec<String> = msg
                    .reactions
                    .iter()
                    .map(|r| format!(":{}:{}", r.name, r.count))
                    .collect();
                out.push_str(&format!("\n{prefix}  Reactions: {}", reactions.join(", ")));
            }

            for file in &msg.files {
                out.push_str(&format!(
                    "\n{prefix}  📎 File: {} ({})",
                    file.display_name(),
                    file.display_type()
                ));
                if let Some(path) = &file.local_path {
                    out.push_str(&format!(" [Saved to: {path}]"));
                }
            }
        }
    }

    out
}

/// Renders the plain-text archive, oldest message first.
///
/// `messages` is in API order (newest first).
pub fn render_text_archive(
    messages: &[Message],
    options: RenderOptions,
    anonymizer: &mut Anonymizer,
) -> String {
    let mut out = String::new();

    for msg in messages.iter().rev() {
        out.push_str(&format_message(msg, 0, TextStyle::Plain, options, anonymizer));
        out.push('\n');

        if msg.has_thread() {
            out.push_str(&format!(
                "  ↳ Thread ({} replies):\n",
                msg.thread_messages.len()
            ));
            for reply in &msg.thread_messages {
                out.push_str(&format_message(reply, 2, TextStyle::Plain, options, anonymizer));
                out.push('\n');
            }
        }

        out.push('\n');
    }

    out
}

/// Renders the Markdown archive, oldest message first.
pub fn render_markdown_archive(
    channel: &str,
    messages: &[Message],
    exported_at: DateTime<Local>,
    options: RenderOptions,
    anonymizer: &mut Anonymizer,
) -> String {
    let mut out = format!(
        "# Channel: #{channel}\n\nExported: {}\n\n---\n\n",
        exported_at.format("%Y-%m-%d %H:%M:%S")
    );

    for msg in messages.iter().rev() {
        out.push_str(&format_message(msg, 0, TextStyle::Markdown, options, anonymizer));

        if msg.has_thread() {
            out.push_str(&format!(
                "  *↳ Thread ({} replies):*\n\n",
                msg.thread_messages.len()
            ));
            for reply in &msg.thread_messages {
                out.push_str(&format_message(reply, 2, TextStyle::Markdown, options, anonymizer));
            }
        }

        out.push('\n');
    }

    out
}

/// Renders the JSON archive in API order.
///
/// With `anonymize`, user ids become pseudonyms, message text is sanitized and
/// embedded profiles and author details are removed.
///
/// # Errors
/// Returns error if serialization fails.
pub fn render_json_archive(
    messages: &[Message],
    anonymize: bool,
    anonymizer: &mut Anonymizer,
) -> Result<String, serde_json::Error> {
    let mut value = serde_json::to_value(messages)?;
    if anonymize {
        scrub(&mut value, anonymizer);
    }
    serde_json::to_string_pretty(&value)
}

/// Recursively pseudonymizes user references in an API payload.
///
/// Every non-empty string under a user key is aliased, the same way the text
/// renderer treats `user`.
fn scrub(value: &mut Value, anonymizer: &mut Anonymizer) {
    match value {
        Value::Array(items) => {
            for item in items {
                scrub(item, anonymizer);
            }
        }
        Value::Object(map) => {
            for key in IDENTITY_KEYS {
                map.remove(*key);
            }

            if map.contains_key("ts") {
                if let Some(Value::String(text)) = map.get_mut("text") {
                    *text = clean_text(text, TextStyle::Plain, anonymizer);
                }
            }

            for (key, field) in map.iter_mut() {
                let key = key.as_str();
                match field {
                    Value::String(id) if USER_ID_KEYS.contains(&key) => alias_in_place(id, anonymizer),
                    Value::Array(ids) if USER_LIST_KEYS.contains(&key) => {
                        for id in ids.iter_mut() {
                            if let Value::String(s) = id {
                                alias_in_place(s, anonymizer);
                            }
                        }
                    }
                    other => scrub(other, anonymizer),
                }
            }
        }
        _ => {}
    }
}

fn alias_in_place(id: &mut String, anonymizer: &mut Anonymizer) {
    if !id.is_empty() {
        *id = anonymizer.alias(id);
    }
}

/// Numbered channel listing for selection.
pub fn format_channel_list(channels: &[Channel]) -> String {
    let mut out = String::new();
    for (i, channel) in channels.iter().enumerate() {
        let privacy = if channel.is_private { "🔒" } else { "🌐" };
        let archived = if channel.is_archived {
            " (archived)".dimmed().to_string()
        } else {
            String::new()
        };
        out.push_str(&format!("{:3}. {privacy} {}{archived}\n", i + 1, channel.name));
    }
    out
}

/// Summary table of exported channels.
pub fn format_summary_table(summary: &ExportSummary) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Channel", "Messages", "Threads", "Files Created"]);

    for export in &summary.exported {
        table.add_row(vec![
            export.channel.clone(),
            export.message_count.to_string(),
            export.thread_count.to_string(),
            export.files_created().join(", "),
        ]);
    }

    table.to_string()
}

/// Formats run statistics for display.
pub fn format_stats(summary: &ExportSummary) -> String {
    format!(
        "{}\n  • Channels exported: {}\n  • Channels skipped: {}\n  • Channels failed: {}\n  • Total messages: {}\n  • Files downloaded: {}\n  • Time elapsed: {:.1} seconds",
        "📊 Export Statistics".bold(),
        summary.exported.len().to_string().cyan(),
        summary.skipped.len().to_string().yellow(),
        summary.failed.len().to_string().red(),
        summary.total_messages().to_string().green(),
        summary.total_files_downloaded().to_string().blue(),
        summary.elapsed.as_secs_f64()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChannelExport;
    use chrono::TimeZone;
    use serde_json::json;

    fn msg(value: Value) -> Message {
        serde_json::from_value(value).unwrap()
    }

    fn sample() -> Vec<Message> {
        // API order: newest first
        vec![
            msg(json!({
                "ts": "1700000200.000000",
                "user": "U2",
                "text": "thanks <@U1> :tada:",
                "reactions": [{"name": "heart", "count": 2, "users": ["U1", "U3"]}],
                "files": [{"id": "F1", "name": "plan.pdf", "mimetype": "application/pdf",
                           "local_path": "attachments/general/1700000200_000000_plan.pdf"}]
            })),
            msg(json!({
                "ts": "1700000100.000000",
                "user": "U1",
                "text": "kickoff",
                "reply_count": 1,
                "thread_messages": [{"ts": "1700000150.000000", "user": "U3", "text": "on it"}]
            })),
        ]
    }

    #[test]
    fn test_plain_message_layout() {
        let mut anon = Anonymizer::new();
        let messages = sample();
        let out = format_message(&messages[0], 0, TextStyle::Plain, RenderOptions::default(), &mut anon);

        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("anon01 ["));
        assert!(lines[0].ends_with("]: thanks [@anon02] tada"));
        assert_eq!(lines[1], "  Reactions: :heart:2");
        assert_eq!(
            lines[2],
            "  📎 File: plan.pdf (application/pdf) [Saved to: attachments/general/1700000200_000000_plan.pdf]"
        );
        assert!(!out.ends_with('\n'));
    }

    #[test]
    fn test_reactions_can_be_disabled() {
        let mut anon = Anonymizer::new();
        let options = RenderOptions {
            include_reactions: false,
        };
        let out = format_message(&sample()[0], 0, TextStyle::Plain, options, &mut anon);
        assert!(!out.contains("Reactions"));
    }

    #[test]
    fn test_markdown_message_layout() {
        let mut anon = Anonymizer::new();
        let code = msg(json!({
            "ts": "1700000000.000000",
            "text": "look",
            "blocks": [{"type": "rich_text", "elements": [
                {"type": "rich_text_preformatted", "elements": [{"type": "text", "text": "ls -la"}]}
            ]}],
            "reactions": [{"name": "eyes", "count": 1}],
            "files": [{"id": "F2", "name": "a.png"}]
        }));
        let out = format_message(&code, 2, TextStyle::Markdown, RenderOptions::default(), &mut anon);

        assert!(out.starts_with("    **System** ["));
        assert!(out.contains("    *Reactions: :eyes:*\n"));
        assert!(out.contains("    ```\nls -la\n```\n"));
        assert!(out.ends_with("    📎 a.png (unknown)\n"));
        assert!(anon.is_empty());
    }

    #[test]
    fn test_text_archive_is_chronological_with_threads() {
        let mut anon = Anonymizer::new();
        let out = render_text_archive(&sample(), RenderOptions::default(), &mut anon);

        let kickoff = out.find("kickoff").unwrap();
        let thanks = out.find("thanks").unwrap();
        assert!(kickoff < thanks);
        assert!(out.contains("  ↳ Thread (1 replies):\n    anon02 ["));
        // U1 posted first, so it gets the first pseudonym
        assert!(out.starts_with("anon01 ["));
        assert!(out.contains("thanks [@anon01]"));
    }

    #[test]
    fn test_markdown_archive_header() {
        let mut anon = Anonymizer::new();
        let exported = Local.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let out = render_markdown_archive("general", &sample(), exported, RenderOptions::default(), &mut anon);

        assert!(out.starts_with("# Channel: #general\n\nExported: 2025-01-02 03:04:05\n\n---\n\n"));
        assert!(out.contains("  *↳ Thread (1 replies):*\n\n"));
        assert!(out.contains("📎 [plan.pdf](attachments/general/1700000200_000000_plan.pdf) (application/pdf)"));
    }

    #[test]
    fn test_json_archive_anonymized() {
        let mut anon = Anonymizer::new();
        let mut messages = sample();
        messages[0].extra.insert("user_profile".into(), json!({"real_name": "Jane Doe"}));
        messages[1].extra.insert("reply_users".into(), json!(["U3"]));

        // The text archive is rendered first, so aliases follow posting order.
        render_text_archive(&messages, RenderOptions::default(), &mut anon);
        let out = render_json_archive(&messages, true, &mut anon).unwrap();
        assert!(!out.contains("Jane Doe"));
        assert!(!out.contains("\"U1\""));
        assert!(!out.contains("\"U3\""));

        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed[0]["text"], "thanks [@anon01] tada");
        assert_eq!(parsed[0]["reactions"][0]["users"], json!(["anon01", "anon02"]));
        assert_eq!(parsed[0]["user"], "anon03");
        assert_eq!(parsed[1]["user"], "anon01");
        assert_eq!(parsed[1]["thread_messages"][0]["user"], "anon02");
        assert_eq!(parsed[1]["reply_users"], json!(["anon02"]));
    }

    #[test]
    fn test_json_archive_raw() {
        let mut anon = Anonymizer::new();
        let out = render_json_archive(&sample(), false, &mut anon).unwrap();
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed[0]["user"], "U2");
        assert_eq!(parsed[0]["text"], "thanks <@U1> :tada:");
        assert!(anon.is_empty());
    }

    #[test]
    fn test_json_archive_strips_attachment_authors() {
        let mut anon = Anonymizer::new();
        let messages = vec![msg(json!({
            "ts": "1700000300.000000",
            "user": "U9",
            "text": "fwd",
            "attachments": [{
                "author_id": "U777",
                "author_name": "Jane Doe",
                "author_subname": "jdoe",
                "author_link": "https://team.slack.com/team/U777",
                "author_icon": "https://avatars/jane.png",
                "text": "original words"
            }]
        }))];

        render_text_archive(&messages, RenderOptions::default(), &mut anon);
        let out = render_json_archive(&messages, true, &mut anon).unwrap();
        assert!(!out.contains("U777"));
        assert!(!out.contains("Jane Doe"));
        assert!(!out.contains("jdoe"));
        assert!(!out.contains("avatars"));

        let parsed: Value = serde_json::from_str(&out).unwrap();
        let attachment = &parsed[0]["attachments"][0];
        assert_eq!(parsed[0]["user"], "anon01");
        assert_eq!(attachment["author_id"], "anon02");
        assert_eq!(attachment["text"], "original words");
        assert!(attachment.get("author_name").is_none());
    }

    #[test]
    fn test_json_archive_aliases_any_user_value() {
        let mut anon = Anonymizer::new();
        let messages = vec![msg(json!({
            "ts": "1700000400.000000",
            "user": "USLACKBOT",
            "text": "reminder",
            "inviter": "U1"
        }))];

        render_text_archive(&messages, RenderOptions::default(), &mut anon);
        let out = render_json_archive(&messages, true, &mut anon).unwrap();
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed[0]["user"], "anon01");
        assert_eq!(parsed[0]["inviter"], "anon02");
    }

    #[test]
    fn test_summary_table_lists_files() {
        let mut export = ChannelExport::empty("general");
        export.message_count = 12;
        export.json_file = Some("x.json".into());
        export.text_file = Some("x.txt".into());
        let summary = ExportSummary {
            exported: vec![export],
            ..ExportSummary::default()
        };

        let table = format_summary_table(&summary);
        assert!(table.contains("general"));
        assert!(table.contains("12"));
        assert!(table.contains("x.json, x.txt"));
    }

    #[test]
    fn test_channel_list_numbering() {
        let channels: Vec<Channel> = serde_json::from_value(json!([
            {"id": "C1", "name": "general"},
            {"id": "C2", "name": "secret", "is_private": true}
        ]))
        .unwrap();
        let out = format_channel_list(&channels);
        assert!(out.contains("  1. 🌐 general"));
        assert!(out.contains("  2. 🔒 secret"));
    }
}
