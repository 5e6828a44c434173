//! Message text sanitization.
//!
//! Rewrites Slack's mrkdwn markup so archives carry no user ids and read as
//! plain text.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::anonymizer::Anonymizer;

static USER_MENTION: LazyLock<Regex> = LazyLock::new(|| pattern(r"<@([UW][0-9A-Z]+)(?:\|[^>]*)?>"));
static EMOJI: LazyLock<Regex> = LazyLock::new(|| pattern(r":(\w+):"));
static LINK: LazyLock<Regex> = LazyLock::new(|| pattern(r"<(http[^>|]+)(\|[^>]+)?>"));
static CHANNEL_MENTION: LazyLock<Regex> = LazyLock::new(|| pattern(r"<#[^>]+>"));

#[allow(clippy::expect_used)]
fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("hard-coded pattern compiles")
}

/// Target rendering of sanitized text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextStyle {
    #[default]
    Plain,
    Markdown,
}

/// Scrubs a message body.
///
/// Mentions become pseudonyms, `:emoji:` markers lose their colons, links
/// collapse to the bare URL and channel references become `[channel]`.
pub fn clean_text(text: &str, style: TextStyle, anonymizer: &mut Anonymizer) -> String {
    let text = USER_MENTION.replace_all(text, |caps: &Captures| {
        let alias = anonymizer.alias(&caps[1]);
        match style {
            TextStyle::Plain => format!("[@{alias}]"),
            TextStyle::Markdown => format!("**@{alias}**"),
        }
    });
    let text = EMOJI.replace_all(&text, "${1}");
    let text = LINK.replace_all(&text, "${1}");
    let text = CHANNEL_MENTION.replace_all(&text, "[channel]");

    text.trim().to_string()
}
