//! Channel and date-window selection.

use chrono::{DateTime, Duration, Local};

use crate::domain::{AppError, Channel, Result};

/// How far back to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateWindow {
    /// Only messages newer than this many days.
    Days(u32),
    /// Full history.
    #[default]
    All,
}

impl DateWindow {
    /// Windows offered by the interactive menu, in menu order.
    pub const PRESETS: [u32; 4] = [7, 30, 60, 90];

    /// Maps a menu answer (`1`-`5`) to a window; anything unknown means all.
    #[must_use]
    pub fn from_menu_choice(choice: &str) -> Self {
        choice
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| Self::PRESETS.get(i))
            .map_or(Self::All, |&days| Self::Days(days))
    }

    /// Oldest timestamp to keep, as epoch seconds.
    #[must_use]
    pub fn cutoff(self, now: DateTime<Local>) -> Option<f64> {
        match self {
            Self::Days(days) => {
                let cutoff = now - Duration::days(i64::from(days));
                #[allow(clippy::cast_precision_loss)]
                Some(cutoff.timestamp() as f64)
            }
            Self::All => None,
        }
    }

    #[must_use]
    pub fn describe(self) -> String {
        match self {
            Self::Days(days) => format!("Last {days} days"),
            Self::All => "All messages".to_string(),
        }
    }
}

impl std::str::FromStr for DateWindow {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Self::All),
            other => other
                .parse::<u32>()
                .ok()
                .filter(|d| Self::PRESETS.contains(d))
                .map(Self::Days)
                .ok_or_else(|| format!("Unknown window: {s}. Use one of 7, 30, 60, 90 or 'all'")),
        }
    }
}

/// Resolves a selection like `all` or `1,3,4` against the numbered list.
///
/// Numbers are 1-based. Non-numeric tokens are ignored; an out-of-range number
/// rejects the whole selection.
///
/// # Errors
/// Returns `InvalidSelection` if a number is out of range or nothing remains.
pub fn parse_channel_selection(input: &str, channels: &[Channel]) -> Result<Vec<Channel>> {
    let input = input.trim().to_lowercase();

    if input == "all" {
        return Ok(channels.to_vec());
    }

    let mut selected = Vec::new();
    for token in input.split(',').map(str::trim) {
        if token.is_empty() || !token.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }

        let number: usize = token.parse().map_err(|_| AppError::InvalidSelection {
            message: format!("'{token}' is not a channel number"),
        })?;

        let channel = number
            .checked_sub(1)
            .and_then(|i| channels.get(i))
            .ok_or_else(|| AppError::InvalidSelection {
                message: format!("Number {number} is out of range (1-{})", channels.len()),
            })?;

        selected.push(channel.clone());
    }

    if selected.is_empty() {
        return Err(AppError::InvalidSelection {
            message: "No valid channels selected".into(),
        });
    }

    Ok(selected)
}
