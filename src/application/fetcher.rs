//! Cursor-paginated retrieval of users, channels, history and threads.
//!
//! Every call goes through the retry policy; pages are walked until the API
//! stops handing out a cursor.

use crate::domain::{AppError, Channel, Message, Result, SlackConfig};
use crate::infrastructure::{with_retry, RetryPolicy, SlackApi};

use super::anonymizer::UserDirectory;

/// Options for fetching channel content.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub retry: RetryPolicy,
    pub page_size: u32,
    pub replies_page_size: u32,
    /// Resolve replies for messages that start a thread.
    pub fetch_threads: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from_config(&SlackConfig::default(), true)
    }
}

impl FetchOptions {
    #[must_use]
    pub const fn from_config(config: &SlackConfig, fetch_threads: bool) -> Self {
        Self {
            retry: RetryPolicy::new(config.max_retries),
            page_size: config.page_size,
            replies_page_size: config.replies_page_size,
            fetch_threads,
        }
    }
}

/// Walks paginated Web API listings for one client.
pub struct Fetcher<'a, C: SlackApi> {
    client: &'a C,
    options: FetchOptions,
}

impl<'a, C: SlackApi> Fetcher<'a, C> {
    #[must_use]
    pub const fn new(client: &'a C, options: FetchOptions) -> Self {
        Self { client, options }
    }

    /// Loads every workspace member into a directory.
    ///
    /// # Errors
    /// Returns error if any page fails after retries.
    pub async fn load_users(&self) -> Result<UserDirectory> {
        tracing::info!("Starting user list retrieval");
        let mut users = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = with_retry(self.options.retry, "users.list", || {
                self.client.users_list(cursor.as_deref())
            })
            .await?;
            users.extend(page.items);

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        let directory = UserDirectory::from_users(&users);
        tracing::info!("Successfully loaded {} user profiles", directory.len());
        Ok(directory)
    }

    /// Lists all accessible public and private channels, sorted by name.
    ///
    /// # Errors
    /// Returns `NoChannels` when nothing is visible, or the API error.
    pub async fn list_channels(&self) -> Result<Vec<Channel>> {
        let mut channels = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = with_retry(self.options.retry, "conversations.list", || {
                self.client
                    .conversations_list(cursor.as_deref(), self.options.page_size)
            })
            .await?;
            channels.extend(page.items);

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        if channels.is_empty() {
            return Err(AppError::NoChannels);
        }

        channels.sort_by_key(|c| c.name.to_lowercase());
        tracing::info!("Found {} accessible channels", channels.len());
        Ok(channels)
    }

    /// Fetches a channel's history, newest first, optionally bounded by `cutoff`
    /// (epoch seconds). Thread replies are attached when enabled.
    ///
    /// # Errors
    /// Returns error if a history page fails after retries.
    pub async fn fetch_messages(&self, channel_id: &str, cutoff: Option<f64>) -> Result<Vec<Message>> {
        let mut messages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = with_retry(self.options.retry, "conversations.history", || {
                self.client.conversations_history(
                    channel_id,
                    cursor.as_deref(),
                    self.options.page_size,
                    cutoff,
                )
            })
            .await?;

            let mut batch: Vec<Message> = page
                .items
                .into_iter()
                .filter(|m| within_cutoff(m, cutoff))
                .collect();

            if self.options.fetch_threads {
                for msg in batch.iter_mut().filter(|m| m.reply_count > 0) {
                    msg.thread_messages = self.fetch_thread_replies(channel_id, &msg.ts).await;
                }
            }

            tracing::debug!(channel_id, batch = batch.len(), "Fetched history page");
            messages.extend(batch);

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(messages)
    }

    /// Fetches the replies of a thread, without its parent message.
    ///
    /// Failures are logged and yield whatever was collected so far.
    pub async fn fetch_thread_replies(&self, channel_id: &str, thread_ts: &str) -> Vec<Message> {
        let mut replies = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let result = with_retry(self.options.retry, "conversations.replies", || {
                self.client.conversations_replies(
                    channel_id,
                    thread_ts,
                    cursor.as_deref(),
                    self.options.replies_page_size,
                )
            })
            .await;

            let page = match result {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(channel_id, thread_ts, "Failed to fetch thread replies: {e}");
                    break;
                }
            };

            replies.extend(page.items.into_iter().filter(|m| m.ts != thread_ts));

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        replies
    }
}

fn within_cutoff(msg: &Message, cutoff: Option<f64>) -> bool {
    match (cutoff, msg.ts_seconds()) {
        (Some(cutoff), Some(ts)) => ts >= cutoff,
        _ => true,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::{Page, User};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory workspace serving canned pages keyed by cursor.
    #[derive(Default)]
    pub struct FakeSlack {
        pub users: Vec<Page<User>>,
        pub channels: Vec<Page<Channel>>,
        /// channel id → history pages
        pub history: HashMap<String, Vec<Page<Message>>>,
        /// thread ts → reply pages
        pub replies: HashMap<String, Vec<Page<Message>>>,
        /// Method names that fail with this error the first N times.
        pub failures: Mutex<HashMap<String, (u32, String)>>,
        /// URLs that fail to download.
        pub broken_urls: Vec<String>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeSlack {
        pub fn fail(&self, method: &str, times: u32, error: &str) {
            self.failures
                .lock()
                .unwrap()
                .insert(method.to_string(), (times, error.to_string()));
        }

        pub fn calls(&self, method: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.as_str() == method)
                .count()
        }

        fn record(&self, method: &str) -> Result<()> {
            self.calls.lock().unwrap().push(method.to_string());
            let mut failures = self.failures.lock().unwrap();
            if let Some((remaining, error)) = failures.get_mut(method) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(if error == "ratelimited" {
                        AppError::RateLimited {
                            method: method.to_string(),
                            retry_after: Some(0),
                        }
                    } else {
                        AppError::api(method, error.clone())
                    });
                }
            }
            Ok(())
        }
    }

    /// Picks the page addressed by a cursor of the form `"p<N>"`.
    fn page_at<T: Clone>(pages: &[Page<T>], cursor: Option<&str>) -> Page<T> {
        let index = cursor
            .and_then(|c| c.strip_prefix('p'))
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(0);
        pages.get(index).cloned().unwrap_or_else(|| Page::last(Vec::new()))
    }

    /// Splits items into pages chained with `"p<N>"` cursors.
    pub fn paged<T>(chunks: Vec<Vec<T>>) -> Vec<Page<T>> {
        let total = chunks.len();
        chunks
            .into_iter()
            .enumerate()
            .map(|(i, items)| {
                let next = (i + 1 < total).then(|| format!("p{}", i + 1));
                Page::new(items, next)
            })
            .collect()
    }

    pub fn msg(value: serde_json::Value) -> Message {
        serde_json::from_value(value).unwrap()
    }

    pub fn channel(id: &str, name: &str) -> Channel {
        serde_json::from_value(json!({"id": id, "name": name})).unwrap()
    }

    #[async_trait]
    impl SlackApi for FakeSlack {
        async fn users_list(&self, cursor: Option<&str>) -> Result<Page<User>> {
            self.record("users.list")?;
            Ok(page_at(&self.users, cursor))
        }

        async fn conversations_list(&self, cursor: Option<&str>, _limit: u32) -> Result<Page<Channel>> {
            self.record("conversations.list")?;
            Ok(page_at(&self.channels, cursor))
        }

        async fn conversations_history(
            &self,
            channel: &str,
            cursor: Option<&str>,
            _limit: u32,
            _oldest: Option<f64>,
        ) -> Result<Page<Message>> {
            self.record("conversations.history")?;
            let pages = self.history.get(channel).cloned().unwrap_or_default();
            Ok(page_at(&pages, cursor))
        }

        async fn conversations_replies(
            &self,
            _channel: &str,
            ts: &str,
            cursor: Option<&str>,
            _limit: u32,
        ) -> Result<Page<Message>> {
            self.record("conversations.replies")?;
            let pages = self.replies.get(ts).cloned().unwrap_or_default();
            Ok(page_at(&pages, cursor))
        }

        async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
            self.record("download")?;
            if self.broken_urls.iter().any(|u| u == url) {
                return Err(AppError::Http {
                    message: format!("404 for {url}"),
                    source: None,
                });
            }
            let body = format!("contents of {url}");
            std::fs::write(dest, &body).map_err(|e| AppError::io("write", e))?;
            Ok(body.len() as u64)
        }
    }

    pub fn fast_options(fetch_threads: bool) -> FetchOptions {
        FetchOptions {
            retry: RetryPolicy {
                max_retries: 3,
                base_delay: Duration::ZERO,
            },
            page_size: 200,
            replies_page_size: 100,
            fetch_threads,
        }
    }

    #[tokio::test]
    async fn test_load_users_concatenates_pages() {
        let users: Vec<User> = serde_json::from_value(json!([
            {"id": "U1", "name": "a"},
            {"id": "U2", "name": "b", "profile": {"display_name": "Bee"}},
            {"id": "U3", "name": "c"}
        ]))
        .unwrap();
        let fake = FakeSlack {
            users: paged(vec![users[..2].to_vec(), users[2..].to_vec()]),
            ..FakeSlack::default()
        };

        let directory = Fetcher::new(&fake, fast_options(true)).load_users().await.unwrap();
        assert_eq!(directory.len(), 3);
        assert_eq!(directory.name("U2"), Some("Bee"));
        assert_eq!(fake.calls("users.list"), 2);
    }

    #[tokio::test]
    async fn test_list_channels_sorted_case_insensitive() {
        let fake = FakeSlack {
            channels: paged(vec![
                vec![channel("C1", "random"), channel("C2", "Announcements")],
                vec![channel("C3", "general")],
            ]),
            ..FakeSlack::default()
        };

        let channels = Fetcher::new(&fake, fast_options(true)).list_channels().await.unwrap();
        let names: Vec<_> = channels.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Announcements", "general", "random"]);
    }

    #[tokio::test]
    async fn test_list_channels_empty_is_error() {
        let fake = FakeSlack {
            channels: paged(vec![Vec::new()]),
            ..FakeSlack::default()
        };

        let err = Fetcher::new(&fake, fast_options(true)).list_channels().await.unwrap_err();
        assert!(matches!(err, AppError::NoChannels));
    }

    #[tokio::test]
    async fn test_rate_limited_call_is_retried() {
        let fake = FakeSlack {
            channels: paged(vec![vec![channel("C1", "general")]]),
            ..FakeSlack::default()
        };
        fake.fail("conversations.list", 1, "ratelimited");

        let channels = Fetcher::new(&fake, fast_options(true)).list_channels().await.unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(fake.calls("conversations.list"), 2);
    }

    #[tokio::test]
    async fn test_fetch_messages_applies_cutoff_and_threads() {
        let mut fake = FakeSlack::default();
        fake.history.insert(
            "C1".into(),
            paged(vec![
                vec![
                    msg(json!({"ts": "300.0", "user": "U1", "text": "newest"})),
                    msg(json!({"ts": "200.0", "user": "U2", "text": "thread", "reply_count": 2})),
                ],
                vec![msg(json!({"ts": "100.0", "user": "U1", "text": "too old"}))],
            ]),
        );
        fake.replies.insert(
            "200.0".into(),
            paged(vec![
                vec![
                    msg(json!({"ts": "200.0", "user": "U2", "text": "thread"})),
                    msg(json!({"ts": "201.0", "user": "U1", "text": "r1"})),
                ],
                vec![msg(json!({"ts": "202.0", "user": "U3", "text": "r2"}))],
            ]),
        );

        let messages = Fetcher::new(&fake, fast_options(true))
            .fetch_messages("C1", Some(150.0))
            .await
            .unwrap();

        assert_eq!(messages.len(), 2);
        let replies: Vec<_> = messages[1].thread_messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(replies, vec!["r1", "r2"]);
        assert!(messages[0].thread_messages.is_empty());
        assert_eq!(fake.calls("conversations.history"), 2);
    }

    #[tokio::test]
    async fn test_threads_skipped_when_disabled() {
        let mut fake = FakeSlack::default();
        fake.history.insert(
            "C1".into(),
            paged(vec![vec![msg(json!({"ts": "200.0", "text": "t", "reply_count": 1}))]]),
        );

        let messages = Fetcher::new(&fake, fast_options(false))
            .fetch_messages("C1", None)
            .await
            .unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(fake.calls("conversations.replies"), 0);
    }

    #[tokio::test]
    async fn test_thread_failure_yields_empty() {
        let fake = FakeSlack::default();
        fake.fail("conversations.replies", 5, "thread_not_found");

        let replies = Fetcher::new(&fake, fast_options(true))
            .fetch_thread_replies("C1", "1.0")
            .await;

        assert!(replies.is_empty());
        assert_eq!(fake.calls("conversations.replies"), 3);
    }

    #[tokio::test]
    async fn test_history_error_propagates_after_retries() {
        let fake = FakeSlack::default();
        fake.fail("conversations.history", 5, "channel_not_found");

        let err = Fetcher::new(&fake, fast_options(true))
            .fetch_messages("C1", None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Api { ref error, .. } if error == "channel_not_found"));
        assert_eq!(fake.calls("conversations.history"), 3);
    }
}
