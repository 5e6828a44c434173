//! Slack Web API client.
//!
//! `SlackApi` is the seam between the export logic and the network: the
//! application layer only sees pages of domain models, never HTTP.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::domain::{AppError, Channel, Message, Page, Result, SlackConfig, User};

/// Channel types requested from `conversations.list`.
const CHANNEL_TYPES: &str = "public_channel,private_channel";

/// Operations the exporter needs from a workspace.
#[async_trait]
pub trait SlackApi: Send + Sync {
    /// One page of `users.list`.
    async fn users_list(&self, cursor: Option<&str>) -> Result<Page<User>>;

    /// One page of `conversations.list` (public and private channels).
    async fn conversations_list(&self, cursor: Option<&str>, limit: u32) -> Result<Page<Channel>>;

    /// One page of `conversations.history`, newest first.
    async fn conversations_history(
        &self,
        channel: &str,
        cursor: Option<&str>,
        limit: u32,
        oldest: Option<f64>,
    ) -> Result<Page<Message>>;

    /// One page of `conversations.replies`; the parent comes first on page one.
    async fn conversations_replies(
        &self,
        channel: &str,
        ts: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<Message>>;

    /// Downloads an authenticated file URL into `dest`, returning bytes written.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64>;
}

#[derive(Debug, Deserialize, Default)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsersListResponse {
    #[serde(default)]
    members: Vec<User>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ChannelsResponse {
    #[serde(default)]
    channels: Vec<Channel>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

fn next_cursor(meta: Option<ResponseMetadata>) -> Option<String> {
    meta.and_then(|m| m.next_cursor)
}

/// HTTP implementation of [`SlackApi`] backed by reqwest.
pub struct HttpSlackClient {
    http: Client,
    base_url: String,
    token: String,
}

impl HttpSlackClient {
    /// Builds a client for the configured workspace.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be constructed.
    pub fn new(config: &SlackConfig, token: impl Into<String>) -> Result<Self> {
        // Per read, not per request: large attachments may stream for longer.
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let http = Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .user_agent(concat!("slack-channel-export/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(AppError::http)?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Calls a Web API method and decodes its payload.
    async fn call<T: DeserializeOwned>(&self, method: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}/{method}", self.base_url);
        tracing::debug!(method, "Calling Slack API");

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await
            .map_err(AppError::http)?;

        let retry_after = parse_retry_after(response.headers().get(RETRY_AFTER));

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimited {
                method: method.to_string(),
                retry_after,
            });
        }

        let response = response.error_for_status().map_err(AppError::http)?;
        let body = response.bytes().await.map_err(AppError::http)?;
        let value: Value = serde_json::from_slice(&body).map_err(AppError::json_parse)?;

        check_ok(method, &value, retry_after)?;

        serde_json::from_value(value).map_err(AppError::json_parse)
    }
}

/// Maps an `"ok": false` envelope onto the matching error.
fn check_ok(method: &str, value: &Value, retry_after: Option<u64>) -> Result<()> {
    if value.get("ok").and_then(Value::as_bool) == Some(true) {
        return Ok(());
    }

    let error = value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown_error");

    if error == "ratelimited" {
        return Err(AppError::RateLimited {
            method: method.to_string(),
            retry_after,
        });
    }

    Err(AppError::api(method, error))
}

fn parse_retry_after(header: Option<&reqwest::header::HeaderValue>) -> Option<u64> {
    header
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

fn with_cursor(mut query: Vec<(&'static str, String)>, cursor: Option<&str>) -> Vec<(&'static str, String)> {
    if let Some(cursor) = cursor {
        query.push(("cursor", cursor.to_string()));
    }
    query
}

#[async_trait]
impl SlackApi for HttpSlackClient {
    async fn users_list(&self, cursor: Option<&str>) -> Result<Page<User>> {
        let query = with_cursor(Vec::new(), cursor);
        let resp: UsersListResponse = self.call("users.list", &query).await?;
        Ok(Page::new(resp.members, next_cursor(resp.response_metadata)))
    }

    async fn conversations_list(&self, cursor: Option<&str>, limit: u32) -> Result<Page<Channel>> {
        let query = with_cursor(
            vec![
                ("types", CHANNEL_TYPES.to_string()),
                ("limit", limit.to_string()),
            ],
            cursor,
        );
        let resp: ChannelsResponse = self.call("conversations.list", &query).await?;
        Ok(Page::new(resp.channels, next_cursor(resp.response_metadata)))
    }

    async fn conversations_history(
        &self,
        channel: &str,
        cursor: Option<&str>,
        limit: u32,
        oldest: Option<f64>,
    ) -> Result<Page<Message>> {
        let mut query = vec![
            ("channel", channel.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(oldest) = oldest {
            query.push(("oldest", format!("{oldest:.6}")));
        }
        let query = with_cursor(query, cursor);
        let resp: MessagesResponse = self.call("conversations.history", &query).await?;
        Ok(Page::new(resp.messages, next_cursor(resp.response_metadata)))
    }

    async fn conversations_replies(
        &self,
        channel: &str,
        ts: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<Message>> {
        let query = with_cursor(
            vec![
                ("channel", channel.to_string()),
                ("ts", ts.to_string()),
                ("limit", limit.to_string()),
            ],
            cursor,
        );
        let resp: MessagesResponse = self.call("conversations.replies", &query).await?;
        Ok(Page::new(resp.messages, next_cursor(resp.response_metadata)))
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(AppError::http)?
            .error_for_status()
            .map_err(AppError::http)?;

        let mut file = std::fs::File::create(dest)
            .map_err(|e| AppError::io(format!("Failed to create {}", dest.display()), e))?;

        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(AppError::http)? {
            file.write_all(&chunk)
                .map_err(|e| AppError::io(format!("Failed to write {}", dest.display()), e))?;
            written += chunk.len() as u64;
        }

        Ok(written)
    }
}
