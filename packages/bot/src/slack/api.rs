//! Slack Web API client.
//!
//! The [`SlackApi`] trait is the seam the workflow depends on; the reqwest
//! implementation talks to `https://slack.com/api/`. Cancellation of a
//! scheduled message is allowed to fail - the workflow treats a failed
//! `chat.deleteScheduledMessage` as "it already fired" and resolves the race
//! itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum SlackApiError {
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),
    /// The API answered but with `ok: false` (or a non-200 status).
    #[error("slack api error. status: {status}, error: {message}")]
    Api { status: u16, message: String },
}

/// The Web API operations the workflow needs.
#[async_trait]
pub trait SlackApi: Send + Sync {
    /// Post a message; returns its `ts`.
    async fn chat_post_message(
        &self,
        channel: &str,
        text: &str,
        blocks: Option<serde_json::Value>,
    ) -> Result<String, SlackApiError>;

    /// Schedule a message for `post_at`; returns its `scheduled_message_id`.
    async fn chat_schedule_message(
        &self,
        channel: &str,
        post_at: DateTime<Utc>,
        blocks: serde_json::Value,
    ) -> Result<String, SlackApiError>;

    /// Withdraw a scheduled message. Fails once the message has fired.
    async fn chat_delete_scheduled_message(
        &self,
        channel: &str,
        scheduled_message_id: &str,
    ) -> Result<(), SlackApiError>;

    /// Replace a posted message's blocks.
    async fn chat_update(
        &self,
        channel: &str,
        ts: &str,
        blocks: serde_json::Value,
    ) -> Result<(), SlackApiError>;

    /// Fetch messages around `ts` (inclusive window, newest first).
    async fn conversations_history(
        &self,
        channel: &str,
        latest: &str,
        limit: u32,
        oldest: &str,
    ) -> Result<Vec<serde_json::Value>, SlackApiError>;
}

pub struct SlackApiClient {
    http: reqwest::Client,
    token: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    scheduled_message_id: Option<String>,
    #[serde(default)]
    messages: Option<Vec<serde_json::Value>>,
}

impl SlackApiClient {
    const BASE_URL: &'static str = "https://slack.com/api/";

    pub fn new(token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.into(),
            base_url: Self::BASE_URL.to_string(),
        }
    }

    /// Point the client at a different API root (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn invoke(
        &self,
        method: &str,
        payload: serde_json::Value,
    ) -> Result<ApiResponse, SlackApiError> {
        let url = format!("{}{}", self.base_url, method);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body: ApiResponse = response.json().await?;

        if !body.ok {
            let message = body.error.unwrap_or_else(|| "unknown".to_string());
            warn!(method, status, error = %message, "slack api call failed");
            return Err(SlackApiError::Api { status, message });
        }

        Ok(body)
    }

    fn missing_field(method: &str) -> SlackApiError {
        SlackApiError::Api {
            status: 200,
            message: format!("{method} response missing expected field"),
        }
    }
}

#[async_trait]
impl SlackApi for SlackApiClient {
    async fn chat_post_message(
        &self,
        channel: &str,
        text: &str,
        blocks: Option<serde_json::Value>,
    ) -> Result<String, SlackApiError> {
        let mut payload = json!({ "channel": channel, "text": text });
        if let Some(blocks) = blocks {
            payload["blocks"] = blocks;
        }

        let response = self.invoke("chat.postMessage", payload).await?;
        response
            .ts
            .ok_or_else(|| Self::missing_field("chat.postMessage"))
    }

    async fn chat_schedule_message(
        &self,
        channel: &str,
        post_at: DateTime<Utc>,
        blocks: serde_json::Value,
    ) -> Result<String, SlackApiError> {
        let payload = json!({
            "channel": channel,
            "post_at": post_at.timestamp(),
            "text": "",
            "blocks": blocks,
        });

        let response = self.invoke("chat.scheduleMessage", payload).await?;
        response
            .scheduled_message_id
            .ok_or_else(|| Self::missing_field("chat.scheduleMessage"))
    }

    async fn chat_delete_scheduled_message(
        &self,
        channel: &str,
        scheduled_message_id: &str,
    ) -> Result<(), SlackApiError> {
        self.invoke(
            "chat.deleteScheduledMessage",
            json!({
                "channel": channel,
                "scheduled_message_id": scheduled_message_id,
            }),
        )
        .await
        .map(|_| ())
    }

    async fn chat_update(
        &self,
        channel: &str,
        ts: &str,
        blocks: serde_json::Value,
    ) -> Result<(), SlackApiError> {
        self.invoke(
            "chat.update",
            json!({ "channel": channel, "ts": ts, "text": "", "blocks": blocks }),
        )
        .await
        .map(|_| ())
    }

    async fn conversations_history(
        &self,
        channel: &str,
        latest: &str,
        limit: u32,
        oldest: &str,
    ) -> Result<Vec<serde_json::Value>, SlackApiError> {
        let response = self
            .invoke(
                "conversations.history",
                json!({
                    "channel": channel,
                    "latest": latest,
                    "limit": limit,
                    "oldest": oldest,
                    "inclusive": true,
                }),
            )
            .await?;

        Ok(response.messages.unwrap_or_default())
    }
}
