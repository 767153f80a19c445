//! The `response_url` webhook: how an interaction's originating message gets
//! replaced, deleted, or answered with plain text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::api::SlackApiError;

/// Body posted back to an interaction's `response_url`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replace_original: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_original: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<serde_json::Value>,
}

impl InteractionResponse {
    pub fn replace(blocks: serde_json::Value) -> Self {
        Self {
            replace_original: Some(true),
            blocks: Some(blocks),
            ..Self::default()
        }
    }

    pub fn delete() -> Self {
        Self {
            delete_original: Some(true),
            ..Self::default()
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

#[async_trait]
pub trait ResponseUrl: Send + Sync {
    async fn invoke(
        &self,
        response_url: &str,
        response: &InteractionResponse,
    ) -> Result<(), SlackApiError>;
}

#[derive(Default)]
pub struct ReqwestResponseUrl {
    http: reqwest::Client,
}

impl ReqwestResponseUrl {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResponseUrl for ReqwestResponseUrl {
    async fn invoke(
        &self,
        response_url: &str,
        response: &InteractionResponse,
    ) -> Result<(), SlackApiError> {
        let http_response = self.http.post(response_url).json(response).send().await?;

        let status = http_response.status().as_u16();
        if status != 200 {
            let body = http_response.text().await.unwrap_or_default();
            warn!(status, body = %body, "response_url webhook failed");
            return Err(SlackApiError::Api {
                status,
                message: body,
            });
        }

        // Slack answers either the literal "ok" or a JSON body with an `ok`
        // flag, depending on the endpoint generation.
        let body = http_response.text().await?;
        if body == "ok" {
            return Ok(());
        }
        match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(json) if json["ok"] == true => Ok(()),
            _ => {
                warn!(body = %body, "unexpected response_url reply");
                Err(SlackApiError::Api {
                    status,
                    message: body,
                })
            }
        }
    }
}
