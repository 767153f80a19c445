//! Slash-command dispatcher.
//!
//! Recognizes form-encoded requests carrying a `command` field, dedups by
//! `trigger_id`, and routes by the literal command string (`/mob`, ...). The
//! listener's response is the Slack wire JSON: a `response_type` of
//! `in_channel` or `ephemeral` plus `text` and/or `blocks`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cache::IdempotencyCache;
use crate::dispatcher::{DispatchGate, Dispatcher};
use crate::error::DispatchError;
use crate::request::{DispatchOutput, IncomingRequest};

/// The decoded slash-command form fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlashCommand {
    pub token: String,
    pub command: String,
    pub text: String,
    pub user_id: String,
    pub user_name: String,
    pub channel_id: String,
    pub trigger_id: String,
    pub response_url: String,
}

impl SlashCommand {
    /// Decode from form parameters; `None` when the `command` field is absent
    /// (the request belongs to another protocol).
    pub fn from_request(request: &IncomingRequest) -> Option<Self> {
        let command = request.param("command")?;

        let field = |key: &str| request.param(key).unwrap_or_default().to_string();

        Some(Self {
            token: field("token"),
            command: command.to_string(),
            text: field("text"),
            user_id: field("user_id"),
            user_name: field("user_name"),
            channel_id: field("channel_id"),
            trigger_id: field("trigger_id"),
            response_url: field("response_url"),
        })
    }
}

/// Visibility of a slash-command response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    InChannel,
    Ephemeral,
}

/// Slack wire response for a slash command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub response_type: ResponseType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<serde_json::Value>,
}

impl CommandResponse {
    pub fn ephemeral_text(text: impl Into<String>) -> Self {
        Self {
            response_type: ResponseType::Ephemeral,
            text: Some(text.into()),
            blocks: None,
        }
    }

    pub fn in_channel_blocks(blocks: serde_json::Value) -> Self {
        Self {
            response_type: ResponseType::InChannel,
            text: None,
            blocks: Some(blocks),
        }
    }
}

/// Handles one registered slash command.
#[async_trait]
pub trait CommandListener: Send + Sync {
    async fn run(&self, command: SlashCommand) -> anyhow::Result<Option<CommandResponse>>;
}

pub struct CommandDispatcher {
    gate: DispatchGate,
    listeners: HashMap<String, Arc<dyn CommandListener>>,
}

impl CommandDispatcher {
    pub fn new(verification_token: impl Into<String>, cache: Arc<dyn IdempotencyCache>) -> Self {
        Self {
            gate: DispatchGate::new("SlashCommand", verification_token, cache),
            listeners: HashMap::new(),
        }
    }

    /// Register a listener for a command string. Last registration wins.
    pub fn add_listener(&mut self, command: impl Into<String>, listener: Arc<dyn CommandListener>) {
        self.listeners.insert(command.into(), listener);
    }
}

#[async_trait]
impl Dispatcher for CommandDispatcher {
    async fn handle(
        &self,
        request: &IncomingRequest,
    ) -> Result<Option<DispatchOutput>, DispatchError> {
        let Some(command) = SlashCommand::from_request(request) else {
            return Ok(None);
        };

        self.gate.verify(request.param("token"))?;
        self.gate.check_duplicate(&command.trigger_id).await?;

        let listener = self.listeners.get(&command.command).ok_or_else(|| {
            DispatchError::Unroutable {
                discriminator: command.command.clone(),
            }
        })?;

        let response = listener
            .run(command)
            .await
            .map_err(DispatchError::Listener)?;

        DispatchOutput::from_response(response).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::cache::InMemoryIdempotencyCache;
    use crate::testing::command_request;

    struct CountingListener {
        calls: AtomicUsize,
        response: Option<CommandResponse>,
    }

    impl CountingListener {
        fn new(response: Option<CommandResponse>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                response,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CommandListener for CountingListener {
        async fn run(&self, _command: SlashCommand) -> anyhow::Result<Option<CommandResponse>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    fn dispatcher_with(listener: Arc<CountingListener>) -> CommandDispatcher {
        let mut dispatcher =
            CommandDispatcher::new("secret", Arc::new(InMemoryIdempotencyCache::new()));
        dispatcher.add_listener("/mob", listener);
        dispatcher
    }

    #[tokio::test]
    async fn unrecognized_shape_is_not_performed() {
        let dispatcher = dispatcher_with(CountingListener::new(None));
        let request = IncomingRequest::from_body("{}");

        assert!(dispatcher.handle(&request).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn forged_token_fails_before_listener_runs() {
        let listener = CountingListener::new(None);
        let dispatcher = dispatcher_with(listener.clone());
        let request = command_request("forged", "/mob", "", "trigger-1");

        let err = dispatcher.handle(&request).await.unwrap_err();

        assert!(matches!(err, DispatchError::VerificationFailed { .. }));
        assert_eq!(listener.calls(), 0);
    }

    #[tokio::test]
    async fn duplicate_trigger_id_does_not_reinvoke_listener() {
        let listener = CountingListener::new(None);
        let dispatcher = dispatcher_with(listener.clone());
        let request = command_request("secret", "/mob", "", "trigger-1");

        dispatcher.handle(&request).await.unwrap();
        let err = dispatcher.handle(&request).await.unwrap_err();

        assert!(matches!(err, DispatchError::DuplicateDelivery { .. }));
        assert_eq!(listener.calls(), 1);
    }

    #[tokio::test]
    async fn unregistered_command_is_unroutable() {
        let dispatcher = dispatcher_with(CountingListener::new(None));
        let request = command_request("secret", "/other", "", "trigger-1");

        let err = dispatcher.handle(&request).await.unwrap_err();

        match err {
            DispatchError::Unroutable { discriminator } => assert_eq!(discriminator, "/other"),
            other => panic!("expected Unroutable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn listener_response_becomes_json_output() {
        let listener =
            CountingListener::new(Some(CommandResponse::ephemeral_text("*Usage*\n* /mob")));
        let dispatcher = dispatcher_with(listener);
        let request = command_request("secret", "/mob", "help", "trigger-1");

        let output = dispatcher.handle(&request).await.unwrap().unwrap();

        let json = output.as_json().unwrap();
        assert_eq!(json["response_type"], "ephemeral");
        assert!(json["text"].as_str().unwrap().contains("Usage"));
    }

    struct FailingListener;

    #[async_trait]
    impl CommandListener for FailingListener {
        async fn run(&self, _command: SlashCommand) -> anyhow::Result<Option<CommandResponse>> {
            anyhow::bail!("listener blew up")
        }
    }

    #[tokio::test]
    async fn failing_listener_still_leaves_the_dedup_key_registered() {
        let mut dispatcher =
            CommandDispatcher::new("secret", Arc::new(InMemoryIdempotencyCache::new()));
        dispatcher.add_listener("/mob", Arc::new(FailingListener));
        let request = command_request("secret", "/mob", "", "trigger-1");

        let first = dispatcher.handle(&request).await.unwrap_err();
        assert!(matches!(first, DispatchError::Listener(_)));

        // The key was written before the listener ran, so the retry is a
        // duplicate even though the first attempt failed.
        let second = dispatcher.handle(&request).await.unwrap_err();
        assert!(matches!(second, DispatchError::DuplicateDelivery { .. }));
    }

    #[tokio::test]
    async fn empty_listener_return_becomes_empty_output() {
        let dispatcher = dispatcher_with(CountingListener::new(None));
        let request = command_request("secret", "/mob", "", "trigger-1");

        let output = dispatcher.handle(&request).await.unwrap().unwrap();

        assert_eq!(output, DispatchOutput::Empty);
    }
}
