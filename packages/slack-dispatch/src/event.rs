//! Callback-event dispatcher, with the URL-verification handshake.
//!
//! Recognizes JSON bodies whose `type` is `url_verification` or
//! `event_callback`. The handshake exists purely to prove endpoint ownership
//! to Slack: the `challenge` is echoed verbatim, with no token check and no
//! dedup.
//!
//! `event_callback` deliveries are verified and deduped by
//! `event_id + event_time`, then routed by the inner event's own `type`.
//! Duplicates are answered with an empty *success*, not an error: Slack
//! retries this delivery class until acknowledged, so a retry must look done
//! rather than alarming. This is a deliberate exception to the general
//! duplicate rule, scoped to this sub-protocol only.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::IdempotencyCache;
use crate::dispatcher::{DispatchGate, Dispatcher};
use crate::error::DispatchError;
use crate::request::{DispatchOutput, IncomingRequest};

/// Outer callback-event body, discriminated by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventEnvelope {
    #[serde(rename = "url_verification")]
    UrlVerification { challenge: String },
    #[serde(rename = "event_callback")]
    EventCallback(EventCallback),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventCallback {
    #[serde(default)]
    pub token: String,
    pub event_id: String,
    pub event_time: i64,
    /// The inner event; its `type` field is the routing discriminator.
    pub event: serde_json::Value,
    #[serde(default)]
    pub team_id: String,
}

impl EventCallback {
    fn inner_type(&self) -> Result<&str, DispatchError> {
        self.event
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| DispatchError::MalformedPayload {
                reason: format!("event_callback without inner event type. event_id: {}", self.event_id),
            })
    }
}

/// Handles one inner event type. Receives the inner event object.
#[async_trait]
pub trait EventListener: Send + Sync {
    async fn run(&self, event: serde_json::Value) -> anyhow::Result<Option<serde_json::Value>>;
}

pub struct EventDispatcher {
    gate: DispatchGate,
    listeners: HashMap<String, Arc<dyn EventListener>>,
}

impl EventDispatcher {
    pub fn new(verification_token: impl Into<String>, cache: Arc<dyn IdempotencyCache>) -> Self {
        Self {
            gate: DispatchGate::new("CallbackEvent", verification_token, cache),
            listeners: HashMap::new(),
        }
    }

    /// Register a listener for an inner event type (`message`,
    /// `app_mention`, ...). Last registration wins.
    pub fn add_listener(&mut self, event_type: impl Into<String>, listener: Arc<dyn EventListener>) {
        self.listeners.insert(event_type.into(), listener);
    }
}

#[async_trait]
impl Dispatcher for EventDispatcher {
    async fn handle(
        &self,
        request: &IncomingRequest,
    ) -> Result<Option<DispatchOutput>, DispatchError> {
        let Some(body) = request.body.as_deref() else {
            return Ok(None);
        };

        // A body that is not one of the two known envelope types belongs to
        // nobody; let the composite report no match.
        let Ok(envelope) = serde_json::from_str::<EventEnvelope>(body) else {
            return Ok(None);
        };

        match envelope {
            EventEnvelope::UrlVerification { challenge } => {
                // Handshake: no verification, no dedup, echo and done.
                Ok(Some(DispatchOutput::Json(
                    serde_json::json!({ "challenge": challenge }),
                )))
            }
            EventEnvelope::EventCallback(callback) => {
                self.gate.verify(Some(&callback.token))?;

                let dedup_id = format!("{}{}", callback.event_id, callback.event_time);
                match self.gate.check_duplicate(&dedup_id).await {
                    Ok(()) => {}
                    Err(DispatchError::DuplicateDelivery { key }) => {
                        // Acknowledge the retry as done; Slack must not keep
                        // re-sending it.
                        debug!(key = %key, "duplicate event acknowledged with empty success");
                        return Ok(Some(DispatchOutput::Empty));
                    }
                    Err(other) => return Err(other),
                }

                let inner_type = callback.inner_type()?;
                let listener = self.listeners.get(inner_type).ok_or_else(|| {
                    DispatchError::Unroutable {
                        discriminator: inner_type.to_string(),
                    }
                })?;

                let response = listener
                    .run(callback.event)
                    .await
                    .map_err(DispatchError::Listener)?;

                DispatchOutput::from_response(response).map(Some)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::cache::InMemoryIdempotencyCache;
    use crate::testing::event_request;

    struct Recorder {
        calls: AtomicUsize,
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EventListener for Recorder {
        async fn run(&self, _event: serde_json::Value) -> anyhow::Result<Option<serde_json::Value>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(json!({"handled": true})))
        }
    }

    fn dispatcher() -> EventDispatcher {
        EventDispatcher::new("secret", Arc::new(InMemoryIdempotencyCache::new()))
    }

    fn callback_body(event_id: &str, event_time: i64) -> serde_json::Value {
        json!({
            "type": "event_callback",
            "token": "secret",
            "event_id": event_id,
            "event_time": event_time,
            "event": { "type": "app_mention", "text": "<@BOT> hello" }
        })
    }

    #[tokio::test]
    async fn url_verification_echoes_challenge_without_token() {
        let dispatcher = dispatcher();
        // Deliberately no token field at all.
        let request = event_request(&json!({
            "type": "url_verification",
            "challenge": "3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P"
        }));

        let output = dispatcher.handle(&request).await.unwrap().unwrap();

        assert_eq!(
            output.as_json().unwrap()["challenge"],
            "3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P"
        );
    }

    #[tokio::test]
    async fn event_callback_routes_by_inner_type() {
        let mut dispatcher = dispatcher();
        let listener = Recorder::new();
        dispatcher.add_listener("app_mention", listener.clone());

        let request = event_request(&callback_body("Ev1", 1595050566));
        let output = dispatcher.handle(&request).await.unwrap().unwrap();

        assert_eq!(listener.calls(), 1);
        assert_eq!(output.as_json().unwrap()["handled"], true);
    }

    #[tokio::test]
    async fn duplicate_event_returns_empty_success() {
        let mut dispatcher = dispatcher();
        let listener = Recorder::new();
        dispatcher.add_listener("app_mention", listener.clone());

        let request = event_request(&callback_body("Ev1", 1595050566));
        dispatcher.handle(&request).await.unwrap();
        let output = dispatcher.handle(&request).await.unwrap().unwrap();

        assert_eq!(output, DispatchOutput::Empty);
        assert_eq!(listener.calls(), 1);
    }

    #[tokio::test]
    async fn same_event_id_at_different_time_is_not_a_duplicate() {
        let mut dispatcher = dispatcher();
        let listener = Recorder::new();
        dispatcher.add_listener("app_mention", listener.clone());

        dispatcher
            .handle(&event_request(&callback_body("Ev1", 1595050566)))
            .await
            .unwrap();
        dispatcher
            .handle(&event_request(&callback_body("Ev1", 1595050567)))
            .await
            .unwrap();

        assert_eq!(listener.calls(), 2);
    }

    #[tokio::test]
    async fn forged_token_fails_before_listener_runs() {
        let mut dispatcher = dispatcher();
        let listener = Recorder::new();
        dispatcher.add_listener("app_mention", listener.clone());

        let mut body = callback_body("Ev1", 1595050566);
        body["token"] = json!("forged");
        let err = dispatcher.handle(&event_request(&body)).await.unwrap_err();

        assert!(matches!(err, DispatchError::VerificationFailed { .. }));
        assert_eq!(listener.calls(), 0);
    }

    #[tokio::test]
    async fn unknown_inner_type_is_unroutable() {
        let dispatcher = dispatcher();
        let request = event_request(&callback_body("Ev1", 1595050566));

        let err = dispatcher.handle(&request).await.unwrap_err();

        assert!(matches!(err, DispatchError::Unroutable { .. }));
    }

    #[tokio::test]
    async fn unrelated_json_body_is_not_performed() {
        let dispatcher = dispatcher();
        let request = event_request(&json!({ "type": "something_else" }));

        assert!(dispatcher.handle(&request).await.unwrap().is_none());
    }
}
