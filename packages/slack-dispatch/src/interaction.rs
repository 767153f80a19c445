//! Interaction (UI payload) dispatcher.
//!
//! Recognizes requests carrying a `payload` form field: a JSON envelope with
//! a closed set of `type` values. The envelope decodes once, at the boundary,
//! into a tagged union - an unknown type is a hard error, not a fall-through.
//!
//! Routing is two-level for `block_actions`: the first action's own subtype
//! (`button`, `static_select`, `multi_users_select`, ...) is tried before the
//! envelope type, so one dispatcher can multiplex many interactive controls.
//!
//! Dedup keys follow the envelope: `trigger_id` for `block_actions` and
//! `message_actions`, the view `hash` for `view_submission`, and nothing for
//! `view_closed` (always safe to re-deliver). Duplicates here are hard errors
//! - the stale UI control that produced them gets no visible change.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cache::IdempotencyCache;
use crate::dispatcher::{DispatchGate, Dispatcher};
use crate::error::DispatchError;
use crate::request::{DispatchOutput, IncomingRequest};

/// The interaction envelope, discriminated by its `type` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Interaction {
    #[serde(rename = "block_actions")]
    BlockActions(BlockActions),
    #[serde(rename = "message_actions")]
    MessageActions(MessageActions),
    #[serde(rename = "view_submission")]
    ViewSubmission(ViewSubmission),
    #[serde(rename = "view_closed")]
    ViewClosed(ViewClosed),
}

impl Interaction {
    /// The envelope-type routing key (the fallback when no subtype listener
    /// matched).
    pub fn envelope_kind(&self) -> &'static str {
        match self {
            Interaction::BlockActions(_) => "block_actions",
            Interaction::MessageActions(_) => "message_actions",
            Interaction::ViewSubmission(_) => "view_submission",
            Interaction::ViewClosed(_) => "view_closed",
        }
    }

    fn token(&self) -> &str {
        match self {
            Interaction::BlockActions(p) => &p.token,
            Interaction::MessageActions(p) => &p.token,
            Interaction::ViewSubmission(p) => &p.token,
            Interaction::ViewClosed(p) => &p.token,
        }
    }

    /// The delivery-specific dedup id, when this envelope type has one.
    fn dedup_id(&self) -> Option<&str> {
        match self {
            Interaction::BlockActions(p) => Some(p.trigger_id.as_str()),
            Interaction::MessageActions(p) => Some(p.trigger_id.as_str()),
            Interaction::ViewSubmission(p) => Some(p.view.hash.as_str()),
            // view_closed is always safe to re-deliver.
            Interaction::ViewClosed(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockActions {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub trigger_id: String,
    #[serde(default)]
    pub response_url: String,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageActions {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub trigger_id: String,
    #[serde(default)]
    pub callback_id: String,
    #[serde(default)]
    pub response_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewSubmission {
    #[serde(default)]
    pub token: String,
    pub view: View,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewClosed {
    #[serde(default)]
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<View>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct View {
    #[serde(default)]
    pub id: String,
    /// Session hash - the dedup key for view submissions.
    #[serde(default)]
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub username: String,
}

/// The message the pressed control lived in, as Slack echoes it back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks: Option<serde_json::Value>,
}

/// One element of a `block_actions` envelope's action list, discriminated by
/// the control kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    #[serde(rename = "button")]
    Button(ButtonAction),
    #[serde(rename = "static_select")]
    StaticSelect(StaticSelectAction),
    #[serde(rename = "multi_users_select")]
    MultiUsersSelect(MultiUsersSelectAction),
    /// Control kinds this bot registers no listener for.
    #[serde(other)]
    Other,
}

impl Action {
    /// The subtype routing key, tried before the envelope type.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Button(_) => "button",
            Action::StaticSelect(_) => "static_select",
            Action::MultiUsersSelect(_) => "multi_users_select",
            Action::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ButtonAction {
    pub action_id: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub action_ts: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticSelectAction {
    pub action_id: String,
    pub selected_option: SelectedOption,
    #[serde(default)]
    pub action_ts: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedOption {
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiUsersSelectAction {
    pub action_id: String,
    #[serde(default)]
    pub selected_users: Vec<String>,
    #[serde(default)]
    pub action_ts: String,
}

/// Handles an interaction envelope.
#[async_trait]
pub trait InteractionListener: Send + Sync {
    async fn run(&self, interaction: Interaction) -> anyhow::Result<Option<serde_json::Value>>;
}

pub struct InteractionDispatcher {
    gate: DispatchGate,
    listeners: HashMap<String, Arc<dyn InteractionListener>>,
}

impl InteractionDispatcher {
    pub fn new(verification_token: impl Into<String>, cache: Arc<dyn IdempotencyCache>) -> Self {
        Self {
            gate: DispatchGate::new("Interaction", verification_token, cache),
            listeners: HashMap::new(),
        }
    }

    /// Register a listener keyed either by an envelope type (`block_actions`,
    /// `view_submission`, ...) or by an action subtype (`button`,
    /// `static_select`, `multi_users_select`). Subtype keys take priority for
    /// `block_actions` envelopes. Last registration wins.
    pub fn add_listener(&mut self, key: impl Into<String>, listener: Arc<dyn InteractionListener>) {
        self.listeners.insert(key.into(), listener);
    }

    fn resolve(&self, interaction: &Interaction) -> Option<&Arc<dyn InteractionListener>> {
        if let Interaction::BlockActions(block_actions) = interaction {
            if let Some(first) = block_actions.actions.first() {
                if let Some(listener) = self.listeners.get(first.kind()) {
                    return Some(listener);
                }
            }
        }
        self.listeners.get(interaction.envelope_kind())
    }
}

#[async_trait]
impl Dispatcher for InteractionDispatcher {
    async fn handle(
        &self,
        request: &IncomingRequest,
    ) -> Result<Option<DispatchOutput>, DispatchError> {
        let Some(payload) = request.param("payload") else {
            return Ok(None);
        };

        // Unknown envelope types fail hard here: a `payload` field claims
        // this protocol, so there is no next dispatcher to fall through to.
        let interaction: Interaction =
            serde_json::from_str(payload).map_err(|e| DispatchError::MalformedPayload {
                reason: format!("interaction envelope: {e}"),
            })?;

        self.gate.verify(Some(interaction.token()))?;

        if let Some(id) = interaction.dedup_id() {
            self.gate.check_duplicate(id).await?;
        }

        let listener =
            self.resolve(&interaction)
                .ok_or_else(|| DispatchError::Unroutable {
                    discriminator: interaction.envelope_kind().to_string(),
                })?;

        let response = listener
            .run(interaction)
            .await
            .map_err(DispatchError::Listener)?;

        DispatchOutput::from_response(response).map(Some)
    }
}
