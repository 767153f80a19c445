//! The single entrypoint: tries each protocol dispatcher in fixed order.
//!
//! The three shapes are mutually exclusive by field presence, so in practice
//! exactly one matches; the fixed order just makes dispatch deterministic.
//! A request matching none of them is a [`DispatchError::NoMatchingDispatcher`].

use std::sync::Arc;

use crate::cache::IdempotencyCache;
use crate::command::{CommandDispatcher, CommandListener};
use crate::dispatcher::Dispatcher;
use crate::error::DispatchError;
use crate::event::{EventDispatcher, EventListener};
use crate::interaction::{InteractionDispatcher, InteractionListener};
use crate::request::{DispatchOutput, IncomingRequest};

pub struct CompositeDispatcher {
    command: CommandDispatcher,
    interaction: InteractionDispatcher,
    event: EventDispatcher,
}

impl CompositeDispatcher {
    /// All three dispatchers share the verification token and the
    /// idempotency cache; their dedup key prefixes keep them partitioned.
    pub fn new(verification_token: &str, cache: Arc<dyn IdempotencyCache>) -> Self {
        Self {
            command: CommandDispatcher::new(verification_token, cache.clone()),
            interaction: InteractionDispatcher::new(verification_token, cache.clone()),
            event: EventDispatcher::new(verification_token, cache),
        }
    }

    pub fn add_command_listener(
        &mut self,
        command: impl Into<String>,
        listener: Arc<dyn CommandListener>,
    ) {
        self.command.add_listener(command, listener);
    }

    pub fn add_interactivity_listener(
        &mut self,
        key: impl Into<String>,
        listener: Arc<dyn InteractionListener>,
    ) {
        self.interaction.add_listener(key, listener);
    }

    pub fn add_callback_event_listener(
        &mut self,
        event_type: impl Into<String>,
        listener: Arc<dyn EventListener>,
    ) {
        self.event.add_listener(event_type, listener);
    }

    /// Route one delivery to the first dispatcher that recognizes it.
    pub async fn handle(
        &self,
        request: &IncomingRequest,
    ) -> Result<DispatchOutput, DispatchError> {
        if let Some(output) = self.command.handle(request).await? {
            return Ok(output);
        }

        if let Some(output) = self.interaction.handle(request).await? {
            return Ok(output);
        }

        if let Some(output) = self.event.handle(request).await? {
            return Ok(output);
        }

        Err(DispatchError::NoMatchingDispatcher)
    }
}
