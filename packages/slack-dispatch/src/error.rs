//! Structured error taxonomy for the dispatch layer.
//!
//! Every failure a dispatcher can produce is a pattern-matchable variant, so
//! the transport edge can map each one to a status code and the tests can
//! assert on exact failure modes instead of string matching.
//!
//! # Propagation policy
//!
//! Dispatchers never retry or recover locally. Errors bubble to the caller,
//! which is expected to log them off the response path and report failure to
//! the transport. Listener failures cross the boundary unmodified, wrapped in
//! [`DispatchError::Listener`] purely so they stay distinguishable from
//! protocol-level failures.

use thiserror::Error;

/// Failures produced while recognizing, verifying, and routing a delivery.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request-supplied token did not exactly match the configured
    /// verification token. Always fatal to the request, never retried.
    #[error("invalid verification token. token: {token:?}")]
    VerificationFailed { token: Option<String> },

    /// The dedup key was already registered within the TTL window.
    ///
    /// Hard error for commands and interactions. `event_callback` duplicates
    /// never surface this variant - the event dispatcher answers them with an
    /// empty success instead.
    #[error("duplicate delivery. key: {key}")]
    DuplicateDelivery { key: String },

    /// The request matched a dispatcher but no listener is registered for its
    /// discriminator.
    #[error("no listener registered for: {discriminator}")]
    Unroutable { discriminator: String },

    /// The body matched none of the three recognized shapes.
    #[error("no dispatcher recognized the request")]
    NoMatchingDispatcher,

    /// A recognized shape failed to decode (including an unknown interaction
    /// envelope type, which is a hard error by design).
    #[error("malformed payload: {reason}")]
    MalformedPayload { reason: String },

    /// A listener returned an error. Propagated unmodified.
    #[error("listener failed: {0}")]
    Listener(#[source] anyhow::Error),

    /// The idempotency cache round-trip failed.
    #[error("idempotency cache failure: {0}")]
    Cache(#[source] anyhow::Error),
}

impl DispatchError {
    /// Whether this failure is a protocol-level rejection (as opposed to a
    /// business-logic or infrastructure failure).
    pub fn is_protocol_error(&self) -> bool {
        !matches!(
            self,
            DispatchError::Listener(_) | DispatchError::Cache(_)
        )
    }
}
