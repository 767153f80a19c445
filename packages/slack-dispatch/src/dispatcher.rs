//! The `Dispatcher` trait and the shared verification/idempotency gate.
//!
//! Each protocol (slash command, interaction, callback event) gets its own
//! dispatcher struct holding its own typed listener registry; what they share
//! is not a base class but a [`DispatchGate`] - the token check and the dedup
//! check, in that order, both strictly before any listener runs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::cache::IdempotencyCache;
use crate::error::DispatchError;
use crate::request::{DispatchOutput, IncomingRequest};

/// How long a dedup key stays registered. Bounds the duplicate-detection
/// window; re-delivery after expiry is processed again (best-effort
/// idempotency, by contract).
pub const DEDUP_TTL: Duration = Duration::from_secs(60);

/// One protocol's recognizer and performer.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Try to perform the request.
    ///
    /// Returns `Ok(None)` when the request does not match this dispatcher's
    /// shape, so the caller can try the next one. Every other outcome means
    /// the request was claimed: `Ok(Some(output))` on success, `Err` on any
    /// verification/routing/listener failure.
    async fn handle(
        &self,
        request: &IncomingRequest,
    ) -> Result<Option<DispatchOutput>, DispatchError>;
}

/// Verification token check + idempotency gate, shared by all dispatchers.
pub struct DispatchGate {
    /// Dedup key prefix, one per protocol (`SlashCommand`, `Interaction`,
    /// `CallbackEvent`).
    kind: &'static str,
    verification_token: String,
    cache: Arc<dyn IdempotencyCache>,
}

impl DispatchGate {
    pub fn new(
        kind: &'static str,
        verification_token: impl Into<String>,
        cache: Arc<dyn IdempotencyCache>,
    ) -> Self {
        Self {
            kind,
            verification_token: verification_token.into(),
            cache,
        }
    }

    /// Exact-equality token check. Mismatch is always fatal to the request.
    pub fn verify(&self, token: Option<&str>) -> Result<(), DispatchError> {
        match token {
            Some(supplied) if supplied == self.verification_token => Ok(()),
            _ => {
                warn!(kind = self.kind, "verification token mismatch");
                Err(DispatchError::VerificationFailed {
                    token: token.map(str::to_string),
                })
            }
        }
    }

    /// Register `natural_id` for this delivery, failing if it was already
    /// seen within the TTL window.
    ///
    /// The key is written *before* the caller invokes business logic, so a
    /// retry arriving while a slow listener is still running is rejected.
    pub async fn check_duplicate(&self, natural_id: &str) -> Result<(), DispatchError> {
        let key = format!("{}#{}", self.kind, natural_id);

        match self.cache.get(&key).await.map_err(DispatchError::Cache)? {
            Some(_) => {
                warn!(key = %key, "duplicate delivery detected");
                Err(DispatchError::DuplicateDelivery { key })
            }
            None => {
                self.cache
                    .put(&key, "proceeded", DEDUP_TTL)
                    .await
                    .map_err(DispatchError::Cache)?;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryIdempotencyCache;

    fn gate() -> DispatchGate {
        DispatchGate::new(
            "TestKind",
            "secret",
            Arc::new(InMemoryIdempotencyCache::new()),
        )
    }

    #[test]
    fn matching_token_passes() {
        assert!(gate().verify(Some("secret")).is_ok());
    }

    #[test]
    fn wrong_or_missing_token_fails() {
        assert!(matches!(
            gate().verify(Some("forged")),
            Err(DispatchError::VerificationFailed { .. })
        ));
        assert!(matches!(
            gate().verify(None),
            Err(DispatchError::VerificationFailed { token: None })
        ));
    }

    #[tokio::test]
    async fn second_presentation_of_same_id_is_rejected() {
        let gate = gate();

        gate.check_duplicate("trigger-1").await.unwrap();
        let err = gate.check_duplicate("trigger-1").await.unwrap_err();

        match err {
            DispatchError::DuplicateDelivery { key } => {
                assert_eq!(key, "TestKind#trigger-1");
            }
            other => panic!("expected DuplicateDelivery, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn distinct_ids_pass_independently() {
        let gate = gate();

        gate.check_duplicate("a").await.unwrap();
        gate.check_duplicate("b").await.unwrap();
    }

    #[tokio::test]
    async fn kinds_partition_the_key_space() {
        let cache: Arc<dyn IdempotencyCache> = Arc::new(InMemoryIdempotencyCache::new());
        let command = DispatchGate::new("SlashCommand", "secret", cache.clone());
        let event = DispatchGate::new("CallbackEvent", "secret", cache);

        command.check_duplicate("same-id").await.unwrap();
        // Same natural id under a different kind is a different key.
        event.check_duplicate("same-id").await.unwrap();
    }
}
