//! # slack-dispatch
//!
//! A dispatch layer for Slack webhook deliveries: one HTTP endpoint receives
//! slash commands, interactive payloads, and callback events, and this crate
//! decides which shape arrived, verifies it, guards against re-delivery, and
//! routes it to a registered listener.
//!
//! ## Architecture
//!
//! ```text
//! IncomingRequest (form params + raw body)
//!     │
//!     ▼
//! CompositeDispatcher
//!     │ fixed order, first recognized shape wins
//!     ├─► CommandDispatcher      (params["command"] present)
//!     ├─► InteractionDispatcher  (params["payload"] present)
//!     └─► EventDispatcher        (JSON body with a known "type")
//!             │
//!             ▼
//!     DispatchGate: verify token ─► dedup check ─► listener lookup
//!             │
//!             ▼
//!     listener runs, return value becomes DispatchOutput
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Verification before anything** - a bad token never reaches a listener
//! 2. **Dedup before invocation** - the idempotency key is registered *before*
//!    the listener runs, so a slow handler cannot let a retry race in
//! 3. **At-most-once within the TTL window** - re-presenting the same dedup
//!    key within 60 seconds never re-invokes business logic
//! 4. **Listener errors propagate unmodified** - no local swallowing
//!
//! ## Guarantees and non-guarantees
//!
//! - The dedup window is bounded by the cache TTL; this is best-effort
//!   idempotency, not exactly-once across restarts
//! - A single shared [`IdempotencyCache`] is assumed to back all instances
//!
//! ## The one deliberate asymmetry
//!
//! `event_callback` duplicates are acknowledged with an empty success instead
//! of an error, because Slack retries that delivery class and a retry must be
//! answered as done. Command and interaction duplicates stay hard errors.

pub mod cache;
pub mod command;
pub mod composite;
pub mod credentials;
pub mod dispatcher;
pub mod event;
pub mod interaction;
pub mod jobs;
pub mod request;
pub mod testing;

mod error;

pub use cache::{IdempotencyCache, InMemoryIdempotencyCache};
pub use command::{
    CommandDispatcher, CommandListener, CommandResponse, ResponseType, SlashCommand,
};
pub use composite::CompositeDispatcher;
pub use credentials::{CredentialStore, InMemoryCredentialStore};
pub use dispatcher::{DispatchGate, Dispatcher, DEDUP_TTL};
pub use error::DispatchError;
pub use event::{EventCallback, EventDispatcher, EventEnvelope, EventListener};
pub use interaction::{
    Action, BlockActions, Interaction, InteractionDispatcher, InteractionListener,
};
pub use jobs::{JobQueue, NoOpJobQueue};
pub use request::{DispatchOutput, IncomingRequest};
