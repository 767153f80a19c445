//! Shared dependency container handed to every listener and job handler.

use std::sync::Arc;

use slack_dispatch::{CredentialStore, IdempotencyCache, JobQueue};

use crate::config::Config;
use crate::slack::{ResponseUrl, SlackApi};

/// Everything the workflow needs to talk to the outside world.
///
/// Listeners hold an `Arc<Deps>` and reach through it instead of owning
/// clients directly, so tests can swap in recording fakes wholesale.
pub struct Deps {
    pub slack: Arc<dyn SlackApi>,
    pub response_url: Arc<dyn ResponseUrl>,
    pub jobs: Arc<dyn JobQueue>,
    pub cache: Arc<dyn IdempotencyCache>,
    pub credentials: Arc<dyn CredentialStore>,
    pub config: Config,
}
