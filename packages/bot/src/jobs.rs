//! In-process job execution on the tokio runtime.
//!
//! `TokioJobQueue` satisfies the dispatch layer's [`JobQueue`] port by
//! spawning tasks: `enqueue` runs the job immediately in the background,
//! `schedule` sleeps until the requested instant first. Jobs carry their
//! whole context in the payload, so a restart simply loses pending timers
//! and the fallback messages scheduled through Slack itself take over.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use slack_dispatch::JobQueue;

/// A named background job. Implementations are registered on the
/// [`JobRunner`] under the job type they answer to.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn run(&self, payload: serde_json::Value) -> Result<()>;
}

/// Registry mapping job types to handlers.
#[derive(Default)]
pub struct JobRunner {
    handlers: DashMap<String, Arc<dyn JobHandler>>,
}

impl JobRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, job_type: impl Into<String>, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(job_type.into(), handler);
    }

    /// Run one job to completion. Unknown types and handler failures are
    /// logged rather than propagated - there is no caller left to notify.
    pub async fn run(&self, job_type: &str, payload: serde_json::Value) {
        let handler = match self.handlers.get(job_type) {
            Some(entry) => entry.value().clone(),
            None => {
                tracing::error!(job_type, "no handler registered for job");
                return;
            }
        };

        if let Err(error) = handler.run(payload).await {
            tracing::error!(job_type, ?error, "job failed");
        }
    }
}

/// [`JobQueue`] backed by `tokio::spawn`.
pub struct TokioJobQueue {
    runner: Arc<JobRunner>,
}

impl TokioJobQueue {
    pub fn new(runner: Arc<JobRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl JobQueue for TokioJobQueue {
    async fn enqueue(&self, job_type: &str, payload: serde_json::Value) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let runner = self.runner.clone();
        let job_type = job_type.to_string();
        tokio::spawn(async move {
            runner.run(&job_type, payload).await;
        });
        Ok(id)
    }

    async fn schedule(
        &self,
        job_type: &str,
        payload: serde_json::Value,
        run_at: DateTime<Utc>,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let runner = self.runner.clone();
        let job_type = job_type.to_string();
        let delay = (run_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            runner.run(&job_type, payload).await;
        });
        Ok(id)
    }
}

/// Catch-all job that records a dispatch failure out of the request path.
pub struct AsyncLoggingHandler;

#[async_trait]
impl JobHandler for AsyncLoggingHandler {
    async fn run(&self, payload: serde_json::Value) -> Result<()> {
        tracing::error!(%payload, "request failed");
        Ok(())
    }
}
