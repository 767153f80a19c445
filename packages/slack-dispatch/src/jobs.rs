//! Delayed-job queue port.
//!
//! Workflow listeners arrange future re-entry into business logic by handing a
//! job type and a serialized payload to this queue. The fired job is an
//! independent invocation with no shared memory - whatever state it needs
//! rides in the payload.
//!
//! The port owns interfaces only. Execution policy (timers, persistence,
//! retries) belongs to the implementation; the dispatch layer itself never
//! retries a schedule call.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Queue for background and scheduled job execution.
#[async_trait]
pub trait JobQueue: Send + Sync + 'static {
    /// Enqueue a job for immediate background execution.
    ///
    /// Returns the id of the enqueued job.
    async fn enqueue(&self, job_type: &str, payload: serde_json::Value) -> Result<Uuid>;

    /// Schedule a job to run once at or after `run_at`.
    ///
    /// Returns the id of the scheduled job.
    async fn schedule(
        &self,
        job_type: &str,
        payload: serde_json::Value,
        run_at: DateTime<Utc>,
    ) -> Result<Uuid>;
}

/// A job queue that rejects everything.
///
/// Use this when background and scheduled execution are not configured.
pub struct NoOpJobQueue;

#[async_trait]
impl JobQueue for NoOpJobQueue {
    async fn enqueue(&self, _job_type: &str, _payload: serde_json::Value) -> Result<Uuid> {
        Err(anyhow!("background jobs not supported: no job queue configured"))
    }

    async fn schedule(
        &self,
        _job_type: &str,
        _payload: serde_json::Value,
        _run_at: DateTime<Utc>,
    ) -> Result<Uuid> {
        Err(anyhow!("scheduled jobs not supported: no job queue configured"))
    }
}
