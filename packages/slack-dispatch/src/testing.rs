//! Test fixtures: request builders and recording fakes.
//!
//! Kept as a public module (not behind `cfg(test)`) so downstream crates can
//! drive the dispatch layer in their own tests with the same fixtures.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::jobs::JobQueue;
use crate::request::IncomingRequest;

/// A slash-command delivery as the form parameters Slack sends.
pub fn command_request(token: &str, command: &str, text: &str, trigger_id: &str) -> IncomingRequest {
    let mut params = HashMap::new();
    params.insert("token".to_string(), token.to_string());
    params.insert("command".to_string(), command.to_string());
    params.insert("text".to_string(), text.to_string());
    params.insert("user_id".to_string(), "UH5FQ4JMD".to_string());
    params.insert("user_name".to_string(), "mob-tester".to_string());
    params.insert("channel_id".to_string(), "C2147483705".to_string());
    params.insert("trigger_id".to_string(), trigger_id.to_string());
    params.insert(
        "response_url".to_string(),
        "https://hooks.slack.test/commands/response".to_string(),
    );
    IncomingRequest::from_params(params)
}

/// An interaction delivery: the envelope rides in the `payload` form field as
/// a JSON string.
pub fn interaction_request(payload: &serde_json::Value) -> IncomingRequest {
    let mut params = HashMap::new();
    params.insert("payload".to_string(), payload.to_string());
    IncomingRequest::from_params(params)
}

/// A callback-event delivery: raw JSON body.
pub fn event_request(body: &serde_json::Value) -> IncomingRequest {
    IncomingRequest::from_body(body.to_string())
}

/// One job captured by [`RecordingJobQueue`].
#[derive(Debug, Clone)]
pub struct RecordedJob {
    pub id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    /// `None` for immediate enqueues.
    pub run_at: Option<DateTime<Utc>>,
}

/// A job queue that records every call instead of executing anything.
#[derive(Default)]
pub struct RecordingJobQueue {
    jobs: Mutex<Vec<RecordedJob>>,
}

impl RecordingJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<RecordedJob> {
        self.jobs.lock().unwrap().clone()
    }

    pub fn scheduled(&self) -> Vec<RecordedJob> {
        self.recorded()
            .into_iter()
            .filter(|job| job.run_at.is_some())
            .collect()
    }

    pub fn of_type(&self, job_type: &str) -> Vec<RecordedJob> {
        self.recorded()
            .into_iter()
            .filter(|job| job.job_type == job_type)
            .collect()
    }
}

#[async_trait]
impl JobQueue for RecordingJobQueue {
    async fn enqueue(&self, job_type: &str, payload: serde_json::Value) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.jobs.lock().unwrap().push(RecordedJob {
            id,
            job_type: job_type.to_string(),
            payload,
            run_at: None,
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
        self.jobs.lock().unwrap().push(RecordedJob {
            id,
            job_type: job_type.to_string(),
            payload,
            run_at: Some(run_at),
        });
        Ok(id)
    }
}
