//! Recording fakes for workflow tests.
//!
//! Same pattern as the dispatch crate's testing module: every fake captures
//! the calls it receives so assertions read off recorded values instead of
//! poking at wire traffic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use slack_dispatch::testing::RecordingJobQueue;
use slack_dispatch::InMemoryCredentialStore;
use slack_dispatch::InMemoryIdempotencyCache;

use crate::config::Config;
use crate::deps::Deps;
use crate::slack::{InteractionResponse, ResponseUrl, SlackApi, SlackApiError};

#[derive(Debug, Clone, PartialEq)]
pub struct PostedMessage {
    pub channel: String,
    pub text: String,
    pub blocks: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledMessage {
    pub channel: String,
    pub post_at: DateTime<Utc>,
    pub blocks: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdatedMessage {
    pub channel: String,
    pub ts: String,
    pub blocks: serde_json::Value,
}

/// Web API fake. Records every call; `fail_delete_scheduled` simulates the
/// race where the scheduled fallback has already fired.
#[derive(Default)]
pub struct RecordingSlack {
    pub posted: Mutex<Vec<PostedMessage>>,
    pub scheduled: Mutex<Vec<ScheduledMessage>>,
    pub deleted_scheduled: Mutex<Vec<String>>,
    pub updated: Mutex<Vec<UpdatedMessage>>,
    pub history: Mutex<Vec<serde_json::Value>>,
    pub fail_delete_scheduled: AtomicBool,
}

impl RecordingSlack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_delete_scheduled(&self) {
        self.fail_delete_scheduled.store(true, Ordering::SeqCst);
    }

    pub fn set_history(&self, messages: Vec<serde_json::Value>) {
        *self.history.lock().unwrap() = messages;
    }

    pub fn posted(&self) -> Vec<PostedMessage> {
        self.posted.lock().unwrap().clone()
    }

    pub fn scheduled(&self) -> Vec<ScheduledMessage> {
        self.scheduled.lock().unwrap().clone()
    }

    pub fn updated(&self) -> Vec<UpdatedMessage> {
        self.updated.lock().unwrap().clone()
    }
}

#[async_trait]
impl SlackApi for RecordingSlack {
    async fn chat_post_message(
        &self,
        channel: &str,
        text: &str,
        blocks: Option<serde_json::Value>,
    ) -> Result<String, SlackApiError> {
        let mut posted = self.posted.lock().unwrap();
        posted.push(PostedMessage {
            channel: channel.to_string(),
            text: text.to_string(),
            blocks,
        });
        Ok(format!("100{}.000000", posted.len()))
    }

    async fn chat_schedule_message(
        &self,
        channel: &str,
        post_at: DateTime<Utc>,
        blocks: serde_json::Value,
    ) -> Result<String, SlackApiError> {
        let mut scheduled = self.scheduled.lock().unwrap();
        scheduled.push(ScheduledMessage {
            channel: channel.to_string(),
            post_at,
            blocks,
        });
        Ok(format!("Q{}", scheduled.len()))
    }

    async fn chat_delete_scheduled_message(
        &self,
        _channel: &str,
        scheduled_message_id: &str,
    ) -> Result<(), SlackApiError> {
        if self.fail_delete_scheduled.swap(false, Ordering::SeqCst) {
            return Err(SlackApiError::Api {
                status: 200,
                message: "invalid_scheduled_message_id".to_string(),
            });
        }
        self.deleted_scheduled
            .lock()
            .unwrap()
            .push(scheduled_message_id.to_string());
        Ok(())
    }

    async fn chat_update(
        &self,
        channel: &str,
        ts: &str,
        blocks: serde_json::Value,
    ) -> Result<(), SlackApiError> {
        self.updated.lock().unwrap().push(UpdatedMessage {
            channel: channel.to_string(),
            ts: ts.to_string(),
            blocks,
        });
        Ok(())
    }

    async fn conversations_history(
        &self,
        _channel: &str,
        _latest: &str,
        _limit: u32,
        _oldest: &str,
    ) -> Result<Vec<serde_json::Value>, SlackApiError> {
        Ok(self.history.lock().unwrap().clone())
    }
}

/// Response-url fake recording each response alongside the url it went to.
#[derive(Default)]
pub struct RecordingResponseUrl {
    pub invoked: Mutex<Vec<(String, InteractionResponse)>>,
}

impl RecordingResponseUrl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invoked(&self) -> Vec<(String, InteractionResponse)> {
        self.invoked.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResponseUrl for RecordingResponseUrl {
    async fn invoke(
        &self,
        response_url: &str,
        response: &InteractionResponse,
    ) -> Result<(), SlackApiError> {
        self.invoked
            .lock()
            .unwrap()
            .push((response_url.to_string(), response.clone()));
        Ok(())
    }
}

pub struct TestHarness {
    pub slack: Arc<RecordingSlack>,
    pub response_url: Arc<RecordingResponseUrl>,
    pub jobs: Arc<RecordingJobQueue>,
    pub deps: Arc<Deps>,
}

/// Deps wired entirely to fakes, with a config using short default timers.
pub fn test_deps() -> TestHarness {
    let slack = Arc::new(RecordingSlack::new());
    let response_url = Arc::new(RecordingResponseUrl::new());
    let jobs = Arc::new(RecordingJobQueue::new());

    let deps = Arc::new(Deps {
        slack: slack.clone(),
        response_url: response_url.clone(),
        jobs: jobs.clone(),
        cache: Arc::new(InMemoryIdempotencyCache::new()),
        credentials: Arc::new(InMemoryCredentialStore::new()),
        config: Config {
            port: 3000,
            verification_token: "test-token".to_string(),
            bot_token: "xoxb-test".to_string(),
            slash_command: "/mob".to_string(),
            count_down_minutes: 5,
            break_ceiling_minutes: 75,
        },
    });

    TestHarness {
        slack,
        response_url,
        jobs,
        deps,
    }
}
