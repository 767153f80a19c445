//! Rotation state, serialized into the UI controls that carry it.
//!
//! `TurnState` is never stored server-side: every transition decodes it from
//! the clicked control's `value`, derives a fresh copy, and embeds it in the
//! next control(s) it emits. All mutation is copy-on-write - the users list is
//! never aliased across transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Turn lengths offered in the time-selection screen, in minutes.
pub const TURN_OPTION_MINUTES: [i64; 5] = [10, 15, 20, 25, 30];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnState {
    /// Participant identifiers, in rotation order. Non-empty.
    pub users: Vec<String>,
    /// Per-turn duration in minutes.
    pub minutes: i64,
    /// Completed-turn counter. `driver = users[times % len]`.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub times: u32,
    /// Absolute deadline of the running turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_at: Option<DateTime<Utc>>,
    /// Seconds left on the clock, captured only while paused.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<i64>,
    /// Id of the scheduled fallback completion message, while one is pending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_message_id: Option<String>,
    /// When continuous mobbing began; the break-ceiling reference point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl TurnState {
    pub fn new(users: Vec<String>, minutes: i64) -> Self {
        Self {
            users,
            minutes,
            times: 0,
            finish_at: None,
            remaining_seconds: None,
            scheduled_message_id: None,
            start_time: None,
        }
    }

    /// Serialize into the token embedded in a UI control's `value`.
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Reconstruct from a UI control's `value`.
    pub fn decode(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn driver(&self) -> &str {
        &self.users[self.times as usize % self.users.len()]
    }

    pub fn navigator(&self) -> &str {
        &self.users[(self.times as usize + 1) % self.users.len()]
    }

    /// The user whose turn number is `turn` (for thank-you lines).
    pub fn user_at(&self, turn: u32) -> &str {
        &self.users[turn as usize % self.users.len()]
    }

    /// A copy with the rotation counter advanced by one.
    pub fn advanced(&self) -> Self {
        let mut next = self.clone();
        next.times += 1;
        next
    }

    pub fn is_current_driver(&self, user_id: &str, user_name: &str) -> bool {
        let driver = self.driver();
        driver == user_id || (!user_name.is_empty() && driver == user_name)
    }
}

/// Deterministic reordering used when a non-current user takes over the
/// active turn.
///
/// If the acting user is already in the list (matched by id, falling back to
/// display name), they swap places with whoever holds the current turn. If
/// absent, they are inserted at the current index and everyone after shifts
/// right.
pub fn change_order(
    users: &[String],
    current_index: usize,
    acting_id: &str,
    acting_name: &str,
) -> Vec<String> {
    let swap_index = users
        .iter()
        .position(|u| u == acting_id)
        .or_else(|| {
            if acting_name.is_empty() {
                None
            } else {
                users.iter().position(|u| u == acting_name)
            }
        });

    let mut reordered = users.to_vec();
    match swap_index {
        Some(index) => reordered.swap(current_index, index),
        None => reordered.insert(current_index, acting_id.to_string()),
    }
    reordered
}

/// Turn-number label: 1st, 2nd, 3rd, 4th, ...
pub fn ordinal(times: u32) -> String {
    match times {
        0 => "1st".to_string(),
        1 => "2nd".to_string(),
        2 => "3rd".to_string(),
        n => format!("{}th", n + 1),
    }
}

pub fn mention(user: &str) -> String {
    format!("<@{user}>")
}

pub fn mention_list(users: &[String]) -> String {
    users
        .iter()
        .map(|u| mention(u))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Value carried by the takeover prompt's buttons: the untouched state plus
/// who asked to take over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TakeoverValue {
    pub state: TurnState,
    pub actor_id: String,
    #[serde(default)]
    pub actor_name: String,
}

impl TakeoverValue {
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn decode(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}
