//! The turn-rotation workflow: listeners wired into the dispatch layer.
//!
//! Every screen transition is stateless on the server side. The full
//! [`TurnState`] rides in each control's `value`, comes back with the press,
//! and a fresh copy goes out embedded in the next screen. The only timers
//! are a message scheduled through Slack itself (the end-of-turn fallback)
//! and an in-process countdown job; both carry their state in their payload.
//!
//! Key Invariants:
//! - A button press that advances the mob first disarms its own message by
//!   replacing it without the actions block, so a second press of a stale
//!   button has nothing to land on.
//! - `turn_end` only proceeds once the scheduled fallback is withdrawn. If
//!   the withdrawal fails while the deadline is still ahead, the press loses
//!   the race and the user is asked to wait; if the deadline has passed, the
//!   fallback already announced the next turn and the press is a no-op.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::seq::SliceRandom;
use serde_json::{json, Value};

use slack_dispatch::{
    Action, BlockActions, CommandListener, CommandResponse, CompositeDispatcher, Interaction,
    InteractionListener, SlashCommand,
};

use crate::deps::Deps;
use crate::jobs::JobHandler;
use crate::slack::InteractionResponse;

use super::blocks;
use super::state::{change_order, mention, TakeoverValue, TurnState};

pub const COUNT_DOWN_JOB: &str = "count_down";

/// Wire every listener into a dispatcher sharing the app's token and cache.
pub fn build_dispatcher(deps: Arc<Deps>) -> CompositeDispatcher {
    let mut dispatcher =
        CompositeDispatcher::new(&deps.config.verification_token, deps.cache.clone());
    dispatcher.add_command_listener(
        deps.config.slash_command.clone(),
        Arc::new(MobCommand { deps: deps.clone() }),
    );
    dispatcher.add_interactivity_listener(
        "multi_users_select",
        Arc::new(MembersSelected { deps: deps.clone() }),
    );
    dispatcher.add_interactivity_listener(
        "static_select",
        Arc::new(TimeSelected { deps: deps.clone() }),
    );
    dispatcher.add_interactivity_listener("button", Arc::new(ButtonPressed { deps }));
    dispatcher
}

// ============================================================================
// Slash command entry
// ============================================================================

/// `/mob` - opens the user-selection screen, or jumps straight to the
/// confirmation screen when minutes and users are given inline.
pub struct MobCommand {
    pub deps: Arc<Deps>,
}

#[async_trait]
impl CommandListener for MobCommand {
    async fn run(&self, command: SlashCommand) -> Result<Option<CommandResponse>> {
        let text = command.text.trim();

        if text.is_empty() {
            let screen = serde_json::to_value(blocks::select_users(&command.user_id))?;
            return Ok(Some(CommandResponse::in_channel_blocks(screen)));
        }

        match parse_command_text(text) {
            Some((minutes, users)) => {
                let state = TurnState::new(users, minutes);
                let screen = serde_json::to_value(blocks::confirm(&state)?)?;
                Ok(Some(CommandResponse::in_channel_blocks(screen)))
            }
            // `help` and anything unparsable both land here.
            None => Ok(Some(CommandResponse::ephemeral_text(blocks::usage_message(
                &self.deps.config.slash_command,
            )))),
        }
    }
}

/// `15 @alice @bob` -> (15, ["alice", "bob"]). Mentions arrive either bare
/// (`@name`) or escaped (`<@U123|name>`); the escaped form yields the id.
fn parse_command_text(text: &str) -> Option<(i64, Vec<String>)> {
    let mut tokens = text.split_whitespace();
    let minutes = tokens.next()?.parse::<i64>().ok().filter(|m| *m > 0)?;
    let users = tokens
        .map(parse_user_token)
        .collect::<Option<Vec<_>>>()
        .filter(|users: &Vec<String>| users.len() >= 2)?;
    Some((minutes, users))
}

fn parse_user_token(token: &str) -> Option<String> {
    if let Some(inner) = token.strip_prefix("<@").and_then(|t| t.strip_suffix('>')) {
        let id = inner.split('|').next().unwrap_or(inner);
        return Some(id.to_string());
    }
    token.strip_prefix('@').map(|name| name.to_string())
}

// ============================================================================
// Select screens
// ============================================================================

/// The `members` multi-select: replace the screen with time selection.
pub struct MembersSelected {
    pub deps: Arc<Deps>,
}

#[async_trait]
impl InteractionListener for MembersSelected {
    async fn run(&self, interaction: Interaction) -> Result<Option<Value>> {
        let Interaction::BlockActions(payload) = interaction else {
            bail!("multi_users_select outside block_actions");
        };
        let Some(Action::MultiUsersSelect(action)) = payload.actions.first() else {
            bail!("block_actions without a multi_users_select action");
        };

        let response = if action.selected_users.len() < 2 {
            InteractionResponse::text("Pick at least two users to mob.")
        } else {
            let screen = blocks::select_time(&action.selected_users)?;
            InteractionResponse::replace(serde_json::to_value(screen)?)
        };
        self.deps
            .response_url
            .invoke(&payload.response_url, &response)
            .await?;
        Ok(None)
    }
}

/// The `time` static-select: its option value already seeds the state.
pub struct TimeSelected {
    pub deps: Arc<Deps>,
}

#[async_trait]
impl InteractionListener for TimeSelected {
    async fn run(&self, interaction: Interaction) -> Result<Option<Value>> {
        let Interaction::BlockActions(payload) = interaction else {
            bail!("static_select outside block_actions");
        };
        let Some(Action::StaticSelect(action)) = payload.actions.first() else {
            bail!("block_actions without a static_select action");
        };

        let state = TurnState::decode(&action.selected_option.value)?;
        let screen = serde_json::to_value(blocks::confirm(&state)?)?;
        self.deps
            .response_url
            .invoke(&payload.response_url, &InteractionResponse::replace(screen))
            .await?;
        Ok(None)
    }
}

// ============================================================================
// Buttons
// ============================================================================

/// All button presses route here and fan out on `action_id`.
pub struct ButtonPressed {
    pub deps: Arc<Deps>,
}

#[async_trait]
impl InteractionListener for ButtonPressed {
    async fn run(&self, interaction: Interaction) -> Result<Option<Value>> {
        let Interaction::BlockActions(payload) = interaction else {
            bail!("button outside block_actions");
        };
        let Some(Action::Button(action)) = payload.actions.first() else {
            bail!("block_actions without a button action");
        };
        let action_id = action.action_id.clone();
        let value = action.value.clone();

        match action_id.as_str() {
            "cancel" => {
                self.deps
                    .response_url
                    .invoke(&payload.response_url, &InteractionResponse::delete())
                    .await?;
            }
            "shuffle" | "reshuffle" => self.shuffle(&payload, &value).await?,
            "start" | "restart" | "resume" => {
                let state = TurnState::decode(&value)?;
                self.disarm(&payload).await?;
                start_turn(&self.deps, &channel_id(&payload)?, state).await?;
            }
            "continue" => self.continue_turn(&payload, &value).await?,
            "change" | "recontinue" => self.takeover(&payload, &action_id, &value).await?,
            "turn_end" => self.turn_end(&payload, &value).await?,
            "break" => self.pause(&payload, &value).await?,
            "rested" => self.rested(&payload, &value).await?,
            "finish" => self.finish(&payload, &value).await?,
            other => bail!("unknown button action_id: {other}"),
        }
        Ok(None)
    }
}

impl ButtonPressed {
    /// Replace the pressed message without its actions block so the same
    /// buttons cannot fire twice.
    async fn disarm(&self, payload: &BlockActions) -> Result<()> {
        let Some(disarmed) = without_trailing_actions(payload) else {
            return Ok(());
        };
        self.deps
            .response_url
            .invoke(
                &payload.response_url,
                &InteractionResponse::replace(disarmed),
            )
            .await?;
        Ok(())
    }

    async fn shuffle(&self, payload: &BlockActions, value: &str) -> Result<()> {
        let mut state = TurnState::decode(value)?;
        state.users.shuffle(&mut rand::thread_rng());

        let screen = serde_json::to_value(blocks::shuffled_order(&state)?)?;
        self.deps
            .response_url
            .invoke(&payload.response_url, &InteractionResponse::replace(screen))
            .await?;
        Ok(())
    }

    /// Continue pressed on the between-turns screen. The current driver goes
    /// straight into the next turn; anyone else is offered a takeover.
    async fn continue_turn(&self, payload: &BlockActions, value: &str) -> Result<()> {
        let state = TurnState::decode(value)?;
        let (actor_id, actor_name) = actor(payload);

        if state.is_current_driver(&actor_id, &actor_name) {
            self.disarm(payload).await?;
            start_turn(&self.deps, &channel_id(payload)?, state).await?;
            return Ok(());
        }

        let takeover = TakeoverValue {
            state,
            actor_id,
            actor_name,
        };
        let prompt = serde_json::to_value(blocks::takeover_prompt(&takeover)?)?;
        self.deps
            .slack
            .chat_post_message(&channel_id(payload)?, "Change the order?", Some(prompt))
            .await?;
        Ok(())
    }

    /// Resolution of a takeover prompt: reorder or keep, then start the turn.
    async fn takeover(&self, payload: &BlockActions, action_id: &str, value: &str) -> Result<()> {
        let takeover = TakeoverValue::decode(value)?;
        let mut state = takeover.state;

        if action_id == "change" {
            let current_index = state.times as usize % state.users.len();
            state.users = change_order(
                &state.users,
                current_index,
                &takeover.actor_id,
                &takeover.actor_name,
            );
        }

        // The prompt message has served its purpose either way.
        self.deps
            .response_url
            .invoke(&payload.response_url, &InteractionResponse::delete())
            .await?;
        start_turn(&self.deps, &channel_id(payload)?, state).await?;
        Ok(())
    }

    async fn turn_end(&self, payload: &BlockActions, value: &str) -> Result<()> {
        let state = TurnState::decode(value)?;
        let channel = channel_id(payload)?;

        match cancel_fallback(&self.deps, &channel, &state).await? {
            CancelOutcome::PleaseWait => {
                self.deps
                    .response_url
                    .invoke(
                        &payload.response_url,
                        &InteractionResponse::text(blocks::please_wait_message()),
                    )
                    .await?;
                return Ok(());
            }
            // The fallback already announced the next turn.
            CancelOutcome::AlreadyFired => return Ok(()),
            CancelOutcome::Canceled => {}
        }

        self.disarm(payload).await?;
        let next = between_turns(&state);
        let ceiling = self.deps.config.break_ceiling_minutes;
        let over_ceiling = state
            .start_time
            .is_some_and(|since| Utc::now() - since >= Duration::minutes(ceiling));

        if over_ceiling {
            let screen = serde_json::to_value(blocks::break_prompt(&next, ceiling)?)?;
            self.deps
                .slack
                .chat_post_message(&channel, "Take a break!", Some(screen))
                .await?;
        } else {
            let screen = serde_json::to_value(blocks::next_turn(&next)?)?;
            let text = format!("{} is up next.", mention(next.driver()));
            self.deps
                .slack
                .chat_post_message(&channel, &text, Some(screen))
                .await?;
        }
        Ok(())
    }

    /// Break mid-turn: freeze the remaining clock in the state and show the
    /// paused screen. Loses the same race as `turn_end` if the deadline hits
    /// first.
    async fn pause(&self, payload: &BlockActions, value: &str) -> Result<()> {
        let state = TurnState::decode(value)?;
        let channel = channel_id(payload)?;

        match cancel_fallback(&self.deps, &channel, &state).await? {
            CancelOutcome::PleaseWait => {
                self.deps
                    .response_url
                    .invoke(
                        &payload.response_url,
                        &InteractionResponse::text(blocks::please_wait_message()),
                    )
                    .await?;
                return Ok(());
            }
            CancelOutcome::AlreadyFired => return Ok(()),
            CancelOutcome::Canceled => {}
        }

        let mut paused = state.clone();
        paused.remaining_seconds = Some(
            state
                .finish_at
                .map(|at| (at - Utc::now()).num_seconds().max(0))
                .unwrap_or(state.minutes * 60),
        );
        paused.finish_at = None;
        paused.scheduled_message_id = None;

        let screen = serde_json::to_value(blocks::paused(&paused)?)?;
        self.deps
            .response_url
            .invoke(&payload.response_url, &InteractionResponse::replace(screen))
            .await?;
        Ok(())
    }

    /// Rested after a break prompt: the continuous-mobbing clock restarts.
    async fn rested(&self, payload: &BlockActions, value: &str) -> Result<()> {
        let mut state = TurnState::decode(value)?;
        state.start_time = Some(Utc::now());

        let screen = serde_json::to_value(blocks::ready(&state)?)?;
        self.deps
            .response_url
            .invoke(&payload.response_url, &InteractionResponse::replace(screen))
            .await?;
        Ok(())
    }

    async fn finish(&self, payload: &BlockActions, value: &str) -> Result<()> {
        let state = TurnState::decode(value)?;
        let channel = channel_id(payload)?;

        // Withdraw the fallback if one is armed. A failure means it already
        // fired; the summary still goes out.
        if let Some(id) = &state.scheduled_message_id {
            if let Err(error) = self
                .deps
                .slack
                .chat_delete_scheduled_message(&channel, id)
                .await
            {
                tracing::debug!(?error, "scheduled fallback already gone at finish");
            }
        }

        self.disarm(payload).await?;
        self.deps
            .slack
            .chat_post_message(&channel, &blocks::finish_message(&state), None)
            .await?;
        Ok(())
    }
}

// ============================================================================
// Shared transitions
// ============================================================================

/// Start (or restart, or resume) the current driver's turn.
///
/// Arms the end-of-turn fallback first: if this process dies, Slack itself
/// posts the between-turns screen at the deadline. Only then is the running
/// screen posted and the countdown scheduled.
pub async fn start_turn(deps: &Deps, channel: &str, mut state: TurnState) -> Result<()> {
    let seconds = match state.remaining_seconds.take() {
        Some(remaining) => remaining,
        None => state.minutes * 60,
    };
    if state.start_time.is_none() {
        state.start_time = Some(Utc::now());
    }
    let finish_at = Utc::now() + Duration::seconds(seconds);
    state.finish_at = Some(finish_at);

    let fallback = serde_json::to_value(blocks::next_turn(&between_turns(&state))?)?;
    let scheduled_id = deps
        .slack
        .chat_schedule_message(channel, finish_at, fallback)
        .await?;
    state.scheduled_message_id = Some(scheduled_id);

    let screen = serde_json::to_value(blocks::running(
        &state,
        deps.config.count_down_minutes,
    )?)?;
    let text = format!("{} is driving.", mention(state.driver()));
    deps.slack
        .chat_post_message(channel, &text, Some(screen))
        .await?;

    let lead = Duration::minutes(deps.config.count_down_minutes);
    if finish_at - lead > Utc::now() {
        deps.jobs
            .schedule(
                COUNT_DOWN_JOB,
                json!({ "channel": channel, "value": state.encode()? }),
                finish_at - lead,
            )
            .await?;
    }
    Ok(())
}

/// The state embedded in any between-turns screen: rotation advanced, all
/// per-turn timer fields cleared.
fn between_turns(state: &TurnState) -> TurnState {
    let mut next = state.advanced();
    next.finish_at = None;
    next.scheduled_message_id = None;
    next.remaining_seconds = None;
    next
}

enum CancelOutcome {
    Canceled,
    /// The deadline is still ahead but the withdrawal failed: Slack is about
    /// to post the fallback and the press should wait it out.
    PleaseWait,
    AlreadyFired,
}

async fn cancel_fallback(deps: &Deps, channel: &str, state: &TurnState) -> Result<CancelOutcome> {
    let Some(id) = &state.scheduled_message_id else {
        return Ok(CancelOutcome::Canceled);
    };

    match deps.slack.chat_delete_scheduled_message(channel, id).await {
        Ok(()) => Ok(CancelOutcome::Canceled),
        Err(error) => {
            let deadline_ahead = state.finish_at.is_some_and(|at| at > Utc::now());
            tracing::debug!(?error, deadline_ahead, "scheduled fallback not withdrawn");
            if deadline_ahead {
                Ok(CancelOutcome::PleaseWait)
            } else {
                Ok(CancelOutcome::AlreadyFired)
            }
        }
    }
}

fn channel_id(payload: &BlockActions) -> Result<String> {
    payload
        .channel
        .as_ref()
        .map(|channel| channel.id.clone())
        .context("block_actions payload without a channel")
}

fn actor(payload: &BlockActions) -> (String, String) {
    match &payload.user {
        Some(user) => (user.id.clone(), user.name.clone()),
        None => (String::new(), String::new()),
    }
}

/// The pressed message's blocks minus every actions block, or `None` when
/// the payload carries no usable blocks.
fn without_trailing_actions(payload: &BlockActions) -> Option<Value> {
    let blocks = payload.message.as_ref()?.blocks.as_ref()?.as_array()?;
    let kept: Vec<Value> = blocks
        .iter()
        .filter(|block| block["type"] != "actions")
        .cloned()
        .collect();
    if kept.is_empty() {
        return None;
    }
    Some(Value::Array(kept))
}

// ============================================================================
// Countdown job
// ============================================================================

/// Fires `count_down_minutes` before the deadline. Posts a warning mention,
/// but only if the running screen is still the channel's latest message -
/// otherwise the turn was ended, paused, or finished in the meantime.
pub struct CountDownHandler {
    pub deps: Arc<Deps>,
}

#[async_trait]
impl JobHandler for CountDownHandler {
    async fn run(&self, payload: Value) -> Result<()> {
        let channel = payload["channel"]
            .as_str()
            .context("count_down payload without channel")?
            .to_string();
        let value = payload["value"]
            .as_str()
            .context("count_down payload without value")?;
        let state = TurnState::decode(value)?;

        let messages = self
            .deps
            .slack
            .conversations_history(&channel, "", 1, "")
            .await?;
        let Some(latest) = messages.first() else {
            return Ok(());
        };
        if !is_running_screen(latest) {
            return Ok(());
        }

        let lead = self.deps.config.count_down_minutes;
        if let (Some(ts), Some(mut screen)) = (
            latest["ts"].as_str().map(str::to_string),
            latest.get("blocks").cloned(),
        ) {
            // Swap the deadline context for a countdown marker.
            if let Some(clock) = screen.get_mut(1) {
                clock["elements"][0]["text"] =
                    json!(format!(":hourglass_flowing_sand: *{lead} minutes left*"));
            }
            self.deps.slack.chat_update(&channel, &ts, screen).await?;
        }

        self.deps
            .slack
            .chat_post_message(&channel, &blocks::count_down_message(&state, lead), None)
            .await?;
        Ok(())
    }
}

/// A message is the live running screen when its last block is an actions
/// block carrying the turn-end button.
fn is_running_screen(message: &Value) -> bool {
    let Some(blocks) = message["blocks"].as_array() else {
        return false;
    };
    let Some(last) = blocks.last() else {
        return false;
    };
    last["type"] == "actions"
        && last["elements"]
            .as_array()
            .is_some_and(|elements| {
                elements
                    .iter()
                    .any(|element| element["action_id"] == "turn_end")
            })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_deps;
    use slack_dispatch::testing::{command_request, interaction_request};
    use slack_dispatch::DispatchOutput;

    const TOKEN: &str = "test-token";

    fn users(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn button_payload(action_id: &str, value: &str) -> Value {
        json!({
            "type": "block_actions",
            "token": TOKEN,
            "trigger_id": format!("trigger-{action_id}-{}", uuid::Uuid::new_v4()),
            "response_url": "https://hooks.slack.test/interaction",
            "channel": { "id": "C1", "name": "mobbing" },
            "user": { "id": "UA", "name": "alice" },
            "message": {
                "ts": "1000.000100",
                "blocks": [
                    { "type": "context", "elements": [{ "type": "mrkdwn", "text": "1st mob" }] },
                    { "type": "actions", "elements": [] }
                ]
            },
            "actions": [{
                "type": "button",
                "action_id": action_id,
                "value": value,
                "action_ts": "1.0"
            }]
        })
    }

    fn pressed_by(mut payload: Value, user_id: &str, user_name: &str) -> Value {
        payload["user"] = json!({ "id": user_id, "name": user_name });
        payload
    }

    #[tokio::test]
    async fn bare_command_opens_user_selection_in_channel() {
        let harness = test_deps();
        let dispatcher = build_dispatcher(harness.deps.clone());

        let output = dispatcher
            .handle(&command_request(TOKEN, "/mob", "", "trigger-1"))
            .await
            .unwrap();

        let DispatchOutput::Json(body) = output else {
            panic!("expected a json response");
        };
        assert_eq!(body["response_type"], "in_channel");
        assert_eq!(body["blocks"][0]["accessory"]["type"], "multi_users_select");
    }

    #[tokio::test]
    async fn help_text_is_ephemeral_usage() {
        let harness = test_deps();
        let dispatcher = build_dispatcher(harness.deps.clone());

        let output = dispatcher
            .handle(&command_request(TOKEN, "/mob", "help", "trigger-2"))
            .await
            .unwrap();

        let DispatchOutput::Json(body) = output else {
            panic!("expected a json response");
        };
        assert_eq!(body["response_type"], "ephemeral");
        assert!(body["text"].as_str().unwrap().contains("*Usage*"));
    }

    #[tokio::test]
    async fn inline_command_jumps_to_confirmation() {
        let harness = test_deps();
        let dispatcher = build_dispatcher(harness.deps.clone());

        let output = dispatcher
            .handle(&command_request(TOKEN, "/mob", "15 @alice @bob", "trigger-3"))
            .await
            .unwrap();

        let DispatchOutput::Json(body) = output else {
            panic!("expected a json response");
        };
        assert_eq!(body["response_type"], "in_channel");
        let text = body["blocks"][0]["elements"][0]["text"].as_str().unwrap();
        assert!(text.contains("15 minutes selected"));
        assert!(text.contains("<@alice>, <@bob>"));
    }

    #[tokio::test]
    async fn member_selection_replaces_screen_with_time_picker() {
        let harness = test_deps();
        let dispatcher = build_dispatcher(harness.deps.clone());

        let payload = json!({
            "type": "block_actions",
            "token": TOKEN,
            "trigger_id": "trigger-4",
            "response_url": "https://hooks.slack.test/interaction",
            "channel": { "id": "C1", "name": "mobbing" },
            "user": { "id": "UA", "name": "alice" },
            "actions": [{
                "type": "multi_users_select",
                "action_id": "members",
                "selected_users": ["UA", "UB"],
                "action_ts": "1.0"
            }]
        });
        dispatcher
            .handle(&interaction_request(&payload))
            .await
            .unwrap();

        let invoked = harness.response_url.invoked();
        assert_eq!(invoked.len(), 1);
        let response = &invoked[0].1;
        assert_eq!(response.replace_original, Some(true));
        let blocks = response.blocks.as_ref().unwrap();
        assert_eq!(blocks[1]["accessory"]["type"], "static_select");
    }

    #[tokio::test]
    async fn start_arms_fallback_and_countdown() {
        let harness = test_deps();
        let dispatcher = build_dispatcher(harness.deps.clone());
        let state = TurnState::new(users(&["UA", "UB"]), 15);

        dispatcher
            .handle(&interaction_request(&button_payload(
                "start",
                &state.encode().unwrap(),
            )))
            .await
            .unwrap();

        // Fallback scheduled at the deadline, running screen posted after.
        let scheduled = harness.slack.scheduled();
        assert_eq!(scheduled.len(), 1);
        let deadline = scheduled[0].post_at;
        let expected = Utc::now() + Duration::minutes(15);
        assert!((deadline - expected).num_seconds().abs() < 5);

        let posted = harness.slack.posted();
        assert_eq!(posted.len(), 1);
        assert!(posted[0].text.contains("<@UA>"));

        // Countdown fires five minutes (test config) before the deadline.
        let countdown = harness.jobs.of_type(COUNT_DOWN_JOB);
        assert_eq!(countdown.len(), 1);
        let run_at = countdown[0].run_at.unwrap();
        assert!((deadline - run_at).num_minutes() == 5 || (deadline - run_at).num_minutes() == 4);
    }

    #[tokio::test]
    async fn short_turns_skip_the_countdown() {
        let harness = test_deps();
        let state = TurnState::new(users(&["UA", "UB"]), 5);

        start_turn(&harness.deps, "C1", state).await.unwrap();

        assert!(harness.jobs.of_type(COUNT_DOWN_JOB).is_empty());
        assert_eq!(harness.slack.scheduled().len(), 1);
    }

    #[tokio::test]
    async fn turn_end_advances_rotation_and_withdraws_fallback() {
        let harness = test_deps();
        let dispatcher = build_dispatcher(harness.deps.clone());

        let mut state = TurnState::new(users(&["UA", "UB"]), 15);
        state.start_time = Some(Utc::now());
        state.finish_at = Some(Utc::now() + Duration::minutes(10));
        state.scheduled_message_id = Some("Q1".to_string());

        dispatcher
            .handle(&interaction_request(&button_payload(
                "turn_end",
                &state.encode().unwrap(),
            )))
            .await
            .unwrap();

        assert_eq!(
            *harness.slack.deleted_scheduled.lock().unwrap(),
            vec!["Q1".to_string()]
        );

        let posted = harness.slack.posted();
        assert_eq!(posted.len(), 1);
        assert!(posted[0].text.contains("<@UB>"));
        let blocks = posted[0].blocks.as_ref().unwrap();
        assert!(blocks[1]["elements"][0]["text"]
            .as_str()
            .unwrap()
            .contains("2nd mob"));
    }

    #[tokio::test]
    async fn losing_the_deadline_race_asks_to_wait() {
        let harness = test_deps();
        let dispatcher = build_dispatcher(harness.deps.clone());

        let mut state = TurnState::new(users(&["UA", "UB"]), 15);
        state.start_time = Some(Utc::now());
        state.finish_at = Some(Utc::now() + Duration::seconds(30));
        state.scheduled_message_id = Some("Q1".to_string());
        harness.slack.fail_next_delete_scheduled();

        dispatcher
            .handle(&interaction_request(&button_payload(
                "turn_end",
                &state.encode().unwrap(),
            )))
            .await
            .unwrap();

        let invoked = harness.response_url.invoked();
        assert_eq!(invoked.len(), 1);
        assert!(invoked[0].1.text.as_ref().unwrap().contains("wait"));
        assert!(harness.slack.posted().is_empty());
    }

    #[tokio::test]
    async fn race_lost_after_the_deadline_is_a_silent_no_op() {
        let harness = test_deps();
        let dispatcher = build_dispatcher(harness.deps.clone());

        let mut state = TurnState::new(users(&["UA", "UB"]), 15);
        state.start_time = Some(Utc::now());
        state.finish_at = Some(Utc::now() - Duration::seconds(30));
        state.scheduled_message_id = Some("Q1".to_string());
        harness.slack.fail_next_delete_scheduled();

        dispatcher
            .handle(&interaction_request(&button_payload(
                "turn_end",
                &state.encode().unwrap(),
            )))
            .await
            .unwrap();

        assert!(harness.response_url.invoked().is_empty());
        assert!(harness.slack.posted().is_empty());
    }

    #[tokio::test]
    async fn long_sessions_get_a_break_prompt_instead_of_the_next_turn() {
        let harness = test_deps();
        let dispatcher = build_dispatcher(harness.deps.clone());

        let mut state = TurnState::new(users(&["UA", "UB"]), 15);
        state.start_time = Some(Utc::now() - Duration::minutes(80));
        state.scheduled_message_id = Some("Q1".to_string());

        dispatcher
            .handle(&interaction_request(&button_payload(
                "turn_end",
                &state.encode().unwrap(),
            )))
            .await
            .unwrap();

        let posted = harness.slack.posted();
        assert_eq!(posted.len(), 1);
        let blocks = posted[0].blocks.as_ref().unwrap();
        assert!(blocks[0]["elements"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Take a break"));
    }

    #[tokio::test]
    async fn continue_by_the_driver_starts_the_next_turn() {
        let harness = test_deps();
        let dispatcher = build_dispatcher(harness.deps.clone());
        let state = TurnState::new(users(&["UA", "UB"]), 15);

        dispatcher
            .handle(&interaction_request(&button_payload(
                "continue",
                &state.encode().unwrap(),
            )))
            .await
            .unwrap();

        // Disarmed the between-turns screen, then posted the running screen.
        assert_eq!(harness.response_url.invoked().len(), 1);
        assert_eq!(harness.slack.scheduled().len(), 1);
        assert_eq!(harness.slack.posted().len(), 1);
    }

    #[tokio::test]
    async fn continue_by_someone_else_posts_a_takeover_prompt() {
        let harness = test_deps();
        let dispatcher = build_dispatcher(harness.deps.clone());
        let state = TurnState::new(users(&["UA", "UB"]), 15);

        let payload = pressed_by(
            button_payload("continue", &state.encode().unwrap()),
            "UB",
            "bob",
        );
        dispatcher
            .handle(&interaction_request(&payload))
            .await
            .unwrap();

        // No turn started; only the prompt went out.
        assert!(harness.slack.scheduled().is_empty());
        let posted = harness.slack.posted();
        assert_eq!(posted.len(), 1);
        let blocks = posted[0].blocks.as_ref().unwrap();
        assert!(blocks[0]["elements"][0]["text"]
            .as_str()
            .unwrap()
            .contains("wants to take the turn"));
    }

    #[tokio::test]
    async fn change_reorders_and_starts_with_the_taker_driving() {
        let harness = test_deps();
        let dispatcher = build_dispatcher(harness.deps.clone());

        let mut state = TurnState::new(users(&["a", "b", "c"]), 15);
        state.times = 2; // driver is c
        let takeover = TakeoverValue {
            state,
            actor_id: "a".to_string(),
            actor_name: "alice".to_string(),
        };

        dispatcher
            .handle(&interaction_request(&button_payload(
                "change",
                &takeover.encode().unwrap(),
            )))
            .await
            .unwrap();

        // Prompt deleted, then the reordered turn started with `a` driving.
        let invoked = harness.response_url.invoked();
        assert_eq!(invoked.len(), 1);
        assert_eq!(invoked[0].1.delete_original, Some(true));

        let posted = harness.slack.posted();
        assert_eq!(posted.len(), 1);
        assert!(posted[0].text.contains("<@a> is driving"));
    }

    #[tokio::test]
    async fn pause_freezes_the_remaining_clock() {
        let harness = test_deps();
        let dispatcher = build_dispatcher(harness.deps.clone());

        let mut state = TurnState::new(users(&["UA", "UB"]), 15);
        state.finish_at = Some(Utc::now() + Duration::seconds(300));
        state.scheduled_message_id = Some("Q1".to_string());

        dispatcher
            .handle(&interaction_request(&button_payload(
                "break",
                &state.encode().unwrap(),
            )))
            .await
            .unwrap();

        let invoked = harness.response_url.invoked();
        assert_eq!(invoked.len(), 1);
        let blocks = invoked[0].1.blocks.as_ref().unwrap();
        let value = blocks[1]["elements"][0]["value"].as_str().unwrap();
        let paused = TurnState::decode(value).unwrap();
        let remaining = paused.remaining_seconds.unwrap();
        assert!((295..=300).contains(&remaining));
        assert!(paused.finish_at.is_none());
        assert!(paused.scheduled_message_id.is_none());
    }

    #[tokio::test]
    async fn resume_uses_the_frozen_clock_not_full_minutes() {
        let harness = test_deps();
        let mut state = TurnState::new(users(&["UA", "UB"]), 15);
        state.remaining_seconds = Some(120);

        start_turn(&harness.deps, "C1", state).await.unwrap();

        let scheduled = harness.slack.scheduled();
        let expected = Utc::now() + Duration::seconds(120);
        assert!((scheduled[0].post_at - expected).num_seconds().abs() < 5);
    }

    #[tokio::test]
    async fn finish_posts_the_summary_and_withdraws_the_fallback() {
        let harness = test_deps();
        let dispatcher = build_dispatcher(harness.deps.clone());

        let mut state = TurnState::new(users(&["UA", "UB"]), 15);
        state.times = 4;
        state.scheduled_message_id = Some("Q1".to_string());

        dispatcher
            .handle(&interaction_request(&button_payload(
                "finish",
                &state.encode().unwrap(),
            )))
            .await
            .unwrap();

        assert_eq!(
            *harness.slack.deleted_scheduled.lock().unwrap(),
            vec!["Q1".to_string()]
        );
        let posted = harness.slack.posted();
        assert_eq!(posted.len(), 1);
        assert!(posted[0].text.contains(":trophy: 4 mobs completed."));
    }

    #[tokio::test]
    async fn countdown_skips_when_the_running_screen_is_gone() {
        let harness = test_deps();
        harness.slack.set_history(vec![json!({
            "ts": "1000.000200",
            "blocks": [
                { "type": "context", "elements": [{ "type": "mrkdwn", "text": "done" }] }
            ]
        })]);

        let state = TurnState::new(users(&["UA", "UB"]), 15);
        let handler = CountDownHandler {
            deps: harness.deps.clone(),
        };
        handler
            .run(json!({ "channel": "C1", "value": state.encode().unwrap() }))
            .await
            .unwrap();

        assert!(harness.slack.posted().is_empty());
        assert!(harness.slack.updated().is_empty());
    }

    #[tokio::test]
    async fn countdown_warns_the_driver_while_the_turn_runs() {
        let harness = test_deps();
        let state = TurnState::new(users(&["UA", "UB"]), 15);
        let running =
            serde_json::to_value(blocks::running(&state, 5).unwrap()).unwrap();
        harness.slack.set_history(vec![json!({
            "ts": "1000.000300",
            "blocks": running
        })]);

        let handler = CountDownHandler {
            deps: harness.deps.clone(),
        };
        handler
            .run(json!({ "channel": "C1", "value": state.encode().unwrap() }))
            .await
            .unwrap();

        let updated = harness.slack.updated();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].ts, "1000.000300");

        let posted = harness.slack.posted();
        assert_eq!(posted.len(), 1);
        assert!(posted[0].text.contains("finish in 5 minutes"));
    }

    #[test]
    fn command_text_parsing_accepts_both_mention_forms() {
        assert_eq!(
            parse_command_text("15 @alice @bob"),
            Some((15, users(&["alice", "bob"])))
        );
        assert_eq!(
            parse_command_text("20 <@U1|alice> <@U2>"),
            Some((20, users(&["U1", "U2"])))
        );
        assert_eq!(parse_command_text("help"), None);
        assert_eq!(parse_command_text("0 @alice @bob"), None);
        assert_eq!(parse_command_text("15 @alice"), None);
        assert_eq!(parse_command_text("15 alice bob"), None);
    }
}
