//! UI builders: one function per screen the workflow can show.
//!
//! Every interactive control embeds the serialized [`TurnState`] (or
//! [`TakeoverValue`]) in its `value`, which is how state survives between
//! interactions.

use serde_json::Result;

use crate::slack::blocks::{Block, Confirm, Element, SelectOption, Text};

use super::state::{
    mention, mention_list, ordinal, TakeoverValue, TurnState, TURN_OPTION_MINUTES,
};

const CANCEL_VALUE: &str = r#"{"cancel":true}"#;

fn cancel_button() -> Element {
    Element::button("cancel", "Cancel", CANCEL_VALUE)
}

fn finish_confirm() -> Confirm {
    Confirm::new(
        "Are you sure?",
        "Do you want to finish the mob?",
        "Do Finish",
        "Go back to mob",
    )
}

/// Step 1: pick participants.
pub fn select_users(invoker_id: &str) -> Vec<Block> {
    vec![
        Block::section_with(
            Text::mrkdwn(":one: Pick users from the list."),
            Element::MultiUsersSelect {
                action_id: "members".to_string(),
                placeholder: Text::plain("Select users"),
                initial_users: vec![invoker_id.to_string()],
            },
        ),
        Block::actions(vec![cancel_button()]),
    ]
}

/// Step 2: pick a turn length. Each option's value seeds a fresh state.
pub fn select_time(selected_users: &[String]) -> Result<Vec<Block>> {
    let mut options = Vec::with_capacity(TURN_OPTION_MINUTES.len());
    for minutes in TURN_OPTION_MINUTES {
        options.push(SelectOption {
            text: Text::plain(format!("{minutes} minutes")),
            value: TurnState::new(selected_users.to_vec(), minutes).encode()?,
        });
    }

    Ok(vec![
        Block::context(Text::mrkdwn(format!(
            ":one: Pick users from the list. :white_check_mark:\n{}\nselected.",
            mention_list(selected_users)
        ))),
        Block::section_with(
            Text::mrkdwn(":two: Select a time."),
            Element::StaticSelect {
                action_id: "time".to_string(),
                placeholder: Text::plain("Select a time"),
                options,
            },
        ),
        Block::actions(vec![cancel_button()]),
    ])
}

/// Step 3: confirm, with or without a shuffle first.
pub fn confirm(state: &TurnState) -> Result<Vec<Block>> {
    let token = state.encode()?;

    Ok(vec![
        Block::context(Text::mrkdwn(format!(
            ":one: Pick users from the list. :white_check_mark:\n{}\nselected.\n:two: Select a time :white_check_mark:.\n{} minutes selected.",
            mention_list(&state.users),
            state.minutes
        ))),
        Block::actions(vec![
            Element::button("shuffle", "Shuffle Start :twisted_rightwards_arrows:", token.clone())
                .primary(),
            Element::button("start", "Normal Start :motorway:", token).primary(),
            cancel_button(),
        ]),
    ])
}

/// Shuffled-order preview: accept, re-roll, or cancel.
pub fn shuffled_order(state: &TurnState) -> Result<Vec<Block>> {
    let order = state
        .users
        .iter()
        .enumerate()
        .map(|(index, user)| format!("{}. {}", index + 1, mention(user)))
        .collect::<Vec<_>>()
        .join(", ");
    let token = state.encode()?;

    Ok(vec![
        Block::context(Text::mrkdwn(format!(
            ":dart: Order\n{order}\n:timer_clock: {} minutes",
            state.minutes
        ))),
        Block::actions(vec![
            Element::button("start", "Start Mobbing :motorway:", token.clone()).primary(),
            Element::button("reshuffle", "One more :twisted_rightwards_arrows:", token),
            cancel_button(),
        ]),
    ])
}

/// The running-turn message: who drives, when it ends, and the controls.
///
/// When the turn is no longer than the countdown lead time there is no room
/// for a meaningful break, so the break button is dropped.
pub fn running(state: &TurnState, lead_minutes: i64) -> Result<Vec<Block>> {
    let token = state.encode()?;
    let deadline = state
        .finish_at
        .map(|at| at.format("%H:%M:%S").to_string())
        .unwrap_or_default();

    let mut controls = vec![
        Element::button("turn_end", "Turn end :black_joker:", token.clone()).primary(),
        Element::button("break", "Break :coffee:", token.clone()),
        Element::button("finish", "Exit :door:", token)
            .danger()
            .with_confirm(finish_confirm()),
    ];
    if state.minutes <= lead_minutes {
        controls.truncate(1);
    }

    Ok(vec![
        Block::context(Text::mrkdwn(format!(
            "{} mob. :man-woman-boy:\n:oncoming_automobile: Driver({}), :world_map: Navigator({})",
            ordinal(state.times),
            mention(state.driver()),
            mention(state.navigator()),
        ))),
        Block::context(Text::mrkdwn(format!(
            ":clock9: *{deadline}* (_{} minutes later_)",
            state.minutes
        ))),
        Block::actions(controls),
    ])
}

/// Posted when a turn ends: thank the outgoing driver, announce the next
/// pair, offer Continue/Finish.
pub fn next_turn(state: &TurnState) -> Result<Vec<Block>> {
    let token = state.encode()?;
    let emoji = if state.times % 2 == 0 { ":+1:" } else { ":clap:" };
    let previous = state.user_at(state.times.wrapping_sub(1));

    Ok(vec![
        Block::context(Text::mrkdwn(format!(
            ":alarm_clock: Thank you {}{emoji}",
            mention(previous)
        ))),
        Block::context(Text::mrkdwn(format!(
            "{} mob. :man-woman-boy:\n:oncoming_automobile: Driver({}), :world_map: Navigator({})",
            ordinal(state.times),
            mention(state.driver()),
            mention(state.navigator()),
        ))),
        Block::actions(vec![
            Element::button("continue", "Continue :raised_hands:", token.clone()).primary(),
            Element::button("finish", "Finish :checkered_flag:", token)
                .danger()
                .with_confirm(finish_confirm()),
        ]),
    ])
}

/// Prompted instead of the next turn once the break ceiling is exceeded.
pub fn break_prompt(state: &TurnState, ceiling_minutes: i64) -> Result<Vec<Block>> {
    let token = state.encode()?;

    Ok(vec![
        Block::context(Text::mrkdwn(format!(
            ":coffee: You have been mobbing for over {ceiling_minutes} minutes. Take a break!"
        ))),
        Block::actions(vec![
            Element::button("rested", "We are rested :muscle:", token.clone()).primary(),
            Element::button("finish", "Finish :checkered_flag:", token).danger(),
        ]),
    ])
}

/// Shown while paused mid-turn; the remaining clock is frozen in the state.
pub fn paused(state: &TurnState) -> Result<Vec<Block>> {
    let token = state.encode()?;
    let remaining = state.remaining_seconds.unwrap_or_default();

    Ok(vec![
        Block::context(Text::mrkdwn(format!(
            ":double_vertical_bar: Paused with {}m{:02}s left on {}'s turn.",
            remaining / 60,
            remaining % 60,
            mention(state.driver()),
        ))),
        Block::actions(vec![
            Element::button("resume", "Resume :arrow_forward:", token.clone()).primary(),
            Element::button("finish", "Finish :checkered_flag:", token).danger(),
        ]),
    ])
}

/// Shown after a rest: ready to start the next turn fresh.
pub fn ready(state: &TurnState) -> Result<Vec<Block>> {
    let token = state.encode()?;

    Ok(vec![
        Block::context(Text::mrkdwn(format!(
            "{} mob. :man-woman-boy:\n:oncoming_automobile: Driver({}), :world_map: Navigator({})",
            ordinal(state.times),
            mention(state.driver()),
            mention(state.navigator()),
        ))),
        Block::actions(vec![
            Element::button("restart", "Restart :motorway:", token.clone()).primary(),
            Element::button("finish", "Finish :checkered_flag:", token).danger(),
        ]),
    ])
}

/// Posted when someone other than the current driver presses Continue.
pub fn takeover_prompt(takeover: &TakeoverValue) -> Result<Vec<Block>> {
    let token = takeover.encode()?;

    Ok(vec![
        Block::context(Text::mrkdwn(format!(
            ":raising_hand: {} wants to take the turn from {}. Change the order?",
            mention(&takeover.actor_id),
            mention(takeover.state.driver()),
        ))),
        Block::actions(vec![
            Element::button("change", "Change order :arrows_counterclockwise:", token.clone())
                .primary(),
            Element::button("recontinue", "Keep order :raised_hands:", token),
        ]),
    ])
}

pub fn finish_message(state: &TurnState) -> String {
    let mut message = String::new();
    if state.times > 0 {
        message = format!(":trophy: {} mobs completed.\n", state.times);
    }
    format!(
        "{message}Thank you for everything. {} :confetti_ball:",
        mention_list(&state.users)
    )
}

pub fn count_down_message(state: &TurnState, lead_minutes: i64) -> String {
    format!(
        ":hourglass_flowing_sand: Hey, {}. {} mob will finish in {lead_minutes} minutes.",
        mention(state.driver()),
        ordinal(state.times),
    )
}

pub fn please_wait_message() -> String {
    ":hourglass: The turn is about to end on its own. Please wait a moment.".to_string()
}

pub fn usage_message(command: &str) -> String {
    format!("*Usage*\n* {command}\n* {command} [n minutes][@user1 @user2]\n* {command} help")
}
