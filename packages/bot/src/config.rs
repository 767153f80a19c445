//! Environment-driven configuration.

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Shared secret compared against every delivery's token.
    pub verification_token: String,
    /// Bot token for the Slack Web API (`xoxb-...`).
    pub bot_token: String,
    /// The registered slash command, e.g. `/mob`.
    pub slash_command: String,
    /// Early-warning lead time before a turn ends, in minutes.
    /// Min 1 (suspend-time slack), bounded in practice by the dedup window.
    pub count_down_minutes: i64,
    /// Continuous mobbing time after which a break is prompted, in minutes.
    pub break_ceiling_minutes: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let verification_token = std::env::var("VERIFICATION_TOKEN")
            .context("VERIFICATION_TOKEN is required")?;
        let bot_token =
            std::env::var("SLACK_BOT_TOKEN").context("SLACK_BOT_TOKEN is required")?;

        Ok(Self {
            port: env_or("PORT", 3000)?,
            verification_token,
            bot_token,
            slash_command: std::env::var("SLASH_COMMAND").unwrap_or_else(|_| "/mob".to_string()),
            count_down_minutes: env_or("COUNT_DOWN_NOTIFICATION_TIME", 5)?,
            break_ceiling_minutes: env_or("BREAK_TIME_MINUTES", 75)?,
        })
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{key} is not a valid value: {raw}")),
        Err(_) => Ok(default),
    }
}
