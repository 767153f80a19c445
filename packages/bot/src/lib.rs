//! Mob-programming turn timer for Slack.
//!
//! A single webhook endpoint receives slash commands, interactive payloads,
//! and callback events; `slack-dispatch` decides which arrived, verifies it,
//! guards against re-delivery, and routes it here. The whole rotation state
//! rides inside the `value` string of whichever UI control gets clicked next
//! - there is no server-side session.
//!
//! ```text
//! /mob ──► pick users ──► pick minutes ──► confirm ──► (shuffle?) ──► running
//!                                                                       │
//!                running ◄── turn_end ──┬── break ──► paused ── resume ─┘
//!                                       └── finish ──► done
//! ```
//!
//! Module map:
//! - [`slack`] - Block Kit model, Web API client, response_url client
//! - [`mob`] - the turn-rotation state machine and its UI builders
//! - [`jobs`] - in-process delayed-job runner (countdown + deferred logging)
//! - [`routes`] - axum edge: the webhook endpoint and health check
//! - [`deps`] - dependency container wiring the above together

pub mod config;
pub mod deps;
pub mod jobs;
pub mod mob;
pub mod routes;
pub mod slack;
pub mod testing;

pub use config::Config;
pub use deps::Deps;
