//! Slack surface: Block Kit model and the two outbound clients
//! (Web API and response_url webhooks).

pub mod api;
pub mod blocks;
pub mod response_url;

pub use api::{SlackApi, SlackApiClient, SlackApiError};
pub use response_url::{InteractionResponse, ReqwestResponseUrl, ResponseUrl};
