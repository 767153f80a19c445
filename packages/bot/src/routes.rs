//! HTTP edge: one webhook endpoint plus a health probe.
//!
//! Slack posts everything to the same URL, as either a urlencoded form
//! (commands, interactions) or a JSON body (callback events). The handler
//! normalizes both into an [`IncomingRequest`] and lets the dispatch layer
//! decide the shape. Failures are logged off the request path through the
//! job queue so the response goes back to Slack without waiting on anything.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use slack_dispatch::{
    CompositeDispatcher, DispatchError, DispatchOutput, IncomingRequest, JobQueue,
};

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<CompositeDispatcher>,
    pub jobs: Arc<dyn JobQueue>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/slack/events", post(slack_events))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(10)))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn slack_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let request = if is_json(&headers) {
        IncomingRequest::from_body(body)
    } else {
        IncomingRequest::from_params(parse_form(&body))
    };

    match state.dispatcher.handle(&request).await {
        Ok(DispatchOutput::Json(value)) => (StatusCode::OK, Json(value)).into_response(),
        Ok(DispatchOutput::Empty) => StatusCode::OK.into_response(),
        Err(error) => {
            let status = status_for(&error);
            // Slack only wants the status; the details go to a background job.
            if let Err(enqueue_error) = state
                .jobs
                .enqueue("async_logging", json!({ "error": error.to_string() }))
                .await
            {
                tracing::error!(?enqueue_error, %error, "failed to enqueue error log");
            }
            status.into_response()
        }
    }
}

fn status_for(error: &DispatchError) -> StatusCode {
    match error {
        DispatchError::VerificationFailed { .. } => StatusCode::UNAUTHORIZED,
        DispatchError::DuplicateDelivery { .. } => StatusCode::CONFLICT,
        DispatchError::Unroutable { .. } | DispatchError::NoMatchingDispatcher => {
            StatusCode::NOT_FOUND
        }
        DispatchError::MalformedPayload { .. } => StatusCode::BAD_REQUEST,
        DispatchError::Listener(_) | DispatchError::Cache(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}

fn parse_form(body: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for pair in body.split('&') {
        let mut parts = pair.splitn(2, '=');
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        params.insert(decode_component(key), decode_component(value));
    }
    params
}

/// Form decoding: `+` means space, and that has to happen before percent
/// decoding so `%2B` still comes out as a literal `+`.
fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(spaced)
}
