//! Transport-agnostic request and output types.
//!
//! The HTTP edge flattens whatever arrived (form-encoded fields or a raw JSON
//! body) into an [`IncomingRequest`]; dispatchers probe it for the fields that
//! identify their shape. Nothing here is persisted - a request lives for one
//! dispatch call.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::DispatchError;

/// One inbound webhook delivery, before any shape has been recognized.
#[derive(Debug, Clone, Default)]
pub struct IncomingRequest {
    /// Decoded form/query parameters (`command`, `payload`, `token`, ...).
    pub params: HashMap<String, String>,
    /// Raw request body, kept for the JSON-bodied callback-event shape.
    pub body: Option<String>,
}

impl IncomingRequest {
    pub fn new(params: HashMap<String, String>, body: Option<String>) -> Self {
        Self { params, body }
    }

    /// A request carrying only form parameters.
    pub fn from_params(params: HashMap<String, String>) -> Self {
        Self { params, body: None }
    }

    /// A request carrying only a raw body.
    pub fn from_body(body: impl Into<String>) -> Self {
        Self {
            params: HashMap::new(),
            body: Some(body.into()),
        }
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// What a dispatcher hands back to the transport for a performed request.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutput {
    /// A JSON response body.
    Json(serde_json::Value),
    /// An empty 200 body (listener returned nothing).
    Empty,
}

impl DispatchOutput {
    /// Wrap a listener's optional response: a value becomes JSON output, an
    /// absent value becomes an empty output.
    pub fn from_response<T: Serialize>(response: Option<T>) -> Result<Self, DispatchError> {
        match response {
            Some(value) => {
                let json = serde_json::to_value(value).map_err(|e| {
                    DispatchError::MalformedPayload {
                        reason: format!("response serialization failed: {e}"),
                    }
                })?;
                Ok(DispatchOutput::Json(json))
            }
            None => Ok(DispatchOutput::Empty),
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            DispatchOutput::Json(value) => Some(value),
            DispatchOutput::Empty => None,
        }
    }
}
