//! Transport error types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Error body returned by the REST API on failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub status_code: u16,
    pub message: String,
    #[serde(default)]
    pub additional_info: Vec<Value>,
    #[serde(default)]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Errors that can occur while sending requests through the shared transport
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request path could not be joined onto the base URL
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The request could not be sent or the response not read
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("API error {status}: {message}")]
    Api {
        status: u16,
        message: String,
        body: Option<ApiErrorResponse>,
    },
}

impl TransportError {
    /// Build an `Api` error from a status code and raw response body.
    pub fn from_response_body(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ApiErrorResponse>(body) {
            Ok(parsed) => TransportError::Api {
                status,
                message: parsed.message.clone(),
                body: Some(parsed),
            },
            Err(_) => TransportError::Api {
                status,
                message: if body.trim().is_empty() {
                    format!("HTTP {status}")
                } else {
                    body.trim().to_string()
                },
                body: None,
            },
        }
    }

    /// Whether the server rejected the request's credentials.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, TransportError::Api { status: 401, .. })
    }
}
