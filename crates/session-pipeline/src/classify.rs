//! Terminal handling for non-2xx, non-401 responses
//!
//! Turns the response into `Error::Application`, preferring the message the
//! server sent, and shows it to the user. Never retries.

use std::sync::Arc;

use reqwest::StatusCode;
use tracing::warn;

use crate::error::Error;
use crate::hooks::Notifier;
use crate::request::ApiResponse;

/// Maps application failures to the error taxonomy and notifies the user.
#[derive(Clone)]
pub struct ErrorClassifier {
    notifier: Arc<dyn Notifier>,
}

impl ErrorClassifier {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    pub fn classify(&self, response: &ApiResponse) -> Error {
        let message = server_message(&response.body)
            .unwrap_or_else(|| fallback_message(response.status).to_string());
        warn!(status = %response.status, reason = %message, "request failed");
        self.notifier.notify_error(&message);
        Error::Application {
            status: response.status.as_u16(),
            message,
        }
    }
}

/// Message from a JSON error body: `message`, `errorMessage` or `error.message`.
fn server_message(body: &[u8]) -> Option<String> {
    let json: serde_json::Value = serde_json::from_slice(body).ok()?;
    [
        json.get("message"),
        json.get("errorMessage"),
        json.get("error").and_then(|e| e.get("message")),
    ]
    .into_iter()
    .flatten()
    .filter_map(|v| v.as_str())
    .find(|s| !s.trim().is_empty())
    .map(str::to_owned)
}

fn fallback_message(status: StatusCode) -> &'static str {
    match status.as_u16() {
        400 => "The request was invalid",
        403 => "You do not have permission to perform this action",
        404 => "The requested resource was not found",
        405 => "The request method is not allowed",
        408 => "The request timed out",
        409 => "The request conflicts with the current state",
        429 => "Too many requests, please try again later",
        500 => "Internal server error",
        502 => "Bad gateway",
        503 => "Service unavailable",
        504 => "Gateway timeout",
        _ => "Request failed",
    }
}
