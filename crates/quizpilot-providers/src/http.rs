//! Shared HTTP plumbing for the adapters

use quizpilot_core::{ProviderId, QuizError, Result};
use serde_json::Value;

/// Status and raw body of one provider response
#[derive(Debug, Clone)]
pub(crate) struct HttpOutcome {
    pub status: u16,
    pub body: String,
}

impl HttpOutcome {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Error message of an API error body: `error.message`, then `message`,
    /// then the raw body
    pub fn error_message(&self) -> String {
        match serde_json::from_str::<Value>(&self.body) {
            Ok(value) => value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .or_else(|| value.get("message").and_then(Value::as_str))
                .map(String::from)
                .unwrap_or_else(|| self.body.clone()),
            Err(_) => self.body.clone(),
        }
    }

    /// Error code of an API error body: `code` or `error.code`
    pub fn error_code(&self) -> Option<String> {
        let value: Value = serde_json::from_str(&self.body).ok()?;
        let code = value.get("code").or_else(|| value.pointer("/error/code"))?;
        match code {
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn into_api_error(self, provider: ProviderId) -> QuizError {
        QuizError::Api {
            provider,
            status: self.status,
            body: self.body,
        }
    }

    /// Error for a failed plain-JSON retry after the strict schema was
    /// refused: a 400 means the request shape is still refused
    pub fn into_degraded_error(self, provider: ProviderId) -> QuizError {
        if self.status == 400 {
            QuizError::SchemaRejected {
                provider,
                body: self.error_message(),
            }
        } else {
            self.into_api_error(provider)
        }
    }

    /// Parse a success body into the provider's response type
    pub fn parse<T: serde::de::DeserializeOwned>(&self, provider: ProviderId) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|e| {
            QuizError::Transport(format!("Failed to parse {} response: {}", provider, e))
        })
    }
}

/// Send a request and read the whole body
pub(crate) async fn send(provider: ProviderId, request: reqwest::RequestBuilder) -> Result<HttpOutcome> {
    let response = request
        .send()
        .await
        .map_err(|e| QuizError::Transport(format!("Failed to send {} request: {}", provider, e)))?;

    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| QuizError::Transport(format!("Failed to read {} response: {}", provider, e)))?;

    Ok(HttpOutcome { status, body })
}

/// Join a base URL and a path without doubling slashes
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
