use std::error::Error;

use thiserror::Error;

use crate::models::ApiErrorResponse;

pub type HandlerResult = Result<(), Box<dyn Error + Send + Sync>>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("backend responded with {status}{}", suffix(.message))]
    Status { status: u16, message: Option<String> },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// Builds a status error from a non-2xx response body. The message is
    /// only kept when the body is the backend's error envelope and says
    /// something.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ApiErrorResponse>(body)
            .ok()
            .and_then(|e| e.message)
            .filter(|m| !m.trim().is_empty());
        ApiError::Status { status, message }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(err) => err.status().map(|s| s.as_u16()),
            ApiError::Decode(_) => None,
        }
    }

    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

fn suffix(message: &Option<String>) -> String {
    message.as_deref().map(|m| format!(": {m}")).unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} is not a valid URL: {source}")]
    InvalidUrl {
        key: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("{key} must be an http(s) base URL, got {value}")]
    NotABaseUrl { key: &'static str, value: String },

    #[error("{key} must be a positive integer, got {value}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("could not build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_server_message_from_error_envelope() {
        let body = r#"{"status":400,"message":"Slot is fully booked","timestamp":"2024-12-20T10:30:00Z"}"#;
        let err = ApiError::from_response(400, body);
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.server_message(), Some("Slot is fully booked"));
        assert_eq!(err.to_string(), "backend responded with 400: Slot is fully booked");
    }

    #[test]
    fn ignores_blank_or_foreign_bodies() {
        let blank = ApiError::from_response(400, r#"{"status":400,"message":"  "}"#);
        assert_eq!(blank.server_message(), None);

        let html = ApiError::from_response(502, "<html>Bad Gateway</html>");
        assert_eq!(html.status(), Some(502));
        assert_eq!(html.server_message(), None);
        assert_eq!(html.to_string(), "backend responded with 502");
    }
}
