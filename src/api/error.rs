//! API error types.

use reqwest::StatusCode;
use thiserror::Error;

/// Format an API error body for display, extracting a message from JSON
/// if present.
///
/// Handles `{"error": {"message": "..."}}`, `{"error": "..."}` and
/// `{"message": "..."}`. Anything else is returned as-is.
#[must_use]
pub fn format_api_error(body: &str) -> String {
    if let Some(json_start) = body.find('{') {
        let json_str = &body[json_start..];
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(json_str)
            && let Some(msg) = extract_error_message(&json)
        {
            let prefix = body[..json_start].trim();
            if prefix.is_empty() {
                return msg;
            }
            return format!("{prefix} {msg}");
        }
    }

    body.trim().to_string()
}

fn extract_error_message(json: &serde_json::Value) -> Option<String> {
    if let Some(error_obj) = json.get("error") {
        if let Some(msg) = error_obj.get("message").and_then(|v| v.as_str()) {
            return Some(msg.to_string());
        }
        if let Some(msg) = error_obj.as_str() {
            return Some(msg.to_string());
        }
    }

    json.get("message")
        .and_then(|v| v.as_str())
        .map(ToString::to_string)
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// The server rejected the credential (HTTP 401).
    #[error("Session expired")]
    Unauthorized,

    #[error("HTTP {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse response: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    Request(String),
}

impl ApiError {
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_nested_error() {
        let body = r#"{"error":{"message":"Item not found"}}"#;
        assert_eq!(format_api_error(body), "Item not found");
    }

    #[test]
    fn test_format_string_error() {
        let body = r#"{"error":"Invalid token"}"#;
        assert_eq!(format_api_error(body), "Invalid token");
    }

    #[test]
    fn test_format_top_level_message() {
        let body = r#"{"message":"Database unavailable"}"#;
        assert_eq!(format_api_error(body), "Database unavailable");
    }

    #[test]
    fn test_format_plain_text() {
        assert_eq!(format_api_error("Internal Server Error\n"), "Internal Server Error");
    }

    #[test]
    fn test_format_unparseable_json() {
        assert_eq!(format_api_error("{oops"), "{oops");
    }

    #[test]
    fn test_status_display() {
        let err = ApiError::Status {
            status: StatusCode::BAD_GATEWAY,
            message: "upstream down".into(),
        };
        assert_eq!(err.to_string(), "HTTP 502 Bad Gateway: upstream down");
        assert!(!err.is_unauthorized());
        assert!(ApiError::Unauthorized.is_unauthorized());
    }
}
