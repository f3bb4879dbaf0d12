//! REST Client Error Types
//!
//! Maps transport failures and backend status codes onto the cases callers
//! act on. `Unauthorized` is the only one that ends the session.

use thiserror::Error;

/// Errors from calls to the backend REST API
#[derive(Error, Debug)]
pub enum ClientError {
    /// No token, or the backend answered 401. The stored token is gone.
    #[error("Not authenticated")]
    Unauthorized,

    /// Login rejected the username/password
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Any other non-2xx response
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Backend unavailable")]
    Unavailable,

    #[error("Request timeout")]
    Timeout,

    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Session error: {0}")]
    Session(#[from] crate::session::SessionError),
}

impl ClientError {
    /// Whether the caller should send the user back to login
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized)
    }

    /// HTTP status, for errors that carry one
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Unauthorized => Some(401),
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classify a transport-level failure
    pub(crate) fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout
        } else if e.is_connect() {
            ClientError::Unavailable
        } else if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else {
            ClientError::Request(e)
        }
    }
}

/// Pull a readable message out of an error body
///
/// FastAPI puts it in `detail`, either a string or a list of validation
/// errors. Falls back to the raw body, then to the status reason.
pub(crate) fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        match value.get("detail") {
            Some(serde_json::Value::String(detail)) => return detail.clone(),
            Some(detail) => return detail.to_string(),
            None => {}
        }
    }

    let body = body.trim();
    if !body.is_empty() {
        return body.to_string();
    }

    format!("Request failed with status {}", status.as_u16())
}

/// Result type for REST calls
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_error_message_detail_string() {
        let msg = error_message(StatusCode::NOT_FOUND, r#"{"detail": "Bus not found"}"#);
        assert_eq!(msg, "Bus not found");
    }

    #[test]
    fn test_error_message_detail_list() {
        let msg = error_message(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"detail": [{"loc": ["body", "content"], "msg": "field required"}]}"#,
        );
        assert!(msg.contains("field required"));
    }

    #[test]
    fn test_error_message_fallbacks() {
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, "upstream down"), "upstream down");
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "  "),
            "Request failed with status 502"
        );
    }

    #[test]
    fn test_status() {
        assert_eq!(ClientError::Unauthorized.status(), Some(401));
        assert!(ClientError::Unauthorized.is_unauthorized());
        let err = ClientError::Api {
            status: 503,
            message: "down".to_string(),
        };
        assert_eq!(err.status(), Some(503));
        assert!(!err.is_unauthorized());
        assert_eq!(ClientError::Timeout.status(), None);
    }
}
