//! Errors from the hosted backend's HTTP APIs.

use thiserror::Error;

/// Errors that can occur when talking to the hosted backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP transport failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the JSON we expected.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A URL could not be built from the configured base.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Row or object not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique or foreign key constraint violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// API key or user token rejected.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Too many requests.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Any other non-success response.
    #[error("Backend returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the error body.
        message: String,
    },
}

impl BackendError {
    /// Build an error from a non-success status and its body.
    ///
    /// The REST, auth and storage APIs each use a slightly different error
    /// shape; the message is taken from whichever of `message`, `msg`,
    /// `error_description` or `error` is present.
    #[must_use]
    pub fn from_response(status: reqwest::StatusCode, body: &str) -> Self {
        let message = extract_message(body);
        match status.as_u16() {
            401 | 403 => Self::Unauthorized(message),
            404 => Self::NotFound(message),
            409 => Self::Conflict(message),
            code => Self::Api {
                status: code,
                message,
            },
        }
    }

    /// Whether the backend reported a unique-constraint violation.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

fn extract_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            ["message", "msg", "error_description", "error"]
                .iter()
                .find_map(|key| v.get(*key).and_then(serde_json::Value::as_str))
        })
        .map_or_else(
            || body.chars().take(200).collect(),
            ToString::to_string,
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_conflict_from_rest_error() {
        let body = r#"{"code":"23505","message":"duplicate key value","details":null,"hint":null}"#;
        let err = BackendError::from_response(StatusCode::CONFLICT, body);
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), "Conflict: duplicate key value");
    }

    #[test]
    fn test_auth_error_shape() {
        let body = r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#;
        let err = BackendError::from_response(StatusCode::BAD_REQUEST, body);
        assert!(matches!(
            err,
            BackendError::Api { status: 400, ref message } if message == "Invalid login credentials"
        ));
    }

    #[test]
    fn test_non_json_body_is_truncated() {
        let body = "x".repeat(500);
        let err = BackendError::from_response(StatusCode::BAD_GATEWAY, &body);
        match err {
            BackendError::Api { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message.len(), 200);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unauthorized() {
        let err = BackendError::from_response(StatusCode::UNAUTHORIZED, r#"{"msg":"bad jwt"}"#);
        assert!(matches!(err, BackendError::Unauthorized(ref m) if m == "bad jwt"));
    }
}
