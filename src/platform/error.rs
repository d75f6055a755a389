//! Errors from platform REST calls

use reqwest::{Response, StatusCode};
use serde::Deserialize;
use thiserror::Error;

use crate::auth::AuthError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Could not obtain a usable access token
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The platform rejected the bearer token (HTTP 401)
    #[error("access token rejected by the platform")]
    Unauthorized,

    #[error("not found: {0}")]
    NotFound(String),

    /// Connection, timeout or body transfer failure
    #[error("network error: {0}")]
    Network(String),

    #[error("API error {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Error envelope used by both Spotify (`{"error": {"status", "message"}}`)
/// and Google (`{"error": {"code", "message"}}`)
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Turn a non-success response into the matching `ApiError`
pub async fn check_response(response: Response, what: &str) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
        StatusCode::NOT_FOUND => Err(ApiError::NotFound(what.to_string())),
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            })
        }
    }
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) if !envelope.error.message.is_empty() => envelope.error.message,
        _ if body.trim().is_empty() => "no response body".to_string(),
        _ => body.trim().to_string(),
    }
}
