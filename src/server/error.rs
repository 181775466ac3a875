use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::types::ErrorBody;

pub const CONTENT_VIOLATION: &str = "CONTENT_VIOLATION";
pub const MESSAGE_LIMIT_EXCEEDED: &str = "MESSAGE_LIMIT_EXCEEDED";
pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";

/// Every non-2xx answer the server gives, rendered as a JSON body.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    MethodNotAllowed,
    BadRequest(String),
    ContentViolation,
    MessageLimitExceeded,
    RateLimited,
    NotConfigured,
    Upstream(String),
    ImageFailed(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::BadRequest(_)
            | ApiError::ContentViolation
            | ApiError::MessageLimitExceeded => StatusCode::BAD_REQUEST,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotConfigured | ApiError::Upstream(_) | ApiError::ImageFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn body(self) -> ErrorBody {
        let (error, code, success) = match self {
            ApiError::MethodNotAllowed => ("Method not allowed".to_string(), None, None),
            ApiError::BadRequest(message) => (message, None, None),
            ApiError::ContentViolation => (
                "Message content violates usage guidelines.".to_string(),
                Some(CONTENT_VIOLATION),
                None,
            ),
            ApiError::MessageLimitExceeded => (
                "Message limit reached for this conversation. Please start a new chat.".to_string(),
                Some(MESSAGE_LIMIT_EXCEEDED),
                None,
            ),
            ApiError::RateLimited => (
                "Too many requests. Please slow down and try again in a minute.".to_string(),
                Some(RATE_LIMIT_EXCEEDED),
                None,
            ),
            ApiError::NotConfigured => ("API key not configured".to_string(), None, None),
            ApiError::Upstream(message) => (format!("API Error: {}", message), None, None),
            ApiError::ImageFailed(message) => (message, None, Some(false)),
        };
        ErrorBody {
            error,
            code: code.map(str::to_string),
            success,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = ?self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = ?self, "Request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}
