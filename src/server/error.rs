//! HTTP Error Responses
//!
//! All failures cross the wire as `{"error": message}`. Parse, validation
//! and execution failures map to 400 with a short remediation hint;
//! admission-gate rejection maps to 503.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::engine::ValidationError;
use crate::execution::ExecutionError;

/// An error response with its HTTP status.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn overloaded(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<ExecutionError> for ApiError {
    fn from(err: ExecutionError) -> Self {
        let hint = match &err {
            ExecutionError::Timeout(_) => "narrow the query or request a smaller window",
            ExecutionError::Resource(_) => "add more selective patterns or lower the limit",
        };
        ApiError::bad_request(format!("{err}; {hint}"))
    }
}
