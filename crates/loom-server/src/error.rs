use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

pub const MESSAGES_REQUIRED: &str = "Invalid request: messages array required";
pub const MESSAGES_EMPTY: &str = "Invalid request: messages array cannot be empty";
pub const RATE_LIMITED: &str = "Too many requests from this IP, please try again later.";
pub const CHAT_FAILED: &str = "Failed to process chat request";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Too many requests from this IP, please try again later.")]
    RateLimited,

    /// Upstream completion failed; the message is passed through to the client.
    #[error("Failed to process chat request: {0}")]
    Upstream(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(error) => (StatusCode::BAD_REQUEST, json!({ "error": error })),
            ApiError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, json!({ "error": RATE_LIMITED })),
            ApiError::Upstream(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": CHAT_FAILED, "message": message }),
            ),
        };
        (status, Json(body)).into_response()
    }
}
