use axum::body::Bytes;
use axum::extract::State;
use axum::response::Json;
use loom_suggest::{ChatRequest, ChatResponse};
use serde_json::Value;
use tracing::{debug, error};

use crate::app::AppState;
use crate::error::{ApiError, MESSAGES_EMPTY, MESSAGES_REQUIRED};

/// Forward a conversation upstream. The body is read as loose JSON first so
/// shape errors map to the documented 400 messages instead of a generic rejection.
pub async fn chat(State(state): State<AppState>, body: Bytes) -> Result<Json<ChatResponse>, ApiError> {
    let value: Value =
        serde_json::from_slice(&body).map_err(|_| ApiError::BadRequest(MESSAGES_REQUIRED.to_string()))?;

    match value.get("messages").and_then(Value::as_array) {
        None => return Err(ApiError::BadRequest(MESSAGES_REQUIRED.to_string())),
        Some(messages) if messages.is_empty() => return Err(ApiError::BadRequest(MESSAGES_EMPTY.to_string())),
        Some(_) => {}
    }

    let request: ChatRequest =
        serde_json::from_value(value).map_err(|e| ApiError::BadRequest(format!("Invalid request: {}", e)))?;
    debug!(
        "chat request with {} messages",
        request.messages.as_ref().map_or(0, Vec::len)
    );

    let response = loom_suggest::chat(state.client.as_ref(), &request)
        .await
        .map_err(|e| {
            error!("chat endpoint error: {}", e);
            ApiError::Upstream(e.to_string())
        })?;

    Ok(Json(response))
}
