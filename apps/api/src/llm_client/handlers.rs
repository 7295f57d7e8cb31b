//! Prompt relay endpoint.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::state::AppState;

/// Returned for every relay failure. Upstream detail stays in the logs.
pub const RELAY_FAILURE_MESSAGE: &str = "Failed to call Gemini API";

#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    pub prompt: String,
}

/// POST /api/gemini
///
/// Forwards the prompt and answers with the upstream JSON as-is. Malformed
/// requests get the same masked failure as upstream errors.
pub async fn handle_prompt(
    State(state): State<AppState>,
    request: Result<Json<PromptRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match request {
        Ok(request) => request,
        Err(rejection) => {
            tracing::error!("Rejected prompt request: {}", rejection.body_text());
            return relay_failure();
        }
    };

    match state.llm.generate_raw(&request.prompt).await {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(e) => {
            tracing::error!("Gemini API error: {e}");
            relay_failure()
        }
    }
}

fn relay_failure() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": RELAY_FAILURE_MESSAGE })),
    )
        .into_response()
}
