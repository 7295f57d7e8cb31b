//! Messaging-platform webhook: verification handshake and event deliveries.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::state::AppState;

pub const EVENT_RECEIVED: &str = "EVENT_RECEIVED";

#[derive(Debug, Default, Deserialize)]
pub struct VerificationQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Whether a handshake should be answered with its challenge.
pub fn is_valid_handshake(query: &VerificationQuery, expected_token: &str) -> bool {
    query.mode.as_deref() == Some("subscribe")
        && query.verify_token.as_deref() == Some(expected_token)
}

/// GET /api/webhook
pub async fn handle_verification(
    State(state): State<AppState>,
    Query(query): Query<VerificationQuery>,
) -> (StatusCode, String) {
    if is_valid_handshake(&query, &state.config.meta_verify_token) {
        info!("Webhook verification succeeded");
        (StatusCode::OK, query.challenge.unwrap_or_default())
    } else {
        warn!(
            "Webhook verification failed (mode: {:?})",
            query.mode.as_deref()
        );
        (StatusCode::FORBIDDEN, "Verification failed".to_string())
    }
}

/// POST /api/webhook
///
/// Always acknowledges. The relay copy is dispatched before answering but
/// never awaited.
pub async fn handle_delivery(State(state): State<AppState>, body: Bytes) -> (StatusCode, &'static str) {
    match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(payload) => info!(
            "Webhook received: {}",
            serde_json::to_string_pretty(&payload).unwrap_or_default()
        ),
        Err(_) => warn!("Webhook received non-JSON payload ({} bytes)", body.len()),
    }

    state.relay.dispatch(body);

    (StatusCode::OK, EVENT_RECEIVED)
}

pub async fn method_not_allowed() -> (StatusCode, &'static str) {
    (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
}
