//! Shared fixtures for router-level tests.

use std::sync::Arc;

use axum::response::Response;
use httpmock::MockServer;

use crate::bots::store::BotStore;
use crate::config::{test_config, Config};
use crate::state::AppState;

/// Test config with every upstream pointed at the mock server.
pub fn graph_config(server: &MockServer) -> Config {
    Config {
        graph_api_base: server.base_url(),
        gemini_api_base: server.base_url(),
        ..test_config()
    }
}

pub fn state_with(config: Config, store: Arc<dyn BotStore>) -> AppState {
    AppState::new(config, store)
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}
