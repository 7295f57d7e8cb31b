pub mod health;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::config::OAUTH_CALLBACK_PATH;
use crate::dashboard::handlers as dashboard;
use crate::llm_client::handlers as prompt;
use crate::oauth::handlers as oauth;
use crate::state::AppState;
use crate::webhook::handlers as webhook;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Serverless-style handlers
        .route(
            "/api/gemini",
            post(prompt::handle_prompt).fallback(webhook::method_not_allowed),
        )
        .route(OAUTH_CALLBACK_PATH, get(oauth::handle_oauth_callback))
        .route(
            "/api/webhook",
            get(webhook::handle_verification)
                .post(webhook::handle_delivery)
                .fallback(webhook::method_not_allowed),
        )
        // Owner dashboard
        .route("/api/bots/:id/view", get(dashboard::handle_get_view))
        .route("/api/bots/:id/activate", post(dashboard::handle_activate))
        .route(
            "/api/bots/:id/status/toggle",
            post(dashboard::handle_toggle_status),
        )
        .route(
            "/api/bots/:id/listening/toggle",
            post(dashboard::handle_toggle_listening),
        )
        .route("/api/bots/:id/tone", put(dashboard::handle_set_tone))
        .route("/api/bots/:id/commands", post(dashboard::handle_send_command))
        .route(
            "/api/bots/:id/knowledge",
            post(dashboard::handle_upload_knowledge),
        )
        .route(
            "/api/bots/:id/pending-action",
            delete(dashboard::handle_dismiss_alert),
        )
        .route("/api/bots/:id/alerts", get(dashboard::handle_alert_stream))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use httpmock::prelude::*;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::bots::memory::InMemoryBotStore;
    use crate::config::test_config;
    use crate::llm_client::handlers::RELAY_FAILURE_MESSAGE;
    use crate::test_support::{body_json, body_text, graph_config, state_with};
    use crate::webhook::handlers::EVENT_RECEIVED;

    fn router_with(config: crate::config::Config) -> Router {
        build_router(state_with(config, Arc::new(InMemoryBotStore::default())))
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = router_with(test_config())
            .oneshot(get_request("/health"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_webhook_handshake_echoes_challenge() {
        let response = router_with(test_config())
            .oneshot(get_request(
                "/api/webhook?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=CHALLENGE_ACCEPTED",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "CHALLENGE_ACCEPTED");
    }

    #[tokio::test]
    async fn test_webhook_handshake_with_wrong_token_is_403() {
        let response = router_with(test_config())
            .oneshot(get_request(
                "/api/webhook?hub.mode=subscribe&hub.verify_token=guess&hub.challenge=123",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_text(response).await, "Verification failed");
    }

    #[tokio::test]
    async fn test_webhook_delivery_acknowledges_even_if_relay_is_down() {
        let config = crate::config::Config {
            webhook_relay_url: Some("http://127.0.0.1:1/relay".to_string()),
            ..test_config()
        };
        let response = router_with(config)
            .oneshot(
                Request::post("/api/webhook")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"object":"instagram","entry":[]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, EVENT_RECEIVED);
    }

    #[tokio::test]
    async fn test_webhook_delivery_is_relayed_verbatim() {
        let server = MockServer::start();
        let payload = r#"{"object":"page","entry":[{"id":"42","messaging":[]}]}"#;
        let relay = server.mock(|when, then| {
            when.method(POST).path("/internal/webhook").body(payload);
            then.status(200);
        });
        let config = crate::config::Config {
            webhook_relay_url: Some(server.url("/internal/webhook")),
            ..test_config()
        };

        let response = router_with(config)
            .oneshot(
                Request::post("/api/webhook")
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // The relay is not awaited by the handler; give the detached task a moment.
        for _ in 0..50 {
            if relay.calls() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        relay.assert_calls(1);
    }

    #[tokio::test]
    async fn test_webhook_other_methods_are_405() {
        let response = router_with(test_config())
            .oneshot(
                Request::builder()
                    .method(Method::PUT)
                    .uri("/api/webhook")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body_text(response).await, "Method Not Allowed");
    }

    #[tokio::test]
    async fn test_prompt_relay_returns_upstream_json() {
        let server = MockServer::start();
        let upstream = json!({ "candidates": [{ "content": { "parts": [{ "text": "ok" }] } }] });
        server.mock(|when, then| {
            when.method(POST).path("/models/gemini-1.5-flash:generateContent");
            then.status(200).json_body(upstream.clone());
        });

        let response = router_with(graph_config(&server))
            .oneshot(
                Request::post("/api/gemini")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"prompt":"hello"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, upstream);
    }

    #[tokio::test]
    async fn test_prompt_relay_masks_upstream_errors() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/models/gemini-1.5-flash:generateContent");
            then.status(403).json_body(json!({
                "error": { "code": 403, "message": "Method doesn't allow unregistered callers" }
            }));
        });

        let response = router_with(graph_config(&server))
            .oneshot(
                Request::post("/api/gemini")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"prompt":"hello"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({ "error": RELAY_FAILURE_MESSAGE })
        );
    }

    #[tokio::test]
    async fn test_prompt_relay_masks_malformed_requests() {
        let server = MockServer::start();
        let upstream = server.mock(|when, then| {
            when.any_request();
            then.status(200).json_body(json!({}));
        });

        let requests = [
            // Missing `prompt`.
            Request::post("/api/gemini")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
            // No content type.
            Request::post("/api/gemini")
                .body(Body::from(r#"{"prompt":"hello"}"#))
                .unwrap(),
            // Not JSON at all.
            Request::post("/api/gemini")
                .header("content-type", "application/json")
                .body(Body::from("prompt=hello"))
                .unwrap(),
        ];

        for request in requests {
            let response = router_with(graph_config(&server))
                .oneshot(request)
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(
                body_json(response).await,
                json!({ "error": RELAY_FAILURE_MESSAGE })
            );
        }
        upstream.assert_calls(0);
    }
}
