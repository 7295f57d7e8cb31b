//! LLM Client: the single point of entry for all Gemini API calls.
//!
//! No other module may call the generative-language API directly.
//!
//! Model: gemini-1.5-flash (hardcoded, not configurable)

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub mod handlers;

/// The model used for every relayed prompt.
pub const MODEL: &str = "gemini-1.5-flash";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl LlmClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
        }
    }

    /// Sends a single-turn user prompt and returns the upstream JSON untouched.
    /// A body carrying an `error` object is reported as `LlmError::Api`.
    pub async fn generate_raw(&self, prompt: &str) -> Result<Value, LlmError> {
        let request_body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
        };

        let url = format!("{}/models/{}:generateContent", self.base_url, MODEL);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request_body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        let value: Value = serde_json::from_str(&body)?;

        if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(LlmError::Api { status, message });
        }

        debug!("Gemini call succeeded: status={status}, bytes={}", body.len());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_generate_raw_wraps_prompt_and_returns_body_verbatim() {
        let server = MockServer::start();
        let upstream = json!({
            "candidates": [{ "content": { "parts": [{ "text": "Marhaba!" }], "role": "model" } }],
            "usageMetadata": { "totalTokenCount": 7 }
        });
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/models/gemini-1.5-flash:generateContent")
                .query_param("key", "k-1")
                .json_body(json!({
                    "contents": [{ "role": "user", "parts": [{ "text": "say hi" }] }]
                }));
            then.status(200).json_body(upstream.clone());
        });

        let client = LlmClient::new(server.base_url(), "k-1".to_string());
        let value = client.generate_raw("say hi").await.unwrap();

        mock.assert();
        assert_eq!(value, upstream);
    }

    #[tokio::test]
    async fn test_generate_raw_reports_embedded_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/models/gemini-1.5-flash:generateContent");
            then.status(400).json_body(json!({
                "error": { "code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT" }
            }));
        });

        let client = LlmClient::new(server.base_url(), "bad".to_string());
        let err = client.generate_raw("x").await.unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 400, ref message } if message == "API key not valid."));
    }
}
