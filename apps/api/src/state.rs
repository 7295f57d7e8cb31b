use std::sync::Arc;

use crate::bots::store::BotStore;
use crate::config::Config;
use crate::graph::GraphClient;
use crate::llm_client::LlmClient;
use crate::webhook::relay::WebhookRelay;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Pluggable record store. Default: PgBotStore.
    pub store: Arc<dyn BotStore>,
    pub graph: GraphClient,
    pub llm: LlmClient,
    pub relay: WebhookRelay,
    pub config: Config,
}

impl AppState {
    /// Wires every upstream client from the one configuration object.
    pub fn new(config: Config, store: Arc<dyn BotStore>) -> Self {
        Self {
            store,
            graph: GraphClient::new(
                config.graph_api_base.clone(),
                config.facebook_app_id.clone(),
                config.facebook_app_secret.clone(),
            ),
            llm: LlmClient::new(config.gemini_api_base.clone(), config.gemini_api_key.clone()),
            relay: WebhookRelay::new(config.webhook_relay_url.clone()),
            config,
        }
    }
}
