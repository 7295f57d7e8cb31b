//! Typed writes against bot records. Each function issues exactly one store call.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::bots::store::{to_patch, BotStore, StoreError};
use crate::graph::exchange::TokenExchangeResult;
use crate::models::bot::InstagramLink;

/// Builds the Instagram patch for a finished exchange.
pub fn instagram_link(result: &TokenExchangeResult, connected_at: DateTime<Utc>) -> InstagramLink {
    InstagramLink {
        instagram_connected: true,
        instagram_access_token: result.access_token.clone(),
        long_lived_token: result.access_token.clone(),
        instagram_token_long_lived: result.long_lived,
        instagram_business_id: result.instagram_business_id.clone(),
        instagram_page_id: result.page_id.clone(),
        instagram_username: result.username.clone(),
        connected_at,
    }
}

/// Writes every Instagram field of the link in one merge.
pub async fn link_instagram(
    store: &dyn BotStore,
    bot_id: &str,
    link: &InstagramLink,
) -> Result<(), StoreError> {
    store.merge(bot_id, to_patch(link)?).await?;
    info!(
        "Linked Instagram account @{} ({}) to bot {bot_id}",
        link.instagram_username, link.instagram_business_id
    );
    Ok(())
}

pub async fn mark_activated(
    store: &dyn BotStore,
    bot_id: &str,
    activated_at: DateTime<Utc>,
) -> Result<(), StoreError> {
    store
        .merge(
            bot_id,
            object(json!({ "isActivated": true, "activationDate": activated_at })),
        )
        .await
}

pub async fn clear_pending_action(store: &dyn BotStore, bot_id: &str) -> Result<(), StoreError> {
    store
        .merge(bot_id, object(json!({ "pendingAction": Value::Null })))
        .await
}

pub async fn set_tone(store: &dyn BotStore, bot_id: &str, tone: u8) -> Result<(), StoreError> {
    store
        .merge(bot_id, object(json!({ "toneValue": tone })))
        .await
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
