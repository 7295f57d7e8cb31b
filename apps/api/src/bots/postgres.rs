use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::bots::store::{
    record_from_document, BotStore, ChangeCallback, StoreError, SubscriptionHandle, ToggleField,
};
use crate::models::bot::BotRecord;

/// NOTIFY channel fed by the `bots_notify_change` trigger. Payload is the bot id.
pub const CHANGE_CHANNEL: &str = "bot_changes";

/// Buffered bot ids between the listener and slow subscribers.
const CHANGE_BUFFER: usize = 256;

/// Bot documents stored as one JSONB column per row.
///
/// Every write is a single UPDATE statement, so a merge is all-or-nothing.
/// One `PgListener` per store feeds every subscription; subscribers never hold
/// a pool connection while they wait.
#[derive(Clone)]
pub struct PgBotStore {
    pool: PgPool,
    changes: broadcast::Sender<String>,
}

impl PgBotStore {
    /// Starts listening on `bot_changes` and returns the store.
    pub async fn connect(pool: PgPool) -> Result<Self, StoreError> {
        let mut listener = PgListener::connect_with(&pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;

        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        tokio::spawn(forward_changes(listener, changes.clone()));
        info!("Listening for bot changes on '{CHANGE_CHANNEL}'");

        Ok(Self { pool, changes })
    }
}

/// Relays NOTIFY payloads into the broadcast channel until every sender is gone.
async fn forward_changes(mut listener: PgListener, changes: broadcast::Sender<String>) {
    loop {
        match listener.recv().await {
            Ok(notification) => {
                // No receivers just means no open alert streams.
                let _ = changes.send(notification.payload().to_string());
            }
            Err(e) => {
                warn!("Bot change listener error: {e}; retrying");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

async fn fetch_record(pool: &PgPool, bot_id: &str) -> Result<Option<BotRecord>, StoreError> {
    let document: Option<Value> = sqlx::query_scalar("SELECT data FROM bots WHERE id = $1")
        .bind(bot_id)
        .fetch_optional(pool)
        .await?;

    document
        .map(|doc| record_from_document(bot_id, doc))
        .transpose()
}

#[async_trait]
impl BotStore for PgBotStore {
    async fn get(&self, bot_id: &str) -> Result<Option<BotRecord>, StoreError> {
        fetch_record(&self.pool, bot_id).await
    }

    async fn merge(&self, bot_id: &str, patch: Map<String, Value>) -> Result<(), StoreError> {
        let keys: Vec<String> = patch.keys().cloned().collect();
        let result = sqlx::query(
            "UPDATE bots SET data = data || $2::jsonb, updated_at = now() WHERE id = $1",
        )
        .bind(bot_id)
        .bind(Value::Object(patch))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(bot_id.to_string()));
        }

        debug!("Merged fields {keys:?} into bot {bot_id}");
        Ok(())
    }

    async fn toggle(&self, bot_id: &str, field: ToggleField) -> Result<bool, StoreError> {
        let value: Option<bool> = sqlx::query_scalar(
            r#"
            UPDATE bots
            SET data = jsonb_set(
                    data,
                    ARRAY[$2::text],
                    to_jsonb(NOT COALESCE((data->>$2::text)::boolean, false))
                ),
                updated_at = now()
            WHERE id = $1
            RETURNING (data->>$2::text)::boolean
            "#,
        )
        .bind(bot_id)
        .bind(field.document_key())
        .fetch_optional(&self.pool)
        .await?;

        value.ok_or_else(|| StoreError::NotFound(bot_id.to_string()))
    }

    async fn append_observation(&self, bot_id: &str, observation: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE bots
            SET data = jsonb_set(
                    data,
                    '{learnedObservations}',
                    COALESCE(data->'learnedObservations', '[]'::jsonb) || to_jsonb($2::text)
                ),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(bot_id)
        .bind(observation)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(bot_id.to_string()));
        }
        Ok(())
    }

    async fn append_knowledge(&self, bot_id: &str, text: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE bots
            SET data = jsonb_set(
                    data,
                    '{knowledgeBase}',
                    to_jsonb(COALESCE(data->>'knowledgeBase', '') || $2::text)
                ),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(bot_id)
        .bind(text)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(bot_id.to_string()));
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        bot_id: &str,
        on_change: ChangeCallback,
    ) -> Result<SubscriptionHandle, StoreError> {
        let mut changes = self.changes.subscribe();
        let pool = self.pool.clone();
        let bot_id = bot_id.to_string();
        debug!("Subscribed to changes for bot {bot_id}");

        let task = tokio::spawn(async move {
            match fetch_record(&pool, &bot_id).await {
                Ok(Some(record)) => on_change(record),
                Ok(None) => warn!("Subscribed bot {bot_id} does not exist yet"),
                Err(e) => warn!("Initial snapshot for bot {bot_id} failed: {e}"),
            }

            loop {
                match changes.recv().await {
                    Ok(changed) if changed == bot_id => {}
                    Ok(_) => continue,
                    // Missed notifications may include ours; reload to catch up.
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Subscription for bot {bot_id} lagged by {skipped}");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
                match fetch_record(&pool, &bot_id).await {
                    Ok(Some(record)) => on_change(record),
                    Ok(None) => {}
                    Err(e) => warn!("Reloading bot {bot_id} after change failed: {e}"),
                }
            }
        });

        Ok(SubscriptionHandle::new(task))
    }
}
