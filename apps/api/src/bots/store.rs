//! Record store abstraction for bot documents.
//!
//! `AppState` holds an `Arc<dyn BotStore>`. Production uses `PgBotStore`
//! (JSONB documents + LISTEN/NOTIFY); tests use the in-memory double.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::models::bot::BotRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bot {0} not found")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("document error: {0}")]
    Document(#[from] serde_json::Error),

    #[error("merge patch must be a JSON object")]
    InvalidPatch,
}

/// Boolean switches the owner can flip from the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleField {
    Active,
    Listening,
}

impl ToggleField {
    pub fn document_key(self) -> &'static str {
        match self {
            ToggleField::Active => "isActive",
            ToggleField::Listening => "isListening",
        }
    }
}

/// Invoked with an owned snapshot every time the subscribed record changes,
/// and once with the current state right after subscribing.
pub type ChangeCallback = Box<dyn Fn(BotRecord) + Send + Sync + 'static>;

#[async_trait]
pub trait BotStore: Send + Sync {
    async fn get(&self, bot_id: &str) -> Result<Option<BotRecord>, StoreError>;

    /// Shallow-merges `patch` into the record in a single write.
    /// Keys absent from the patch are left untouched.
    async fn merge(&self, bot_id: &str, patch: Map<String, Value>) -> Result<(), StoreError>;

    /// Flips a boolean field atomically and returns its new value.
    async fn toggle(&self, bot_id: &str, field: ToggleField) -> Result<bool, StoreError>;

    async fn append_observation(&self, bot_id: &str, observation: &str) -> Result<(), StoreError>;

    async fn append_knowledge(&self, bot_id: &str, text: &str) -> Result<(), StoreError>;

    async fn subscribe(
        &self,
        bot_id: &str,
        on_change: ChangeCallback,
    ) -> Result<SubscriptionHandle, StoreError>;
}

/// Keeps a record subscription alive. Dropping the handle cancels it.
#[derive(Debug)]
pub struct SubscriptionHandle {
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    pub fn cancel(self) {
        // Drop does the work.
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Builds a `BotRecord` from a stored document, stamping the id onto it.
pub fn record_from_document(bot_id: &str, document: Value) -> Result<BotRecord, StoreError> {
    let mut record: BotRecord = serde_json::from_value(document)?;
    record.id = bot_id.to_string();
    Ok(record)
}

/// Converts any serializable struct into a merge patch.
pub fn to_patch<T: serde::Serialize>(value: &T) -> Result<Map<String, Value>, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::InvalidPatch),
    }
}
