//! In-memory `BotStore` used by handler tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::bots::store::{
    record_from_document, BotStore, ChangeCallback, StoreError, SubscriptionHandle, ToggleField,
};
use crate::models::bot::BotRecord;

pub struct InMemoryBotStore {
    documents: Mutex<HashMap<String, Value>>,
    changes: broadcast::Sender<(String, Value)>,
    writes: AtomicUsize,
}

impl Default for InMemoryBotStore {
    fn default() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            documents: Mutex::new(HashMap::new()),
            changes,
            writes: AtomicUsize::new(0),
        }
    }
}

impl InMemoryBotStore {
    pub fn with_document(bot_id: &str, document: Value) -> Self {
        let store = Self::default();
        store.insert_document(bot_id, document);
        store
    }

    pub fn insert_document(&self, bot_id: &str, document: Value) {
        self.documents
            .lock()
            .unwrap()
            .insert(bot_id.to_string(), document.clone());
        let _ = self.changes.send((bot_id.to_string(), document));
    }

    pub fn document(&self, bot_id: &str) -> Option<Value> {
        self.documents.lock().unwrap().get(bot_id).cloned()
    }

    /// Number of successful write operations since creation (seeding excluded).
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn update<F>(&self, bot_id: &str, apply: F) -> Result<Value, StoreError>
    where
        F: FnOnce(&mut Map<String, Value>),
    {
        let updated = {
            let mut documents = self.documents.lock().unwrap();
            let document = documents
                .get_mut(bot_id)
                .ok_or_else(|| StoreError::NotFound(bot_id.to_string()))?;
            let object = document.as_object_mut().ok_or(StoreError::InvalidPatch)?;
            apply(object);
            document.clone()
        };
        self.writes.fetch_add(1, Ordering::SeqCst);
        let _ = self.changes.send((bot_id.to_string(), updated.clone()));
        Ok(updated)
    }
}

#[async_trait]
impl BotStore for InMemoryBotStore {
    async fn get(&self, bot_id: &str) -> Result<Option<BotRecord>, StoreError> {
        self.document(bot_id)
            .map(|doc| record_from_document(bot_id, doc))
            .transpose()
    }

    async fn merge(&self, bot_id: &str, patch: Map<String, Value>) -> Result<(), StoreError> {
        self.update(bot_id, |object| object.extend(patch))?;
        Ok(())
    }

    async fn toggle(&self, bot_id: &str, field: ToggleField) -> Result<bool, StoreError> {
        let key = field.document_key();
        let updated = self.update(bot_id, |object| {
            let current = object.get(key).and_then(Value::as_bool).unwrap_or(false);
            object.insert(key.to_string(), Value::Bool(!current));
        })?;
        Ok(updated[key].as_bool().unwrap_or(false))
    }

    async fn append_observation(&self, bot_id: &str, observation: &str) -> Result<(), StoreError> {
        self.update(bot_id, |object| {
            let list = object
                .entry("learnedObservations")
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(items) = list {
                items.push(Value::String(observation.to_string()));
            }
        })?;
        Ok(())
    }

    async fn append_knowledge(&self, bot_id: &str, text: &str) -> Result<(), StoreError> {
        self.update(bot_id, |object| {
            let mut knowledge = object
                .get("knowledgeBase")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            knowledge.push_str(text);
            object.insert("knowledgeBase".to_string(), Value::String(knowledge));
        })?;
        Ok(())
    }

    async fn subscribe(
        &self,
        bot_id: &str,
        on_change: ChangeCallback,
    ) -> Result<SubscriptionHandle, StoreError> {
        let mut changes = self.changes.subscribe();
        let initial = self.get(bot_id).await?;
        let bot_id = bot_id.to_string();

        let task = tokio::spawn(async move {
            if let Some(record) = initial {
                on_change(record);
            }
            loop {
                match changes.recv().await {
                    Ok((changed, doc)) if changed == bot_id => {
                        if let Ok(record) = record_from_document(&bot_id, doc) {
                            on_change(record);
                        }
                    }
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(SubscriptionHandle::new(task))
    }
}
