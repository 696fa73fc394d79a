use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::domain::foundation::{DomainError, EventId, Timestamp};
use crate::ports::ProcessedEventStore;

/// In-memory dedupe ledger keyed by `(event_id, handler)`.
#[derive(Debug, Default)]
pub struct InMemoryProcessedEventStore {
    processed: Mutex<HashMap<(String, String), Timestamp>>,
}

impl InMemoryProcessedEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn key(event_id: &EventId, handler_name: &str) -> (String, String) {
    (event_id.as_str().to_string(), handler_name.to_string())
}

#[async_trait]
impl ProcessedEventStore for InMemoryProcessedEventStore {
    async fn contains(&self, event_id: &EventId, handler_name: &str) -> Result<bool, DomainError> {
        Ok(self.processed.lock().await.contains_key(&key(event_id, handler_name)))
    }

    async fn mark_processed(&self, event_id: &EventId, handler_name: &str) -> Result<bool, DomainError> {
        let mut processed = self.processed.lock().await;
        let key = key(event_id, handler_name);
        if processed.contains_key(&key) {
            return Ok(false);
        }
        processed.insert(key, Timestamp::now());
        Ok(true)
    }

    async fn unmark(&self, event_id: &EventId, handler_name: &str) -> Result<(), DomainError> {
        self.processed.lock().await.remove(&key(event_id, handler_name));
        Ok(())
    }

    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError> {
        let mut processed = self.processed.lock().await;
        let before = processed.len();
        processed.retain(|_, at| !at.is_before(&timestamp));
        Ok((before - processed.len()) as u64)
    }
}
