//! Recording publisher for tests.
//!
//! Keeps every envelope in publish order so tests can assert on a
//! campaign's lifecycle without a broker.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::domain::foundation::{CampaignId, DomainError, ErrorCode, EventEnvelope};
use crate::ports::EventPublisher;

/// ```ignore
/// let bus = Arc::new(InMemoryEventBus::new());
/// coordinator.on_payment_failed(cmd, now).await?;
///
/// assert_eq!(bus.event_types(), ["campaign.created.v1"]);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryEventBus {
    published: Mutex<Vec<EventEnvelope>>,
    failing: AtomicBool,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn published(&self) -> MutexGuard<'_, Vec<EventEnvelope>> {
        self.published.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fails every later publish; the coordinator must still commit.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Event types in publish order.
    pub fn event_types(&self) -> Vec<String> {
        self.published().iter().map(|e| e.event_type.clone()).collect()
    }

    pub fn events_for_campaign(&self, id: &CampaignId) -> Vec<EventEnvelope> {
        let id = id.to_string();
        self.published()
            .iter()
            .filter(|e| e.aggregate_id == id)
            .cloned()
            .collect()
    }

    pub fn has_event(&self, event_type: &str) -> bool {
        self.published().iter().any(|e| e.event_type == event_type)
    }

    pub fn len(&self) -> usize {
        self.published().len()
    }

    pub fn is_empty(&self) -> bool {
        self.published().is_empty()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
        self.publish_all(vec![event]).await
    }

    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), DomainError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DomainError::new(ErrorCode::InternalError, "event bus unavailable"));
        }
        self.published().extend(events);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{EventId, EventMetadata, Timestamp};
    use serde_json::json;

    fn envelope(event_type: &str, campaign: &CampaignId) -> EventEnvelope {
        EventEnvelope {
            event_id: EventId::new(),
            event_type: event_type.to_string(),
            schema_version: 1,
            aggregate_id: campaign.to_string(),
            aggregate_type: "Campaign".to_string(),
            occurred_at: Timestamp::now(),
            payload: json!({}),
            metadata: EventMetadata::default(),
        }
    }

    #[tokio::test]
    async fn keeps_publish_order_per_campaign() {
        let bus = InMemoryEventBus::new();
        let (a, b) = (CampaignId::new(), CampaignId::new());
        bus.publish_all(vec![
            envelope("campaign.created.v1", &a),
            envelope("campaign.created.v1", &b),
            envelope("campaign.completed.v1", &a),
        ])
        .await
        .unwrap();

        assert_eq!(
            bus.event_types(),
            ["campaign.created.v1", "campaign.created.v1", "campaign.completed.v1"]
        );
        let for_a: Vec<_> = bus
            .events_for_campaign(&a)
            .into_iter()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(for_a, ["campaign.created.v1", "campaign.completed.v1"]);
    }

    #[tokio::test]
    async fn failing_bus_stores_nothing() {
        let bus = InMemoryEventBus::new();
        bus.set_failing(true);

        let id = CampaignId::new();
        assert!(bus.publish(envelope("campaign.created.v1", &id)).await.is_err());
        assert!(bus.is_empty());
    }
}
