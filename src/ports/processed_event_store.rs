//! ProcessedEventStore port - Interface for tracking processed events.
//!
//! Gateways redeliver events. The coordinator records each inbound event's
//! deduplication key here so a redelivered `PaymentFailed` does not count as
//! a second failure.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EventId, Timestamp};

/// Port for tracking which events have been processed by which handlers.
///
/// Each handler has its own processing record, allowing different handlers
/// to process the same event independently.
///
/// # Example
///
/// ```ignore
/// // Claim before handling; a false return means a duplicate
/// if !store.mark_processed(&event_id, "payment_failed").await? {
///     return Ok(Outcome::Duplicate);
/// }
/// ```
#[async_trait]
pub trait ProcessedEventStore: Send + Sync {
    /// Check if an event has been processed by a specific handler.
    async fn contains(&self, event_id: &EventId, handler_name: &str) -> Result<bool, DomainError>;

    /// Mark an event as processed by a specific handler.
    ///
    /// Returns `false` if it was already marked. Atomic, so two concurrent
    /// deliveries of one event see exactly one `true`.
    async fn mark_processed(&self, event_id: &EventId, handler_name: &str) -> Result<bool, DomainError>;

    /// Removes the mark, used when handling fails after the claim.
    async fn unmark(&self, event_id: &EventId, handler_name: &str) -> Result<(), DomainError>;

    /// Delete entries recorded before `timestamp`. Returns the number deleted.
    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn ProcessedEventStore) {}
}
