//! Notification dispatcher port.
//!
//! Templates, provider credentials and channel integrations belong to the
//! dispatcher. The engine only names a template, a channel and the merge
//! context to render it with.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::domain::workflow::Channel;

/// One message to deliver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub template_id: String,
    pub channel: Channel,
    /// Evaluation context snapshot plus any action-specific fields.
    pub merge_context: JsonValue,
    /// Stable per campaign step; lets the dispatcher drop redeliveries.
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryResult {
    Delivered,
    /// The dispatcher accepted the request but could not deliver it.
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("dispatcher unreachable: {0}")]
    Unavailable(String),

    #[error("dispatcher request timed out")]
    Timeout,

    #[error("dispatcher rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl DispatchError {
    pub fn is_transient(&self) -> bool {
        match self {
            DispatchError::Unavailable(_) | DispatchError::Timeout => true,
            DispatchError::Rejected { status, .. } => *status >= 500 || *status == 429,
        }
    }
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<DeliveryResult, DispatchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn NotificationDispatcher) {}

    #[test]
    fn throttling_is_transient() {
        assert!(DispatchError::Rejected { status: 429, message: "slow down".into() }.is_transient());
        assert!(!DispatchError::Rejected { status: 400, message: "bad template".into() }.is_transient());
    }
}
