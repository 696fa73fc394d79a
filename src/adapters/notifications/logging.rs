use async_trait::async_trait;

use crate::ports::{DeliveryResult, DispatchError, Notification, NotificationDispatcher};

/// Logs each notification and reports it delivered.
#[derive(Debug, Default, Clone)]
pub struct LoggingDispatcher;

impl LoggingDispatcher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationDispatcher for LoggingDispatcher {
    async fn send(&self, notification: &Notification) -> Result<DeliveryResult, DispatchError> {
        tracing::info!(
            template_id = %notification.template_id,
            channel = %notification.channel,
            idempotency_key = %notification.idempotency_key,
            "notification (not delivered, logging dispatcher)"
        );
        Ok(DeliveryResult::Delivered)
    }
}
