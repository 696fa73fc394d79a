use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::ports::{DeliveryResult, DispatchError, Notification, NotificationDispatcher};

#[derive(Debug, Default)]
struct RecordingState {
    script: VecDeque<Result<DeliveryResult, DispatchError>>,
    sent: Vec<Notification>,
    attempts: usize,
}

/// Dispatcher double. Unscripted sends are delivered.
///
/// Only sends that returned `Ok` are kept in the send log.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    state: Mutex<RecordingState>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push_result(&self, result: Result<DeliveryResult, DispatchError>) {
        self.state().script.push_back(result);
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.state().sent.clone()
    }

    pub fn sent_count(&self) -> usize {
        self.state().sent.len()
    }

    /// Sent notifications rendered from `template_id`.
    pub fn sent_with_template(&self, template_id: &str) -> Vec<Notification> {
        self.state()
            .sent
            .iter()
            .filter(|n| n.template_id == template_id)
            .cloned()
            .collect()
    }

    /// Every call, including those that returned an error.
    pub fn attempts(&self) -> usize {
        self.state().attempts
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn send(&self, notification: &Notification) -> Result<DeliveryResult, DispatchError> {
        let mut state = self.state();
        state.attempts += 1;
        let result = state.script.pop_front().unwrap_or(Ok(DeliveryResult::Delivered));
        if result.is_ok() {
            state.sent.push(notification.clone());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::Channel;
    use serde_json::json;

    fn notification(template: &str) -> Notification {
        Notification {
            template_id: template.into(),
            channel: Channel::Email,
            merge_context: json!({}),
            idempotency_key: "c:0:n:1".into(),
        }
    }

    #[tokio::test]
    async fn errors_are_not_logged_as_sent() {
        let d = RecordingDispatcher::new();
        d.push_result(Err(DispatchError::Timeout));

        assert!(d.send(&notification("payment_failed")).await.is_err());
        assert_eq!(d.send(&notification("payment_failed")).await, Ok(DeliveryResult::Delivered));

        assert_eq!(d.attempts(), 2);
        assert_eq!(d.sent_count(), 1);
        assert_eq!(d.sent_with_template("payment_failed").len(), 1);
    }
}
