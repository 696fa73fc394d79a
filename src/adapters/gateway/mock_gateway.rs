//! Mock payment gateway for testing.
//!
//! Retry results are scripted in order; once the script runs out every
//! retry fails with `insufficient_funds`.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::domain::foundation::{PaymentId, SubscriptionId};
use crate::ports::{GatewayError, PaymentGateway, RetryResult};

/// Recorded `attempt_retry` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryCall {
    pub payment_id: PaymentId,
    pub idempotency_key: String,
}

#[derive(Debug, Default)]
struct MockState {
    retry_script: VecDeque<Result<RetryResult, GatewayError>>,
    retry_calls: Vec<RetryCall>,
    suspended: Vec<SubscriptionId>,
    suspend_error: Option<GatewayError>,
}

#[derive(Debug, Default)]
pub struct MockPaymentGateway {
    state: Mutex<MockState>,
    latency: Option<Duration>,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every retry, keeping the caller's lease held meanwhile.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Queues the result of the next unscripted retry.
    pub fn push_retry(&self, result: Result<RetryResult, GatewayError>) {
        self.state().retry_script.push_back(result);
    }

    /// Makes the next `suspend_account` call fail.
    pub fn fail_suspend(&self, error: GatewayError) {
        self.state().suspend_error = Some(error);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Assertions
    // ════════════════════════════════════════════════════════════════════════════

    pub fn retry_calls(&self) -> Vec<RetryCall> {
        self.state().retry_calls.clone()
    }

    pub fn suspended(&self) -> Vec<SubscriptionId> {
        self.state().suspended.clone()
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn attempt_retry(
        &self,
        payment_id: &PaymentId,
        idempotency_key: &str,
    ) -> Result<RetryResult, GatewayError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state();
        state.retry_calls.push(RetryCall {
            payment_id: payment_id.clone(),
            idempotency_key: idempotency_key.to_string(),
        });
        state.retry_script.pop_front().unwrap_or_else(|| {
            Ok(RetryResult::Failed {
                failure_reason: "insufficient_funds".to_string(),
            })
        })
    }

    async fn suspend_account(&self, subscription_id: &SubscriptionId) -> Result<(), GatewayError> {
        let mut state = self.state();
        if let Some(error) = state.suspend_error.take() {
            return Err(error);
        }
        state.suspended.push(subscription_id.clone());
        Ok(())
    }
}
