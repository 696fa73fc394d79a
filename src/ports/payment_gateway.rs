//! Payment gateway port.
//!
//! The engine only asks the gateway to retry a failed charge and to suspend
//! a subscription's account. Failure events flow the other way through the
//! coordinator.
//!
//! # Design
//!
//! - **Idempotency keys**: every retry carries a key derived from the
//!   campaign step so a re-executed step cannot charge twice
//! - **Transient vs permanent**: adapters classify transport failures as
//!   transient so the campaign is rescheduled rather than advanced

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::foundation::{PaymentId, SubscriptionId};

/// Outcome of a charge retry the gateway actually attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RetryResult {
    Succeeded,
    Failed { failure_reason: String },
}

/// Errors talking to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("gateway unreachable: {0}")]
    Unavailable(String),

    #[error("gateway request timed out")]
    Timeout,

    #[error("gateway rate limit exceeded")]
    RateLimited,

    /// The gateway refused the request (bad credentials, unknown payment).
    #[error("gateway rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl GatewayError {
    /// Transient errors are retried on a later scheduler pass.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Unavailable(_) | GatewayError::Timeout | GatewayError::RateLimited => true,
            GatewayError::Rejected { status, .. } => *status >= 500,
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Retries the failed charge.
    async fn attempt_retry(
        &self,
        payment_id: &PaymentId,
        idempotency_key: &str,
    ) -> Result<RetryResult, GatewayError>;

    /// Suspends service for the subscription's account.
    async fn suspend_account(&self, subscription_id: &SubscriptionId) -> Result<(), GatewayError>;
}
