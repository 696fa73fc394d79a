//! Audit history entries, closing outcomes and queued external signals.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{NodeId, PaymentId, Timestamp};

/// What happened when a history entry was appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    // Node executions
    Started,
    BranchTaken,
    Waiting,
    RetrySucceeded,
    RetryFailed,
    RetrySkipped,
    RetriesExhausted,
    NotificationDelivered,
    NotificationFailed,
    Escalated,
    AccountSuspended,
    WorkflowEnded,

    // Campaign-level entries
    FailureFolded,
    Merged,
    Redirected,
    AccountManagerNotified,
    Recovered,
    SubscriptionCancelled,
    Paused,
    Resumed,
    Rescheduled,
    Cancelled,
}

impl StepOutcome {
    /// Node executions take part in the `(epoch, node, attempt)` idempotency key.
    pub fn is_node_execution(&self) -> bool {
        use StepOutcome::*;
        matches!(
            self,
            Started
                | BranchTaken
                | Waiting
                | RetrySucceeded
                | RetryFailed
                | RetrySkipped
                | RetriesExhausted
                | NotificationDelivered
                | NotificationFailed
                | Escalated
                | AccountSuspended
                | WorkflowEnded
        )
    }
}

/// Immutable history entry. Never modified after append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignStep {
    pub node_id: NodeId,
    /// Workflow routing epoch; bumped by every `set_workflow` redirect.
    pub epoch: u32,
    pub attempt_count: u32,
    pub executed_at: Timestamp,
    pub outcome: StepOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_node_id: Option<NodeId>,
    /// End of the wait this step started, for `waiting` entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_until: Option<Timestamp>,
}

impl CampaignStep {
    pub fn new(
        node_id: NodeId,
        epoch: u32,
        attempt_count: u32,
        outcome: StepOutcome,
        executed_at: Timestamp,
    ) -> Self {
        Self {
            node_id,
            epoch,
            attempt_count,
            executed_at,
            outcome,
            detail: None,
            next_node_id: None,
            wait_until: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_next(mut self, next: NodeId) -> Self {
        self.next_node_id = Some(next);
        self
    }

    pub fn with_wait_until(mut self, until: Timestamp) -> Self {
        self.wait_until = Some(until);
        self
    }
}

/// Why a campaign closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignOutcome {
    Recovered,
    RetriesExhausted,
    AccountSuspended,
    WorkflowEnded,
    SubscriptionCancelled,
    OperatorCancelled,
    Merged,
}

impl CampaignOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignOutcome::Recovered => "recovered",
            CampaignOutcome::RetriesExhausted => "retries_exhausted",
            CampaignOutcome::AccountSuspended => "account_suspended",
            CampaignOutcome::WorkflowEnded => "workflow_ended",
            CampaignOutcome::SubscriptionCancelled => "subscription_cancelled",
            CampaignOutcome::OperatorCancelled => "operator_cancelled",
            CampaignOutcome::Merged => "merged",
        }
    }
}

/// The failed payment a campaign is recovering, refreshed on every fold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSnapshot {
    pub payment_id: PaymentId,
    pub amount_cents: i64,
    pub currency: String,
    pub failure_reason: String,
    pub failure_count: u32,
}

/// Gateway signal queued for the lease holder of a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExternalSignal {
    PaymentFailed {
        payment: PaymentSnapshot,
        received_at: Timestamp,
    },
    PaymentSucceeded {
        payment_id: PaymentId,
        received_at: Timestamp,
    },
    SubscriptionCancelled {
        received_at: Timestamp,
    },
}
