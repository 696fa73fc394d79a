//! Campaign domain events.
//!
//! Buffered on the aggregate while it changes and published by the
//! coordinator only after the change is committed.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    CampaignId, EventEnvelope, EventId, NodeId, RuleId, SubscriptionId, Timestamp, WorkflowId,
};
use crate::domain_event;

use super::{CampaignOutcome, StepOutcome};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignCreated {
    pub event_id: EventId,
    pub campaign_id: CampaignId,
    pub subscription_id: SubscriptionId,
    pub workflow_id: WorkflowId,
    pub workflow_version: u32,
    pub matched_rule: Option<RuleId>,
    pub created_at: Timestamp,
}

domain_event!(
    CampaignCreated,
    event_type = "campaign.created.v1",
    aggregate_id = campaign_id,
    aggregate_type = "Campaign",
    occurred_at = created_at,
    event_id = event_id
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignStepExecuted {
    pub event_id: EventId,
    pub campaign_id: CampaignId,
    pub node_id: NodeId,
    pub outcome: StepOutcome,
    pub attempt_count: u32,
    pub executed_at: Timestamp,
}

domain_event!(
    CampaignStepExecuted,
    event_type = "campaign.step_executed.v1",
    aggregate_id = campaign_id,
    aggregate_type = "Campaign",
    occurred_at = executed_at,
    event_id = event_id
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignEscalated {
    pub event_id: EventId,
    pub campaign_id: CampaignId,
    pub node_id: Option<NodeId>,
    pub escalated_at: Timestamp,
}

domain_event!(
    CampaignEscalated,
    event_type = "campaign.escalated.v1",
    aggregate_id = campaign_id,
    aggregate_type = "Campaign",
    occurred_at = escalated_at,
    event_id = event_id
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignCompleted {
    pub event_id: EventId,
    pub campaign_id: CampaignId,
    pub outcome: CampaignOutcome,
    pub attempt_count: u32,
    pub completed_at: Timestamp,
}

domain_event!(
    CampaignCompleted,
    event_type = "campaign.completed.v1",
    aggregate_id = campaign_id,
    aggregate_type = "Campaign",
    occurred_at = completed_at,
    event_id = event_id
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignCancelled {
    pub event_id: EventId,
    pub campaign_id: CampaignId,
    pub outcome: CampaignOutcome,
    pub cancelled_at: Timestamp,
}

domain_event!(
    CampaignCancelled,
    event_type = "campaign.cancelled.v1",
    aggregate_id = campaign_id,
    aggregate_type = "Campaign",
    occurred_at = cancelled_at,
    event_id = event_id
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignPaused {
    pub event_id: EventId,
    pub campaign_id: CampaignId,
    pub paused_at: Timestamp,
}

domain_event!(
    CampaignPaused,
    event_type = "campaign.paused.v1",
    aggregate_id = campaign_id,
    aggregate_type = "Campaign",
    occurred_at = paused_at,
    event_id = event_id
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignResumed {
    pub event_id: EventId,
    pub campaign_id: CampaignId,
    pub resumed_at: Timestamp,
}

domain_event!(
    CampaignResumed,
    event_type = "campaign.resumed.v1",
    aggregate_id = campaign_id,
    aggregate_type = "Campaign",
    occurred_at = resumed_at,
    event_id = event_id
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignRescheduled {
    pub event_id: EventId,
    pub campaign_id: CampaignId,
    pub next_action_due_at: Timestamp,
    pub rescheduled_at: Timestamp,
}

domain_event!(
    CampaignRescheduled,
    event_type = "campaign.rescheduled.v1",
    aggregate_id = campaign_id,
    aggregate_type = "Campaign",
    occurred_at = rescheduled_at,
    event_id = event_id
);

/// Any campaign event, as buffered on the aggregate.
#[derive(Debug, Clone, PartialEq)]
pub enum CampaignEvent {
    Created(CampaignCreated),
    StepExecuted(CampaignStepExecuted),
    Escalated(CampaignEscalated),
    Completed(CampaignCompleted),
    Cancelled(CampaignCancelled),
    Paused(CampaignPaused),
    Resumed(CampaignResumed),
    Rescheduled(CampaignRescheduled),
}

impl CampaignEvent {
    pub fn to_envelope(&self) -> Result<EventEnvelope, serde_json::Error> {
        match self {
            CampaignEvent::Created(e) => EventEnvelope::from_event(e),
            CampaignEvent::StepExecuted(e) => EventEnvelope::from_event(e),
            CampaignEvent::Escalated(e) => EventEnvelope::from_event(e),
            CampaignEvent::Completed(e) => EventEnvelope::from_event(e),
            CampaignEvent::Cancelled(e) => EventEnvelope::from_event(e),
            CampaignEvent::Paused(e) => EventEnvelope::from_event(e),
            CampaignEvent::Resumed(e) => EventEnvelope::from_event(e),
            CampaignEvent::Rescheduled(e) => EventEnvelope::from_event(e),
        }
    }
}
