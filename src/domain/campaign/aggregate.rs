//! Campaign aggregate entity.
//!
//! A Campaign tracks one delinquent subscription's progress through a
//! pinned workflow version.
//!
//! # Design Decisions
//!
//! - **One open campaign per subscription**: enforced by the repository's
//!   atomic `create_if_absent` and by a partial unique index in PostgreSQL
//! - **Money in cents**: `PaymentSnapshot::amount_cents` is an i64
//! - **Append-only history**: steps are pushed, never edited
//! - **Optimistic concurrency**: `version` is checked and bumped on every save
//! - **Buffered events**: state changes queue domain events that are taken
//!   and published after commit

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    CampaignId, CustomerId, EventId, NodeId, RuleId, StateMachine, SubscriptionId, Timestamp,
    WorkflowId,
};
use crate::domain::rules::Overrides;
use crate::domain::workflow::WorkflowDefinition;

use super::events::{
    CampaignCancelled, CampaignCompleted, CampaignCreated, CampaignEscalated, CampaignEvent,
    CampaignPaused, CampaignRescheduled, CampaignResumed, CampaignStepExecuted,
};
use super::probability::success_probability;
use super::{
    CampaignOutcome, CampaignStatus, CampaignStep, DunningError, ExternalSignal, PaymentSnapshot,
    StepOutcome,
};

/// Everything needed to open a campaign for a failed payment.
#[derive(Debug, Clone)]
pub struct NewCampaign<'a> {
    pub subscription_id: SubscriptionId,
    pub customer_id: CustomerId,
    pub payment: PaymentSnapshot,
    pub workflow: &'a WorkflowDefinition,
    pub max_attempts: u32,
}

/// Campaign aggregate.
///
/// # Invariants
///
/// - `current_node_id` names a node of workflow `(workflow_id, workflow_version)`
/// - `attempt_count` starts at 1 (the original failed charge) and never decreases
/// - `completed` and `cancelled` are terminal
/// - `history` is append-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub subscription_id: SubscriptionId,
    pub customer_id: CustomerId,

    /// Latest failed payment being recovered.
    pub payment: PaymentSnapshot,

    pub workflow_id: WorkflowId,
    pub workflow_version: u32,

    /// Incremented whenever a `set_workflow` override restarts the campaign
    /// on another workflow; scopes step idempotency keys.
    pub workflow_epoch: u32,

    /// Node to execute next (for wait nodes: the wait in progress).
    pub current_node_id: NodeId,

    pub status: CampaignStatus,
    pub outcome: Option<CampaignOutcome>,

    pub attempt_count: u32,
    pub max_attempts: u32,
    pub next_action_due_at: Option<Timestamp>,

    pub history: Vec<CampaignStep>,

    /// Advisory, recomputed on every step. Never used for control flow.
    pub success_probability: f64,

    pub tags: Vec<String>,

    /// Overrides of the rule that matched at the last evaluation.
    pub overrides: Overrides,
    pub matched_rule: Option<RuleId>,

    pub escalated_at: Option<Timestamp>,

    /// Consecutive gateway/dispatcher failures, drives infrastructure backoff.
    pub infra_failures: u32,
    pub last_error: Option<String>,

    pub version: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub closed_at: Option<Timestamp>,

    #[serde(skip)]
    events: Vec<CampaignEvent>,
}

impl Campaign {
    /// Opens a pending campaign positioned on the workflow's start node.
    pub fn open(new: NewCampaign<'_>, now: Timestamp) -> Result<Self, DunningError> {
        let start = new.workflow.start_node().ok_or_else(|| {
            DunningError::invariant(format!("workflow {} has no start node", new.workflow.id))
        })?;

        let mut campaign = Self {
            id: CampaignId::new(),
            subscription_id: new.subscription_id,
            customer_id: new.customer_id,
            success_probability: success_probability(&new.payment.failure_reason, 1, None),
            payment: new.payment,
            workflow_id: new.workflow.id.clone(),
            workflow_version: new.workflow.version,
            workflow_epoch: 0,
            current_node_id: start.id.clone(),
            status: CampaignStatus::Pending,
            outcome: None,
            attempt_count: 1,
            max_attempts: new.max_attempts,
            next_action_due_at: None,
            history: Vec::new(),
            tags: Vec::new(),
            overrides: Overrides::default(),
            matched_rule: None,
            escalated_at: None,
            infra_failures: 0,
            last_error: None,
            version: 0,
            created_at: now,
            updated_at: now,
            closed_at: None,
            events: Vec::new(),
        };
        campaign.events.push(CampaignEvent::Created(CampaignCreated {
            event_id: EventId::new(),
            campaign_id: campaign.id,
            subscription_id: campaign.subscription_id.clone(),
            workflow_id: campaign.workflow_id.clone(),
            workflow_version: campaign.workflow_version,
            matched_rule: None,
            created_at: now,
        }));
        Ok(campaign)
    }

    fn transition(&mut self, target: CampaignStatus, attempted: &str) -> Result<(), DunningError> {
        self.status = self
            .status
            .transition_to(target)
            .map_err(|_| DunningError::invalid_state(self.status.as_str(), attempted))?;
        Ok(())
    }

    fn campaign_step(&self, outcome: StepOutcome, now: Timestamp) -> CampaignStep {
        CampaignStep::new(
            self.current_node_id.clone(),
            self.workflow_epoch,
            self.attempt_count,
            outcome,
            now,
        )
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// Schedulable and its next action is due.
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.status.is_schedulable() && self.next_action_due_at.map_or(false, |due| due <= now)
    }

    /// Start transition: pending → active.
    pub fn activate(&mut self, now: Timestamp) -> Result<(), DunningError> {
        self.transition(CampaignStatus::Active, "activate")?;
        self.updated_at = now;
        Ok(())
    }

    /// Appends a history entry.
    pub fn record(&mut self, step: CampaignStep) {
        if step.outcome.is_node_execution() {
            self.events
                .push(CampaignEvent::StepExecuted(CampaignStepExecuted {
                    event_id: EventId::new(),
                    campaign_id: self.id,
                    node_id: step.node_id.clone(),
                    outcome: step.outcome,
                    attempt_count: step.attempt_count,
                    executed_at: step.executed_at,
                }));
        }
        self.updated_at = step.executed_at;
        self.history.push(step);
    }

    /// Node execution already recorded for `node` at `attempt` in the current epoch.
    pub fn recorded_step(&self, node: &NodeId, attempt: u32) -> Option<&CampaignStep> {
        self.history.iter().rev().find(|s| {
            s.outcome.is_node_execution()
                && s.epoch == self.workflow_epoch
                && s.attempt_count == attempt
                && &s.node_id == node
        })
    }

    pub fn move_to(&mut self, node: NodeId) {
        self.current_node_id = node;
    }

    pub fn schedule_at(&mut self, due: Timestamp) {
        self.next_action_due_at = Some(due);
    }

    pub fn increment_attempts(&mut self) {
        self.attempt_count = self.attempt_count.saturating_add(1);
    }

    pub fn retries_exhausted(&self) -> bool {
        self.attempt_count >= self.max_attempts
    }

    /// Marks the campaign escalated. Returns false if it already was.
    pub fn escalate(&mut self, node: Option<NodeId>, now: Timestamp) -> Result<bool, DunningError> {
        if self.status == CampaignStatus::Escalated {
            return Ok(false);
        }
        self.transition(CampaignStatus::Escalated, "escalate")?;
        self.escalated_at.get_or_insert(now);
        self.updated_at = now;
        self.events.push(CampaignEvent::Escalated(CampaignEscalated {
            event_id: EventId::new(),
            campaign_id: self.id,
            node_id: node,
            escalated_at: now,
        }));
        Ok(true)
    }

    pub fn complete(&mut self, outcome: CampaignOutcome, now: Timestamp) -> Result<(), DunningError> {
        self.transition(CampaignStatus::Completed, "complete")?;
        self.close(outcome, now);
        self.events.push(CampaignEvent::Completed(CampaignCompleted {
            event_id: EventId::new(),
            campaign_id: self.id,
            outcome,
            attempt_count: self.attempt_count,
            completed_at: now,
        }));
        Ok(())
    }

    pub fn cancel(&mut self, outcome: CampaignOutcome, now: Timestamp) -> Result<(), DunningError> {
        self.transition(CampaignStatus::Cancelled, "cancel")?;
        self.close(outcome, now);
        self.events.push(CampaignEvent::Cancelled(CampaignCancelled {
            event_id: EventId::new(),
            campaign_id: self.id,
            outcome,
            cancelled_at: now,
        }));
        Ok(())
    }

    fn close(&mut self, outcome: CampaignOutcome, now: Timestamp) {
        self.outcome = Some(outcome);
        self.next_action_due_at = None;
        self.closed_at = Some(now);
        self.updated_at = now;
    }

    /// Operator pause. Only progressing campaigns can be paused.
    pub fn pause(&mut self, now: Timestamp) -> Result<(), DunningError> {
        self.transition(CampaignStatus::Paused, "pause")?;
        let step = self.campaign_step(StepOutcome::Paused, now);
        self.record(step);
        self.events.push(CampaignEvent::Paused(CampaignPaused {
            event_id: EventId::new(),
            campaign_id: self.id,
            paused_at: now,
        }));
        Ok(())
    }

    /// Operator resume; restores `escalated` if the campaign had been escalated.
    /// An overdue action becomes due immediately.
    pub fn resume(&mut self, now: Timestamp) -> Result<(), DunningError> {
        if self.status != CampaignStatus::Paused {
            return Err(DunningError::invalid_state(self.status.as_str(), "resume"));
        }
        let target = if self.escalated_at.is_some() {
            CampaignStatus::Escalated
        } else {
            CampaignStatus::Active
        };
        self.transition(target, "resume")?;
        let due = self.next_action_due_at.filter(|d| d.is_after(&now)).unwrap_or(now);
        self.next_action_due_at = Some(due);
        let step = self.campaign_step(StepOutcome::Resumed, now);
        self.record(step);
        self.events.push(CampaignEvent::Resumed(CampaignResumed {
            event_id: EventId::new(),
            campaign_id: self.id,
            resumed_at: now,
        }));
        Ok(())
    }

    /// Operator override of the next action time.
    pub fn reschedule(&mut self, due: Timestamp, now: Timestamp) -> Result<(), DunningError> {
        if !self.is_open() {
            return Err(DunningError::invalid_state(self.status.as_str(), "reschedule"));
        }
        self.next_action_due_at = Some(due);
        let step = self
            .campaign_step(StepOutcome::Rescheduled, now)
            .with_detail(format!("next action at {}", due));
        self.record(step);
        self.events.push(CampaignEvent::Rescheduled(CampaignRescheduled {
            event_id: EventId::new(),
            campaign_id: self.id,
            next_action_due_at: due,
            rescheduled_at: now,
        }));
        Ok(())
    }

    /// Folds a later failure for the same subscription into this campaign.
    pub fn fold_failure(&mut self, payment: PaymentSnapshot, now: Timestamp) -> Result<(), DunningError> {
        if !self.is_open() {
            return Err(DunningError::invalid_state(self.status.as_str(), "fold failure into"));
        }
        let parked_until = self
            .recorded_step(&self.current_node_id, self.attempt_count)
            .filter(|s| s.outcome == StepOutcome::Waiting)
            .and_then(|s| s.wait_until);
        self.increment_attempts();
        let step = self.campaign_step(StepOutcome::FailureFolded, now).with_detail(format!(
            "payment {} failed ({}), failure #{}",
            payment.payment_id, payment.failure_reason, payment.failure_count
        ));
        self.payment = payment;
        self.record(step);

        // Replay is keyed by attempt; carry the running wait's deadline forward
        if let Some(until) = parked_until {
            let carried = self
                .campaign_step(StepOutcome::Waiting, now)
                .with_wait_until(until)
                .with_detail("deadline kept across folded failure");
            self.record(carried);
        }
        Ok(())
    }

    /// Restarts the campaign on the start node of another workflow.
    pub fn redirect(&mut self, workflow: &WorkflowDefinition, now: Timestamp) -> Result<(), DunningError> {
        let start = workflow.start_node().ok_or_else(|| {
            DunningError::invariant(format!("workflow {} has no start node", workflow.id))
        })?;
        let step = self.campaign_step(StepOutcome::Redirected, now).with_detail(format!(
            "{} v{} -> {} v{}",
            self.workflow_id, self.workflow_version, workflow.id, workflow.version
        ));
        self.record(step);
        self.workflow_id = workflow.id.clone();
        self.workflow_version = workflow.version;
        self.workflow_epoch += 1;
        self.current_node_id = start.id.clone();
        Ok(())
    }

    /// Stores the matched rule's overrides and applies the static ones.
    pub fn apply_overrides(&mut self, matched_rule: Option<RuleId>, overrides: Overrides, default_max_attempts: u32) {
        self.max_attempts = overrides.max_attempts.unwrap_or(default_max_attempts);
        for tag in &overrides.tags {
            if !self.tags.contains(tag) {
                self.tags.push(tag.clone());
            }
        }
        self.matched_rule = matched_rule;
        self.overrides = overrides;
        if let Some(CampaignEvent::Created(created)) = self.events.first_mut() {
            created.matched_rule = matched_rule;
        }
    }

    pub fn account_manager_notified(&self) -> bool {
        self.history
            .iter()
            .any(|s| s.outcome == StepOutcome::AccountManagerNotified)
    }

    pub fn record_account_manager_notified(&mut self, now: Timestamp) {
        let step = self.campaign_step(StepOutcome::AccountManagerNotified, now);
        self.record(step);
    }

    /// Applies infrastructure backoff: due in `min(base * 2^(n-1), max)` seconds.
    pub fn record_transient_failure(
        &mut self,
        error: impl Into<String>,
        backoff_base_secs: u64,
        backoff_max_secs: u64,
        now: Timestamp,
    ) {
        self.infra_failures = self.infra_failures.saturating_add(1);
        let exponent = (self.infra_failures - 1).min(32);
        let delay = backoff_base_secs
            .saturating_mul(1u64 << exponent)
            .min(backoff_max_secs);
        self.next_action_due_at = Some(now.plus_secs(delay));
        self.last_error = Some(error.into());
        self.updated_at = now;
    }

    pub fn clear_transient_failures(&mut self) {
        self.infra_failures = 0;
        self.last_error = None;
    }

    /// Applies a queued gateway signal. Signals for closed campaigns are ignored.
    pub fn apply_signal(&mut self, signal: ExternalSignal, now: Timestamp) -> Result<bool, DunningError> {
        if !self.is_open() {
            return Ok(false);
        }
        match signal {
            ExternalSignal::PaymentFailed { payment, .. } => self.fold_failure(payment, now)?,
            ExternalSignal::PaymentSucceeded { payment_id, .. } => {
                let step = self
                    .campaign_step(StepOutcome::Recovered, now)
                    .with_detail(format!("payment {} succeeded", payment_id));
                self.record(step);
                self.complete(CampaignOutcome::Recovered, now)?;
            }
            ExternalSignal::SubscriptionCancelled { .. } => {
                let step = self.campaign_step(StepOutcome::SubscriptionCancelled, now);
                self.record(step);
                self.cancel(CampaignOutcome::SubscriptionCancelled, now)?;
            }
        }
        Ok(true)
    }

    /// Cancels this duplicate in favour of `survivor`.
    pub fn merge_into(&mut self, survivor: CampaignId, now: Timestamp) -> Result<(), DunningError> {
        let step = self
            .campaign_step(StepOutcome::Merged, now)
            .with_detail(format!("merged into campaign {}", survivor));
        self.record(step);
        self.cancel(CampaignOutcome::Merged, now)
    }

    pub fn refresh_success_probability(&mut self, segment: Option<&str>) {
        self.success_probability =
            success_probability(&self.payment.failure_reason, self.attempt_count, segment);
    }

    /// Drains buffered domain events.
    pub fn take_events(&mut self) -> Vec<CampaignEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn pending_events(&self) -> &[CampaignEvent] {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::PaymentId;
    use crate::domain::workflow::{NodeKind, WorkflowEdge, WorkflowNode};

    fn nid(s: &str) -> NodeId {
        NodeId::new(s).unwrap()
    }

    fn workflow(id: &str) -> WorkflowDefinition {
        WorkflowDefinition {
            id: WorkflowId::new(id).unwrap(),
            version: 1,
            name: id.to_string(),
            description: None,
            nodes: vec![
                WorkflowNode::new(nid("start"), NodeKind::Start),
                WorkflowNode::new(nid("end"), NodeKind::End),
            ],
            edges: vec![WorkflowEdge::always(nid("start"), nid("end"))],
            created_at: Timestamp::now(),
        }
    }

    fn payment(count: u32) -> PaymentSnapshot {
        PaymentSnapshot {
            payment_id: PaymentId::new(format!("pay_{}", count)).unwrap(),
            amount_cents: 4_900,
            currency: "usd".to_string(),
            failure_reason: "insufficient_funds".to_string(),
            failure_count: count,
        }
    }

    fn open() -> Campaign {
        let wf = workflow("standard");
        Campaign::open(
            NewCampaign {
                subscription_id: SubscriptionId::new("sub_1").unwrap(),
                customer_id: CustomerId::new("cus_1").unwrap(),
                payment: payment(1),
                workflow: &wf,
                max_attempts: 4,
            },
            Timestamp::now(),
        )
        .unwrap()
    }

    fn active() -> Campaign {
        let mut c = open();
        c.activate(Timestamp::now()).unwrap();
        c
    }

    #[test]
    fn opens_pending_on_start_node_with_one_attempt() {
        let c = open();
        assert_eq!(c.status, CampaignStatus::Pending);
        assert_eq!(c.current_node_id, nid("start"));
        assert_eq!(c.attempt_count, 1);
        assert!(matches!(c.pending_events(), [CampaignEvent::Created(_)]));
    }

    #[test]
    fn fold_increments_attempts_and_records_entry() {
        let mut c = active();
        c.fold_failure(payment(2), Timestamp::now()).unwrap();
        assert_eq!(c.attempt_count, 2);
        assert_eq!(c.payment.failure_count, 2);
        assert_eq!(c.history.last().unwrap().outcome, StepOutcome::FailureFolded);
    }

    #[test]
    fn fold_while_waiting_keeps_the_wait_deadline() {
        let mut c = active();
        let now = Timestamp::now();
        let until = now.add_days(7);
        c.move_to(nid("grace"));
        let wait = c.campaign_step(StepOutcome::Waiting, now).with_wait_until(until);
        c.record(wait);
        c.schedule_at(until);

        c.fold_failure(payment(2), now.add_hours(1)).unwrap();

        let carried = c.recorded_step(&nid("grace"), c.attempt_count).unwrap();
        assert_eq!(carried.outcome, StepOutcome::Waiting);
        assert_eq!(carried.wait_until, Some(until));
        assert_eq!(c.next_action_due_at, Some(until));
    }

    #[test]
    fn payment_succeeded_completes_as_recovered() {
        let mut c = active();
        let now = Timestamp::now();
        let applied = c
            .apply_signal(
                ExternalSignal::PaymentSucceeded {
                    payment_id: PaymentId::new("pay_1").unwrap(),
                    received_at: now,
                },
                now,
            )
            .unwrap();
        assert!(applied);
        assert_eq!(c.status, CampaignStatus::Completed);
        assert_eq!(c.outcome, Some(CampaignOutcome::Recovered));
        assert!(c.next_action_due_at.is_none());
    }

    #[test]
    fn signals_for_closed_campaigns_are_ignored() {
        let mut c = active();
        let now = Timestamp::now();
        c.cancel(CampaignOutcome::OperatorCancelled, now).unwrap();
        let applied = c
            .apply_signal(ExternalSignal::SubscriptionCancelled { received_at: now }, now)
            .unwrap();
        assert!(!applied);
        assert_eq!(c.outcome, Some(CampaignOutcome::OperatorCancelled));
    }

    #[test]
    fn resume_restores_escalated_status() {
        let mut c = active();
        let now = Timestamp::now();
        c.escalate(None, now).unwrap();
        c.pause(now).unwrap();
        assert!(!c.is_due(now));
        c.resume(now).unwrap();
        assert_eq!(c.status, CampaignStatus::Escalated);
        assert!(c.is_due(now));
    }

    #[test]
    fn resume_keeps_future_due_time() {
        let mut c = active();
        let now = Timestamp::now();
        c.schedule_at(now.add_days(3));
        c.pause(now).unwrap();
        c.resume(now).unwrap();
        assert_eq!(c.next_action_due_at, Some(now.add_days(3)));
        assert_eq!(c.status, CampaignStatus::Active);
    }

    #[test]
    fn pending_campaign_cannot_be_paused() {
        let mut c = open();
        let err = c.pause(Timestamp::now()).unwrap_err();
        assert_eq!(err, DunningError::invalid_state("pending", "pause"));
    }

    #[test]
    fn escalate_is_reported_once() {
        let mut c = active();
        let now = Timestamp::now();
        assert!(c.escalate(None, now).unwrap());
        assert!(!c.escalate(None, now).unwrap());
        assert_eq!(c.escalated_at, Some(now));
    }

    #[test]
    fn transient_backoff_doubles_up_to_max() {
        let mut c = active();
        let now = Timestamp::now();
        c.record_transient_failure("timeout", 30, 100, now);
        assert_eq!(c.next_action_due_at, Some(now.plus_secs(30)));
        c.record_transient_failure("timeout", 30, 100, now);
        assert_eq!(c.next_action_due_at, Some(now.plus_secs(60)));
        c.record_transient_failure("timeout", 30, 100, now);
        assert_eq!(c.next_action_due_at, Some(now.plus_secs(100)));
        assert_eq!(c.infra_failures, 3);
        c.clear_transient_failures();
        assert_eq!(c.infra_failures, 0);
        assert!(c.last_error.is_none());
    }

    #[test]
    fn redirect_bumps_epoch_and_scopes_idempotency() {
        let mut c = active();
        let now = Timestamp::now();
        let step = CampaignStep::new(nid("start"), 0, 1, StepOutcome::Started, now);
        c.record(step);
        assert!(c.recorded_step(&nid("start"), 1).is_some());

        c.redirect(&workflow("vip"), now).unwrap();
        assert_eq!(c.workflow_id.as_str(), "vip");
        assert_eq!(c.workflow_epoch, 1);
        assert!(c.recorded_step(&nid("start"), 1).is_none());
    }

    #[test]
    fn apply_overrides_sets_attempt_cap_and_tags() {
        let mut c = open();
        let overrides = Overrides {
            max_attempts: Some(6),
            tags: vec!["vip".to_string()],
            ..Overrides::default()
        };
        let rule = RuleId::new();
        c.apply_overrides(Some(rule), overrides, 4);
        assert_eq!(c.max_attempts, 6);
        assert_eq!(c.tags, vec!["vip".to_string()]);
        match c.pending_events() {
            [CampaignEvent::Created(created)] => assert_eq!(created.matched_rule, Some(rule)),
            other => panic!("unexpected events: {:?}", other),
        }
    }

    #[test]
    fn merge_cancels_duplicate() {
        let mut c = active();
        c.merge_into(CampaignId::new(), Timestamp::now()).unwrap();
        assert_eq!(c.status, CampaignStatus::Cancelled);
        assert_eq!(c.outcome, Some(CampaignOutcome::Merged));
    }

    #[test]
    fn events_are_not_serialized() {
        let c = open();
        let json = serde_json::to_value(&c).unwrap();
        assert!(json.get("events").is_none());
        let back: Campaign = serde_json::from_value(json).unwrap();
        assert!(back.pending_events().is_empty());
    }
}
