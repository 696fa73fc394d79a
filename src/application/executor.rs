//! WorkflowExecutor - drives one campaign through its pinned workflow.
//!
//! `advance` visits nodes from `current_node_id` until the campaign waits,
//! closes, is blocked by an unreachable collaborator, or reaches the
//! per-tick visit limit.
//!
//! # Idempotency
//!
//! Every node execution is keyed by `(workflow_epoch, node_id, attempt_count)`.
//! Before running a node the executor looks the key up in history; a recorded
//! execution is replayed from its entry instead of being re-run, so a
//! redelivered tick never repeats a charge or a notification.
//!
//! # Blocking
//!
//! A transport failure leaves `current_node_id` unchanged and records
//! nothing for that node. Progress made earlier in the same pass is kept.

use std::sync::Arc;

use serde_json::json;

use crate::domain::campaign::{Campaign, CampaignOutcome, CampaignStep, DunningError, StepOutcome};
use crate::domain::foundation::{NodeId, Timestamp};
use crate::domain::rules::EvaluationContext;
use crate::domain::workflow::{
    next_node, ActionKind, Channel, NodeKind, WaitKind, WorkflowDefinition, WorkflowNode,
};
use crate::ports::{
    DeliveryResult, DunningSettings, Notification, NotificationDispatcher, PaymentGateway,
    RetryResult,
};

/// Why an advance pass stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum Stop {
    /// Waiting until `next_action_due_at`.
    Waiting,
    /// The campaign closed with this outcome.
    Closed(CampaignOutcome),
    /// A collaborator call failed; the node will be retried.
    Blocked { error: String, transient: bool },
    /// Visit limit reached; due again immediately.
    StepLimit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdvanceReport {
    /// History entries appended during this pass.
    pub steps_recorded: usize,
    pub stop: Stop,
}

/// What executing a single node produced.
enum NodeResult {
    /// Step recorded; continue at `next`.
    Continue(CampaignStep, NodeId),
    /// Step recorded; the campaign waits on this node.
    Wait(CampaignStep, Timestamp),
    /// Step recorded; the campaign closes.
    Close(CampaignStep, CampaignOutcome),
    Blocked { error: String, transient: bool },
}

pub struct WorkflowExecutor {
    gateway: Arc<dyn PaymentGateway>,
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl WorkflowExecutor {
    pub fn new(gateway: Arc<dyn PaymentGateway>, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self { gateway, dispatcher }
    }

    /// Advances `campaign` as far as it can go at `now`.
    ///
    /// `ctx` must have been built for this campaign; the executor keeps its
    /// `campaign.attemptCount` and `payment.failureReason` current as it goes.
    ///
    /// # Errors
    ///
    /// `InvariantViolation` when the campaign points at a node that does not
    /// exist or has no way forward; the graph was validated on save, so this
    /// means stored data is corrupt.
    pub async fn advance(
        &self,
        campaign: &mut Campaign,
        workflow: &WorkflowDefinition,
        ctx: &mut EvaluationContext,
        settings: &DunningSettings,
        now: Timestamp,
    ) -> Result<AdvanceReport, DunningError> {
        if campaign.workflow_id != workflow.id || campaign.workflow_version != workflow.version {
            return Err(DunningError::invariant(format!(
                "campaign {} is pinned to {} v{}, not {} v{}",
                campaign.id, campaign.workflow_id, campaign.workflow_version, workflow.id, workflow.version
            )));
        }

        let mut steps_recorded = 0;
        let mut visits = 0;

        loop {
            if let Some(outcome) = campaign.outcome.filter(|_| !campaign.is_open()) {
                return Ok(AdvanceReport {
                    steps_recorded,
                    stop: Stop::Closed(outcome),
                });
            }
            if visits >= settings.max_steps_per_tick {
                tracing::warn!(
                    campaign_id = %campaign.id,
                    node_id = %campaign.current_node_id,
                    visits,
                    "visit limit reached, yielding"
                );
                campaign.schedule_at(now);
                return Ok(AdvanceReport {
                    steps_recorded,
                    stop: Stop::StepLimit,
                });
            }
            visits += 1;

            let node = workflow.node(&campaign.current_node_id).cloned().ok_or_else(|| {
                DunningError::invariant(format!(
                    "campaign {} points at unknown node {}",
                    campaign.id, campaign.current_node_id
                ))
            })?;

            if let Some(recorded) = campaign
                .recorded_step(&node.id, campaign.attempt_count)
                .cloned()
            {
                match self.replay(campaign, workflow, ctx, &node, &recorded, now)? {
                    Some(stop) => return Ok(AdvanceReport { steps_recorded, stop }),
                    None => continue,
                }
            }

            match self.execute(campaign, workflow, ctx, settings, &node, now).await? {
                NodeResult::Continue(step, next) => {
                    tracing::debug!(
                        campaign_id = %campaign.id,
                        node_id = %node.id,
                        outcome = ?step.outcome,
                        next = %next,
                        "node executed"
                    );
                    campaign.record(step);
                    steps_recorded += 1;
                    campaign.move_to(next);
                }
                NodeResult::Wait(step, until) => {
                    campaign.record(step);
                    steps_recorded += 1;
                    campaign.schedule_at(until);
                    tracing::debug!(campaign_id = %campaign.id, node_id = %node.id, until = %until, "waiting");
                    return Ok(AdvanceReport {
                        steps_recorded,
                        stop: Stop::Waiting,
                    });
                }
                NodeResult::Close(step, outcome) => {
                    campaign.record(step);
                    steps_recorded += 1;
                    campaign.complete(outcome, now)?;
                    tracing::info!(campaign_id = %campaign.id, outcome = outcome.as_str(), "campaign completed");
                    return Ok(AdvanceReport {
                        steps_recorded,
                        stop: Stop::Closed(outcome),
                    });
                }
                NodeResult::Blocked { error, transient } => {
                    tracing::warn!(
                        campaign_id = %campaign.id,
                        node_id = %node.id,
                        error = %error,
                        transient,
                        "node blocked"
                    );
                    return Ok(AdvanceReport {
                        steps_recorded,
                        stop: Stop::Blocked { error, transient },
                    });
                }
            }
        }
    }

    /// Re-applies an already recorded execution without side effects.
    fn replay(
        &self,
        campaign: &mut Campaign,
        workflow: &WorkflowDefinition,
        ctx: &mut EvaluationContext,
        node: &WorkflowNode,
        recorded: &CampaignStep,
        now: Timestamp,
    ) -> Result<Option<Stop>, DunningError> {
        match recorded.outcome {
            StepOutcome::Waiting => {
                let until = recorded.wait_until.unwrap_or(now);
                if until.is_after(&now) {
                    campaign.schedule_at(until);
                    return Ok(Some(Stop::Waiting));
                }
                let next = self.successor(workflow, &node.id, ctx)?;
                campaign.move_to(next);
                Ok(None)
            }
            StepOutcome::RetriesExhausted
            | StepOutcome::AccountSuspended
            | StepOutcome::WorkflowEnded
            | StepOutcome::RetrySucceeded => {
                let outcome = match recorded.outcome {
                    StepOutcome::RetriesExhausted => CampaignOutcome::RetriesExhausted,
                    StepOutcome::AccountSuspended => CampaignOutcome::AccountSuspended,
                    StepOutcome::RetrySucceeded => CampaignOutcome::Recovered,
                    _ => CampaignOutcome::WorkflowEnded,
                };
                campaign.complete(outcome, now)?;
                Ok(Some(Stop::Closed(outcome)))
            }
            _ => {
                if matches!(recorded.outcome, StepOutcome::RetryFailed | StepOutcome::RetrySkipped) {
                    let consumed = recorded.attempt_count + 1;
                    if campaign.attempt_count < consumed {
                        campaign.attempt_count = consumed;
                        ctx.set("campaign.attemptCount", json!(consumed));
                    }
                }
                let next = recorded.next_node_id.clone().ok_or_else(|| {
                    DunningError::invariant(format!(
                        "recorded step for node {} has no successor",
                        node.id
                    ))
                })?;
                campaign.move_to(next);
                Ok(None)
            }
        }
    }

    fn successor(
        &self,
        workflow: &WorkflowDefinition,
        node: &NodeId,
        ctx: &EvaluationContext,
    ) -> Result<NodeId, DunningError> {
        next_node(workflow, node, ctx)
            .cloned()
            .map_err(|e| DunningError::invariant(e.to_string()))
    }

    fn step(&self, campaign: &Campaign, node: &WorkflowNode, outcome: StepOutcome, now: Timestamp) -> CampaignStep {
        CampaignStep::new(
            node.id.clone(),
            campaign.workflow_epoch,
            campaign.attempt_count,
            outcome,
            now,
        )
    }

    fn idempotency_key(&self, campaign: &Campaign, node: &WorkflowNode) -> String {
        format!(
            "{}:{}:{}:{}",
            campaign.id, campaign.workflow_epoch, node.id, campaign.attempt_count
        )
    }

    async fn execute(
        &self,
        campaign: &mut Campaign,
        workflow: &WorkflowDefinition,
        ctx: &mut EvaluationContext,
        settings: &DunningSettings,
        node: &WorkflowNode,
        now: Timestamp,
    ) -> Result<NodeResult, DunningError> {
        let result = match &node.kind {
            NodeKind::Start => {
                let next = self.successor(workflow, &node.id, ctx)?;
                let step = self.step(campaign, node, StepOutcome::Started, now).with_next(next.clone());
                NodeResult::Continue(step, next)
            }
            NodeKind::Condition => {
                let next = self.successor(workflow, &node.id, ctx)?;
                let step = self
                    .step(campaign, node, StepOutcome::BranchTaken, now)
                    .with_next(next.clone());
                NodeResult::Continue(step, next)
            }
            NodeKind::End => {
                let step = self.step(campaign, node, StepOutcome::WorkflowEnded, now);
                NodeResult::Close(step, CampaignOutcome::WorkflowEnded)
            }
            NodeKind::Wait { wait, duration_hours } => {
                let hours = wait_hours(*wait, *duration_hours, campaign, ctx, settings);
                let until = now.add_hours(hours as i64);
                let next = self.successor(workflow, &node.id, ctx)?;
                let step = self
                    .step(campaign, node, StepOutcome::Waiting, now)
                    .with_wait_until(until)
                    .with_next(next)
                    .with_detail(format!("{:?} wait of {}h", wait, hours).to_lowercase());
                NodeResult::Wait(step, until)
            }
            NodeKind::Action { action } => match action {
                ActionKind::Retry => self.retry(campaign, workflow, ctx, node, now).await?,
                ActionKind::SendEmail { template_id, channel } => {
                    self.send(campaign, workflow, ctx, node, template_id, *channel, now)
                        .await?
                }
                ActionKind::Escalate {
                    template_id,
                    channel,
                    recipients,
                } => {
                    self.escalate(campaign, workflow, ctx, node, template_id, *channel, recipients, now)
                        .await?
                }
                ActionKind::SuspendAccount => {
                    match self.gateway.suspend_account(&campaign.subscription_id).await {
                        Ok(()) => {
                            let step = self.step(campaign, node, StepOutcome::AccountSuspended, now);
                            NodeResult::Close(step, CampaignOutcome::AccountSuspended)
                        }
                        Err(e) => NodeResult::Blocked {
                            transient: e.is_transient(),
                            error: e.to_string(),
                        },
                    }
                }
            },
        };
        Ok(result)
    }

    async fn retry(
        &self,
        campaign: &mut Campaign,
        workflow: &WorkflowDefinition,
        ctx: &mut EvaluationContext,
        node: &WorkflowNode,
        now: Timestamp,
    ) -> Result<NodeResult, DunningError> {
        if campaign.retries_exhausted() {
            let step = self
                .step(campaign, node, StepOutcome::RetriesExhausted, now)
                .with_detail(format!("{} of {} attempts used", campaign.attempt_count, campaign.max_attempts));
            return Ok(NodeResult::Close(step, CampaignOutcome::RetriesExhausted));
        }

        if campaign.overrides.skip_retry {
            let step = self.step(campaign, node, StepOutcome::RetrySkipped, now);
            campaign.increment_attempts();
            ctx.set("campaign.attemptCount", json!(campaign.attempt_count));
            let next = self.successor(workflow, &node.id, ctx)?;
            return Ok(NodeResult::Continue(step.with_next(next.clone()), next));
        }

        let key = self.idempotency_key(campaign, node);
        match self.gateway.attempt_retry(&campaign.payment.payment_id, &key).await {
            Ok(RetryResult::Succeeded) => {
                let step = self.step(campaign, node, StepOutcome::RetrySucceeded, now);
                Ok(NodeResult::Close(step, CampaignOutcome::Recovered))
            }
            Ok(RetryResult::Failed { failure_reason }) => {
                let step = self
                    .step(campaign, node, StepOutcome::RetryFailed, now)
                    .with_detail(failure_reason.clone());
                campaign.increment_attempts();
                campaign.payment.failure_reason = failure_reason.clone();
                ctx.set("campaign.attemptCount", json!(campaign.attempt_count));
                ctx.set("payment.failureReason", json!(failure_reason));
                let next = self.successor(workflow, &node.id, ctx)?;
                Ok(NodeResult::Continue(step.with_next(next.clone()), next))
            }
            Err(e) => Ok(NodeResult::Blocked {
                transient: e.is_transient(),
                error: e.to_string(),
            }),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn send(
        &self,
        campaign: &Campaign,
        workflow: &WorkflowDefinition,
        ctx: &EvaluationContext,
        node: &WorkflowNode,
        template_id: &str,
        channel: Channel,
        now: Timestamp,
    ) -> Result<NodeResult, DunningError> {
        let notification = Notification {
            template_id: template_id.to_string(),
            channel,
            merge_context: merge_context(campaign, ctx),
            idempotency_key: self.idempotency_key(campaign, node),
        };
        let outcome = match self.dispatcher.send(&notification).await {
            Ok(DeliveryResult::Delivered) => {
                self.step(campaign, node, StepOutcome::NotificationDelivered, now)
            }
            Ok(DeliveryResult::Failed { reason }) => self
                .step(campaign, node, StepOutcome::NotificationFailed, now)
                .with_detail(reason),
            Err(e) => {
                return Ok(NodeResult::Blocked {
                    transient: e.is_transient(),
                    error: e.to_string(),
                })
            }
        };
        let next = self.successor(workflow, &node.id, ctx)?;
        Ok(NodeResult::Continue(outcome.with_next(next.clone()), next))
    }

    #[allow(clippy::too_many_arguments)]
    async fn escalate(
        &self,
        campaign: &mut Campaign,
        workflow: &WorkflowDefinition,
        ctx: &EvaluationContext,
        node: &WorkflowNode,
        template_id: &str,
        channel: Channel,
        recipients: &[String],
        now: Timestamp,
    ) -> Result<NodeResult, DunningError> {
        let mut merge = merge_context(campaign, ctx);
        merge["escalation"] = json!({ "recipients": recipients });
        let notification = Notification {
            template_id: template_id.to_string(),
            channel,
            merge_context: merge,
            idempotency_key: self.idempotency_key(campaign, node),
        };
        let detail = match self.dispatcher.send(&notification).await {
            Ok(DeliveryResult::Delivered) => None,
            Ok(DeliveryResult::Failed { reason }) => Some(format!("notification failed: {}", reason)),
            Err(e) => {
                return Ok(NodeResult::Blocked {
                    transient: e.is_transient(),
                    error: e.to_string(),
                })
            }
        };
        campaign.escalate(Some(node.id.clone()), now)?;
        let next = self.successor(workflow, &node.id, ctx)?;
        let mut step = self
            .step(campaign, node, StepOutcome::Escalated, now)
            .with_next(next.clone());
        if let Some(detail) = detail {
            step = step.with_detail(detail);
        }
        Ok(NodeResult::Continue(step, next))
    }
}

/// Wait length in hours for a node at the campaign's current attempt.
///
/// Grace: rule override, else the node's duration, else the plan's grace,
/// else the global grace. Delay: the node's duration, else the configured
/// interval for this attempt, plus any `delay_retry` override.
pub fn wait_hours(
    wait: WaitKind,
    duration_hours: Option<u32>,
    campaign: &Campaign,
    ctx: &EvaluationContext,
    settings: &DunningSettings,
) -> u32 {
    match wait {
        WaitKind::Grace => campaign
            .overrides
            .grace_period_days
            .map(|days| days * 24)
            .or(duration_hours)
            .unwrap_or_else(|| {
                let plan = ctx.resolve("subscription.plan").and_then(|v| v.as_str());
                settings.grace_period_days(plan) * 24
            }),
        WaitKind::Delay => {
            let base = duration_hours.unwrap_or_else(|| settings.retry_interval_hours(campaign.attempt_count));
            base + campaign.overrides.retry_delay_hours.unwrap_or(0)
        }
    }
}

fn merge_context(campaign: &Campaign, ctx: &EvaluationContext) -> serde_json::Value {
    let mut merge = ctx.as_json();
    merge["campaign"]["id"] = json!(campaign.id.to_string());
    merge["campaign"]["subscriptionId"] = json!(campaign.subscription_id.as_str());
    merge
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::gateway::MockPaymentGateway;
    use crate::adapters::notifications::RecordingDispatcher;
    use crate::application::context::{assemble_context, CampaignFacts};
    use crate::domain::campaign::{CampaignStatus, NewCampaign, PaymentSnapshot};
    use crate::domain::foundation::{CustomerId, PaymentId, SubscriptionId, WorkflowId};
    use crate::domain::rules::{Condition, Operator, Overrides};
    use crate::domain::workflow::{EdgeGuard, WorkflowEdge};
    use crate::ports::{DispatchError, GatewayError};

    // ════════════════════════════════════════════════════════════════════════════
    // Fixtures
    // ════════════════════════════════════════════════════════════════════════════

    fn nid(s: &str) -> NodeId {
        NodeId::new(s).unwrap()
    }

    fn node(id: &str, kind: NodeKind) -> WorkflowNode {
        WorkflowNode::new(nid(id), kind)
    }

    fn edge(from: &str, to: &str) -> WorkflowEdge {
        WorkflowEdge::always(nid(from), nid(to))
    }

    /// start → retry → notify → check{attempts < max → delay → retry; default → suspend}
    fn standard() -> WorkflowDefinition {
        WorkflowDefinition {
            id: WorkflowId::new("standard").unwrap(),
            version: 1,
            name: "Standard".into(),
            description: None,
            nodes: vec![
                node("start", NodeKind::Start),
                node("retry", NodeKind::Action { action: ActionKind::Retry }),
                node(
                    "notify",
                    NodeKind::Action {
                        action: ActionKind::SendEmail {
                            template_id: "payment_failed".into(),
                            channel: Channel::Email,
                        },
                    },
                ),
                node("check", NodeKind::Condition),
                node(
                    "delay",
                    NodeKind::Wait {
                        wait: WaitKind::Delay,
                        duration_hours: None,
                    },
                ),
                node("suspend", NodeKind::Action { action: ActionKind::SuspendAccount }),
            ],
            edges: vec![
                edge("start", "retry"),
                edge("retry", "notify"),
                edge("notify", "check"),
                WorkflowEdge {
                    from: nid("check"),
                    to: nid("delay"),
                    guard: EdgeGuard::When {
                        conditions: vec![Condition::new("campaign.attemptCount", Operator::LessThan, 4)],
                    },
                },
                WorkflowEdge {
                    from: nid("check"),
                    to: nid("suspend"),
                    guard: EdgeGuard::Default,
                },
                edge("delay", "retry"),
            ],
            created_at: Timestamp::now(),
        }
    }

    fn campaign(workflow: &WorkflowDefinition, now: Timestamp) -> Campaign {
        let mut c = Campaign::open(
            NewCampaign {
                subscription_id: SubscriptionId::new("sub_1").unwrap(),
                customer_id: CustomerId::new("cus_1").unwrap(),
                payment: PaymentSnapshot {
                    payment_id: PaymentId::new("pay_1").unwrap(),
                    amount_cents: 4_900,
                    currency: "usd".into(),
                    failure_reason: "insufficient_funds".into(),
                    failure_count: 1,
                },
                workflow,
                max_attempts: 4,
            },
            now,
        )
        .unwrap();
        c.activate(now).unwrap();
        c.schedule_at(now);
        c
    }

    fn ctx_for(c: &Campaign, settings: &DunningSettings, now: Timestamp) -> EvaluationContext {
        assemble_context(None, None, &c.payment, &CampaignFacts::of(c), settings, now)
    }

    struct Harness {
        gateway: Arc<MockPaymentGateway>,
        dispatcher: Arc<RecordingDispatcher>,
        executor: WorkflowExecutor,
        settings: DunningSettings,
    }

    fn harness() -> Harness {
        let gateway = Arc::new(MockPaymentGateway::new());
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let executor = WorkflowExecutor::new(gateway.clone(), dispatcher.clone());
        Harness {
            gateway,
            dispatcher,
            executor,
            settings: DunningSettings::default(),
        }
    }

    impl Harness {
        async fn advance(&self, c: &mut Campaign, wf: &WorkflowDefinition, now: Timestamp) -> AdvanceReport {
            let mut ctx = ctx_for(c, &self.settings, now);
            self.executor
                .advance(c, wf, &mut ctx, &self.settings, now)
                .await
                .unwrap()
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Advancing
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn failed_retry_notifies_and_waits_for_configured_interval() {
        let h = harness();
        let wf = standard();
        let now = Timestamp::now();
        let mut c = campaign(&wf, now);

        let report = h.advance(&mut c, &wf, now).await;

        assert_eq!(report.stop, Stop::Waiting);
        assert_eq!(report.steps_recorded, 5);
        assert_eq!(c.current_node_id, nid("delay"));
        assert_eq!(c.attempt_count, 2);
        // Second retry uses the second configured interval
        assert_eq!(c.next_action_due_at, Some(now.add_hours(72)));
        assert_eq!(h.gateway.retry_calls().len(), 1);
        assert_eq!(h.dispatcher.sent_count(), 1);
    }

    #[tokio::test]
    async fn redelivered_tick_changes_nothing() {
        let h = harness();
        let wf = standard();
        let now = Timestamp::now();
        let mut c = campaign(&wf, now);
        h.advance(&mut c, &wf, now).await;
        let snapshot = (c.current_node_id.clone(), c.history.len(), c.next_action_due_at);

        let report = h.advance(&mut c, &wf, now).await;

        assert_eq!(report.steps_recorded, 0);
        assert_eq!(report.stop, Stop::Waiting);
        assert_eq!((c.current_node_id.clone(), c.history.len(), c.next_action_due_at), snapshot);
        assert_eq!(h.gateway.retry_calls().len(), 1);
        assert_eq!(h.dispatcher.sent_count(), 1);
    }

    #[tokio::test]
    async fn replay_after_crash_skips_recorded_side_effects() {
        let h = harness();
        let wf = standard();
        let now = Timestamp::now();
        let mut c = campaign(&wf, now);
        h.advance(&mut c, &wf, now).await;

        // Rewind the pointer and counter; history alone must prevent re-execution
        c.move_to(nid("start"));
        c.attempt_count = 1;
        let report = h.advance(&mut c, &wf, now).await;

        assert_eq!(report.steps_recorded, 0);
        assert_eq!(h.gateway.retry_calls().len(), 1);
    }

    #[tokio::test]
    async fn exhausting_attempts_ends_on_default_branch() {
        let h = harness();
        let wf = standard();
        let mut now = Timestamp::now();
        let mut c = campaign(&wf, now);

        for _ in 0..10 {
            let report = h.advance(&mut c, &wf, now).await;
            if let Stop::Closed(_) = report.stop {
                break;
            }
            now = c.next_action_due_at.unwrap();
        }

        assert_eq!(c.status, CampaignStatus::Completed);
        assert_eq!(c.outcome, Some(CampaignOutcome::AccountSuspended));
        assert_eq!(c.attempt_count, 4);
        assert_eq!(h.gateway.retry_calls().len(), 3);
        assert_eq!(h.gateway.suspended().len(), 1);
    }

    #[tokio::test]
    async fn successful_retry_recovers() {
        let h = harness();
        h.gateway.push_retry(Ok(RetryResult::Succeeded));
        let wf = standard();
        let now = Timestamp::now();
        let mut c = campaign(&wf, now);

        let report = h.advance(&mut c, &wf, now).await;

        assert_eq!(report.stop, Stop::Closed(CampaignOutcome::Recovered));
        assert_eq!(c.status, CampaignStatus::Completed);
        assert!(c.next_action_due_at.is_none());
        assert_eq!(h.dispatcher.sent_count(), 0);
    }

    #[tokio::test]
    async fn gateway_outage_blocks_without_recording() {
        let h = harness();
        h.gateway.push_retry(Err(GatewayError::Timeout));
        let wf = standard();
        let now = Timestamp::now();
        let mut c = campaign(&wf, now);

        let report = h.advance(&mut c, &wf, now).await;

        assert!(matches!(report.stop, Stop::Blocked { transient: true, .. }));
        // Start node was recorded, the retry was not
        assert_eq!(report.steps_recorded, 1);
        assert_eq!(c.current_node_id, nid("retry"));
        assert_eq!(c.attempt_count, 1);

        let report = h.advance(&mut c, &wf, now).await;
        assert_eq!(report.stop, Stop::Waiting);
        assert_eq!(c.attempt_count, 2);
    }

    #[tokio::test]
    async fn dispatcher_outage_keeps_retry_result() {
        let h = harness();
        h.dispatcher.push_result(Err(DispatchError::Unavailable("connection refused".into())));
        let wf = standard();
        let now = Timestamp::now();
        let mut c = campaign(&wf, now);

        let report = h.advance(&mut c, &wf, now).await;

        assert!(matches!(report.stop, Stop::Blocked { .. }));
        assert_eq!(c.current_node_id, nid("notify"));
        assert_eq!(c.attempt_count, 2);

        h.advance(&mut c, &wf, now).await;
        assert_eq!(h.gateway.retry_calls().len(), 1);
        assert_eq!(h.dispatcher.sent_count(), 1);
    }

    #[tokio::test]
    async fn skip_retry_consumes_an_attempt() {
        let h = harness();
        let wf = standard();
        let now = Timestamp::now();
        let mut c = campaign(&wf, now);
        c.overrides = Overrides {
            skip_retry: true,
            ..Overrides::default()
        };

        h.advance(&mut c, &wf, now).await;

        assert!(h.gateway.retry_calls().is_empty());
        assert_eq!(c.attempt_count, 2);
        assert!(c.history.iter().any(|s| s.outcome == StepOutcome::RetrySkipped));
    }

    #[tokio::test]
    async fn delay_override_extends_wait() {
        let h = harness();
        let wf = standard();
        let now = Timestamp::now();
        let mut c = campaign(&wf, now);
        c.overrides = Overrides {
            retry_delay_hours: Some(12),
            ..Overrides::default()
        };

        h.advance(&mut c, &wf, now).await;

        assert_eq!(c.next_action_due_at, Some(now.add_hours(72 + 12)));
    }

    #[tokio::test]
    async fn visit_limit_yields() {
        let mut h = harness();
        h.settings.max_steps_per_tick = 2;
        let wf = standard();
        let now = Timestamp::now();
        let mut c = campaign(&wf, now);

        let report = h.advance(&mut c, &wf, now).await;

        assert_eq!(report.stop, Stop::StepLimit);
        assert_eq!(report.steps_recorded, 2);
        assert_eq!(c.next_action_due_at, Some(now));
    }

    #[tokio::test]
    async fn wrong_version_is_an_invariant_violation() {
        let h = harness();
        let wf = standard();
        let now = Timestamp::now();
        let mut c = campaign(&wf, now);
        let mut newer = standard();
        newer.version = 2;
        let mut ctx = ctx_for(&c, &h.settings, now);

        let err = h
            .executor
            .advance(&mut c, &newer, &mut ctx, &h.settings, now)
            .await
            .unwrap_err();

        assert!(matches!(err, DunningError::InvariantViolation(_)));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Wait durations
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn grace_prefers_rule_override_then_node_then_plan() {
        let wf = standard();
        let now = Timestamp::now();
        let mut c = campaign(&wf, now);
        let mut settings = DunningSettings::default();
        settings.plan_grace_period_days.insert("enterprise".into(), 10);
        let mut ctx = ctx_for(&c, &settings, now);
        ctx.set("subscription.plan", json!("enterprise"));

        assert_eq!(wait_hours(WaitKind::Grace, None, &c, &ctx, &settings), 240);
        assert_eq!(wait_hours(WaitKind::Grace, Some(48), &c, &ctx, &settings), 48);

        c.overrides.grace_period_days = Some(14);
        assert_eq!(wait_hours(WaitKind::Grace, Some(48), &c, &ctx, &settings), 336);
    }
}
