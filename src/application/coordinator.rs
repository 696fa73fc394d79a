//! DunningCoordinator - entry point for gateway events, scheduler ticks and
//! operator actions.
//!
//! Every mutation of an existing campaign happens under its lease:
//!
//! 1. Acquire the lease (skip or queue if another worker holds it)
//! 2. Load the campaign and drain its queued signals
//! 3. Mutate and save with the optimistic version check
//! 4. Publish buffered domain events
//! 5. Drain signals that arrived meanwhile, then release
//!
//! Resolution events that find the lease held are queued on the campaign
//! and applied by the lease holder right after its step commits.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use crate::domain::campaign::{
    Campaign, CampaignOutcome, CampaignStatus, DunningError, ExternalSignal, NewCampaign,
    PaymentSnapshot,
};
use crate::domain::foundation::{
    CampaignId, CustomerId, DomainError, ErrorCode, EventId, PaymentId, SubscriptionId, Timestamp,
};
use crate::domain::rules::{evaluate, EvaluationContext, EvaluationResult};
use crate::ports::{
    CampaignRepository, ConfigurationStore, CreateOutcome, CustomerStore, DeliveryResult,
    DunningSettings, EventPublisher, LeaseManager, Notification, NotificationDispatcher,
    PaymentGateway, ProcessedEventStore, RuleRepository, WorkflowRepository,
};

use super::context::{CampaignFacts, ContextBuilder};
use super::executor::{AdvanceReport, Stop, WorkflowExecutor};

const PAYMENT_FAILED_HANDLER: &str = "payment_failed";

// ════════════════════════════════════════════════════════════════════════════
// Commands and outcomes
// ════════════════════════════════════════════════════════════════════════════

/// Gateway report of a failed charge.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentFailedCommand {
    pub subscription_id: SubscriptionId,
    /// Looked up from the subscription when absent.
    pub customer_id: Option<CustomerId>,
    pub payment_id: PaymentId,
    pub amount_cents: i64,
    pub currency: String,
    pub failure_reason: String,
    pub failure_count: u32,
}

impl PaymentFailedCommand {
    /// Redeliveries of one failure share this key.
    pub fn dedupe_key(&self) -> EventId {
        EventId::from_string(format!("{}:{}", self.payment_id, self.failure_count))
    }

    fn snapshot(&self) -> PaymentSnapshot {
        PaymentSnapshot {
            payment_id: self.payment_id.clone(),
            amount_cents: self.amount_cents,
            currency: self.currency.clone(),
            failure_reason: self.failure_reason.clone(),
            failure_count: self.failure_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentSucceededCommand {
    pub subscription_id: SubscriptionId,
    pub payment_id: PaymentId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionCancelledCommand {
    pub subscription_id: SubscriptionId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureOutcome {
    /// A new campaign was opened.
    Opened(CampaignId),
    /// Folded into the subscription's open campaign.
    Folded(CampaignId),
    /// The open campaign is leased; the failure will be folded by the holder.
    Queued(CampaignId),
    /// Redelivery of an already handled failure.
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    Resolved(CampaignId),
    /// Applied by the current lease holder once its step commits.
    Queued(CampaignId),
    NoOpenCampaign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    LeaseHeld,
    Closed,
    Paused,
    NotDue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Advanced(AdvanceReport),
    /// Only queued signals were applied.
    SignalsApplied,
    /// Stored data is inconsistent; backoff applied and the operator must act.
    Faulted(String),
    Skipped(SkipReason),
}

/// Ports the coordinator drives.
#[derive(Clone)]
pub struct CoordinatorPorts {
    pub campaigns: Arc<dyn CampaignRepository>,
    pub rules: Arc<dyn RuleRepository>,
    pub workflows: Arc<dyn WorkflowRepository>,
    pub leases: Arc<dyn LeaseManager>,
    pub processed_events: Arc<dyn ProcessedEventStore>,
    pub configuration: Arc<dyn ConfigurationStore>,
    pub customers: Arc<dyn CustomerStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub dispatcher: Arc<dyn NotificationDispatcher>,
    pub publisher: Arc<dyn EventPublisher>,
}

pub struct DunningCoordinator {
    campaigns: Arc<dyn CampaignRepository>,
    rules: Arc<dyn RuleRepository>,
    workflows: Arc<dyn WorkflowRepository>,
    leases: Arc<dyn LeaseManager>,
    processed_events: Arc<dyn ProcessedEventStore>,
    configuration: Arc<dyn ConfigurationStore>,
    customers: Arc<dyn CustomerStore>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    publisher: Arc<dyn EventPublisher>,
    contexts: ContextBuilder,
    executor: WorkflowExecutor,
    lease_ttl: Duration,
    /// Actor for event and operator paths.
    instance_id: String,
}

impl DunningCoordinator {
    pub fn new(ports: CoordinatorPorts, lease_ttl: Duration) -> Self {
        Self {
            contexts: ContextBuilder::new(ports.customers.clone()),
            executor: WorkflowExecutor::new(ports.gateway, ports.dispatcher.clone()),
            campaigns: ports.campaigns,
            rules: ports.rules,
            workflows: ports.workflows,
            leases: ports.leases,
            processed_events: ports.processed_events,
            configuration: ports.configuration,
            customers: ports.customers,
            dispatcher: ports.dispatcher,
            publisher: ports.publisher,
            lease_ttl,
            instance_id: format!("coordinator-{}", Uuid::new_v4()),
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    // ════════════════════════════════════════════════════════════════════════
    // Gateway events
    // ════════════════════════════════════════════════════════════════════════

    /// Opens a campaign, or folds the failure into the open one.
    pub async fn on_payment_failed(
        &self,
        cmd: PaymentFailedCommand,
        now: Timestamp,
    ) -> Result<FailureOutcome, DunningError> {
        let key = cmd.dedupe_key();
        if !self
            .processed_events
            .mark_processed(&key, PAYMENT_FAILED_HANDLER)
            .await?
        {
            tracing::debug!(key = %key, "duplicate payment failure ignored");
            return Ok(FailureOutcome::Duplicate);
        }

        let result = self.handle_payment_failed(&cmd, now).await;
        if result.is_err() {
            if let Err(e) = self
                .processed_events
                .unmark(&key, PAYMENT_FAILED_HANDLER)
                .await
            {
                tracing::error!(key = %key, error = %e, "failed to release dedupe key");
            }
        }
        result
    }

    async fn handle_payment_failed(
        &self,
        cmd: &PaymentFailedCommand,
        now: Timestamp,
    ) -> Result<FailureOutcome, DunningError> {
        let open = self
            .campaigns
            .find_open_by_subscription(&cmd.subscription_id)
            .await?;
        if !open.is_empty() {
            let survivor = self.merge_duplicates(open, now).await?;
            return self.fold_failure(&survivor, cmd.snapshot(), now).await;
        }

        let settings = self.configuration.settings().await?;
        let customer_id = self.resolve_customer(cmd).await?;
        let payment = cmd.snapshot();
        let facts = CampaignFacts::opening(settings.default_max_attempts, now);
        let ctx = self
            .contexts
            .build(&customer_id, &cmd.subscription_id, &payment, &facts, &settings, now)
            .await?;
        let evaluation = evaluate(&self.rules.list().await?, &ctx);

        let workflow_id = evaluation
            .overrides
            .workflow_id
            .clone()
            .unwrap_or_else(|| settings.default_workflow_id.clone());
        let workflow = match self.workflows.find_latest(&workflow_id).await? {
            Some(wf) => wf,
            None if workflow_id != settings.default_workflow_id => {
                tracing::warn!(workflow_id = %workflow_id, "rule names unknown workflow, using default");
                self.workflows
                    .find_latest(&settings.default_workflow_id)
                    .await?
                    .ok_or_else(|| DunningError::workflow_not_found(settings.default_workflow_id.clone(), None))?
            }
            None => return Err(DunningError::workflow_not_found(workflow_id, None)),
        };

        let mut campaign = Campaign::open(
            NewCampaign {
                subscription_id: cmd.subscription_id.clone(),
                customer_id,
                payment,
                workflow: &workflow,
                max_attempts: settings.default_max_attempts,
            },
            now,
        )?;
        let escalate_now = evaluation.overrides.escalate_immediately;
        campaign.apply_overrides(
            evaluation.matched_rule,
            evaluation.overrides.clone(),
            settings.default_max_attempts,
        );
        campaign.activate(now)?;
        campaign.schedule_at(now);
        if escalate_now {
            campaign.escalate(None, now)?;
        }
        let segment = ctx
            .resolve("customer.segment")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        campaign.refresh_success_probability(segment.as_deref());

        match self.campaigns.create_if_absent(&campaign).await? {
            CreateOutcome::Created => {
                tracing::info!(
                    campaign_id = %campaign.id,
                    subscription_id = %campaign.subscription_id,
                    workflow_id = %campaign.workflow_id,
                    workflow_version = campaign.workflow_version,
                    matched_rule = ?evaluation.matched_rule_name,
                    "campaign opened"
                );
                self.publish(&mut campaign, &self.instance_id).await;
                Ok(FailureOutcome::Opened(campaign.id))
            }
            CreateOutcome::Existing(existing) => {
                tracing::debug!(campaign_id = %existing, "lost creation race, folding");
                self.fold_failure(&existing, cmd.snapshot(), now).await
            }
        }
    }

    async fn resolve_customer(&self, cmd: &PaymentFailedCommand) -> Result<CustomerId, DunningError> {
        if let Some(id) = &cmd.customer_id {
            return Ok(id.clone());
        }
        self.customers
            .subscription(&cmd.subscription_id)
            .await?
            .map(|s| s.customer_id)
            .ok_or_else(|| DunningError::validation("customer_id", "unknown subscription and no customer given"))
    }

    /// Keeps the oldest open campaign and cancels the rest as merged.
    async fn merge_duplicates(
        &self,
        mut open: Vec<Campaign>,
        now: Timestamp,
    ) -> Result<CampaignId, DunningError> {
        open.sort_by_key(|c| c.created_at);
        let survivor = open.remove(0).id;

        for duplicate in open {
            tracing::warn!(
                subscription_id = %duplicate.subscription_id,
                survivor = %survivor,
                duplicate = %duplicate.id,
                "multiple open campaigns for one subscription, merging"
            );
            let merged = self
                .with_lease(&duplicate.id, now, |c| c.merge_into(survivor, now))
                .await;
            if let Err(e) = merged {
                tracing::error!(campaign_id = %duplicate.id, error = %e, "merge deferred");
            }
        }
        Ok(survivor)
    }

    async fn fold_failure(
        &self,
        id: &CampaignId,
        payment: PaymentSnapshot,
        now: Timestamp,
    ) -> Result<FailureOutcome, DunningError> {
        let signal = ExternalSignal::PaymentFailed {
            payment,
            received_at: now,
        };
        match self.deliver_signal(id, signal, now).await? {
            true => Ok(FailureOutcome::Folded(*id)),
            false => Ok(FailureOutcome::Queued(*id)),
        }
    }

    /// Completes the open campaign as recovered.
    pub async fn on_payment_succeeded(
        &self,
        cmd: PaymentSucceededCommand,
        now: Timestamp,
    ) -> Result<ResolutionOutcome, DunningError> {
        let signal = ExternalSignal::PaymentSucceeded {
            payment_id: cmd.payment_id,
            received_at: now,
        };
        self.resolve(&cmd.subscription_id, signal, now).await
    }

    /// Cancels the open campaign.
    pub async fn on_subscription_cancelled(
        &self,
        cmd: SubscriptionCancelledCommand,
        now: Timestamp,
    ) -> Result<ResolutionOutcome, DunningError> {
        let signal = ExternalSignal::SubscriptionCancelled { received_at: now };
        self.resolve(&cmd.subscription_id, signal, now).await
    }

    async fn resolve(
        &self,
        subscription_id: &SubscriptionId,
        signal: ExternalSignal,
        now: Timestamp,
    ) -> Result<ResolutionOutcome, DunningError> {
        let open = self.campaigns.find_open_by_subscription(subscription_id).await?;
        if open.is_empty() {
            tracing::debug!(subscription_id = %subscription_id, "no open campaign to resolve");
            return Ok(ResolutionOutcome::NoOpenCampaign);
        }

        // Duplicates are resolved too rather than merged first
        let mut resolved = None;
        let mut queued = None;
        for campaign in &open {
            if self.deliver_signal(&campaign.id, signal.clone(), now).await? {
                resolved.get_or_insert(campaign.id);
            } else {
                queued.get_or_insert(campaign.id);
            }
        }
        Ok(match (resolved, queued) {
            (Some(id), _) => ResolutionOutcome::Resolved(id),
            (None, Some(id)) => ResolutionOutcome::Queued(id),
            (None, None) => ResolutionOutcome::NoOpenCampaign,
        })
    }

    /// Queues the signal, then applies it at once if the lease is free.
    /// Returns `false` when it stays queued for the current holder.
    async fn deliver_signal(
        &self,
        id: &CampaignId,
        signal: ExternalSignal,
        now: Timestamp,
    ) -> Result<bool, DunningError> {
        self.campaigns.enqueue_signal(id, &signal).await?;
        let owner = self.instance_id.as_str();
        let lease = lease_token(owner);
        if !self.acquire(id, &lease).await? {
            tracing::info!(campaign_id = %id, "campaign leased, signal queued");
            return Ok(false);
        }
        let result = async {
            let mut campaign = self.load(id).await?;
            self.drain_signals(&mut campaign, owner, now).await
        }
        .await;
        self.release(id, &lease).await;
        result.map(|_| true)
    }

    // ════════════════════════════════════════════════════════════════════════
    // Scheduler ticks
    // ════════════════════════════════════════════════════════════════════════

    /// Advances one campaign if it is due. Never blocks on a held lease.
    pub async fn tick(
        &self,
        id: &CampaignId,
        owner: &str,
        now: Timestamp,
    ) -> Result<TickOutcome, DunningError> {
        let lease = lease_token(owner);
        if !self.acquire(id, &lease).await? {
            tracing::debug!(campaign_id = %id, owner, "lease held elsewhere, skipping");
            return Ok(TickOutcome::Skipped(SkipReason::LeaseHeld));
        }
        let result = self.tick_locked(id, owner, now).await;
        self.release(id, &lease).await;
        result
    }

    async fn tick_locked(
        &self,
        id: &CampaignId,
        owner: &str,
        now: Timestamp,
    ) -> Result<TickOutcome, DunningError> {
        let mut campaign = self.load(id).await?;
        let signals = self.campaigns.take_signals(id).await?;

        let result = self.tick_campaign(&mut campaign, &signals, owner, now).await;
        if result.is_err() {
            self.requeue(id, &signals).await;
        }
        let outcome = result?;

        if let Err(e) = self.drain_signals(&mut campaign, owner, now).await {
            tracing::error!(campaign_id = %id, error = %e, "failed to apply queued signals");
        }
        Ok(outcome)
    }

    /// Returns `Err` only when nothing was committed.
    async fn tick_campaign(
        &self,
        campaign: &mut Campaign,
        signals: &[ExternalSignal],
        owner: &str,
        now: Timestamp,
    ) -> Result<TickOutcome, DunningError> {
        let signalled = apply_signals(campaign, signals, now)?;

        let skip = if !campaign.is_open() {
            Some(SkipReason::Closed)
        } else if campaign.status == CampaignStatus::Paused {
            Some(SkipReason::Paused)
        } else if !campaign.is_due(now) {
            Some(SkipReason::NotDue)
        } else {
            None
        };
        if let Some(reason) = skip {
            if signalled {
                self.save(campaign, owner).await?;
                return Ok(TickOutcome::SignalsApplied);
            }
            return Ok(TickOutcome::Skipped(reason));
        }

        let settings = self.configuration.settings().await?;
        let mut ctx = self
            .contexts
            .build(
                &campaign.customer_id,
                &campaign.subscription_id,
                &campaign.payment,
                &CampaignFacts::of(campaign),
                &settings,
                now,
            )
            .await?;
        let evaluation = evaluate(&self.rules.list().await?, &ctx);
        self.apply_evaluation(campaign, evaluation, &settings, &mut ctx, now)
            .await?;

        let advanced = match self
            .workflows
            .find_version(&campaign.workflow_id, campaign.workflow_version)
            .await?
        {
            Some(workflow) => {
                self.executor
                    .advance(campaign, &workflow, &mut ctx, &settings, now)
                    .await
            }
            None => Err(DunningError::invariant(format!(
                "pinned workflow {} v{} is missing",
                campaign.workflow_id, campaign.workflow_version
            ))),
        };

        let outcome = match advanced {
            Ok(report) => {
                match &report.stop {
                    Stop::Blocked { error, .. } => campaign.record_transient_failure(
                        error.clone(),
                        settings.backoff_base_secs,
                        settings.backoff_max_secs,
                        now,
                    ),
                    _ => campaign.clear_transient_failures(),
                }
                TickOutcome::Advanced(report)
            }
            Err(DunningError::InvariantViolation(message)) => {
                tracing::error!(campaign_id = %campaign.id, error = %message, "campaign faulted");
                campaign.record_transient_failure(
                    message.clone(),
                    settings.backoff_base_secs,
                    settings.backoff_max_secs,
                    now,
                );
                TickOutcome::Faulted(message)
            }
            Err(e) => return Err(e),
        };

        let segment = ctx
            .resolve("customer.segment")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        campaign.refresh_success_probability(segment.as_deref());
        self.save(campaign, owner).await?;
        Ok(outcome)
    }

    /// Applies the matched rule's overrides for this tick.
    async fn apply_evaluation(
        &self,
        campaign: &mut Campaign,
        evaluation: EvaluationResult,
        settings: &DunningSettings,
        ctx: &mut EvaluationContext,
        now: Timestamp,
    ) -> Result<(), DunningError> {
        let overrides = evaluation.overrides;
        campaign.apply_overrides(evaluation.matched_rule, overrides.clone(), settings.default_max_attempts);
        ctx.set("campaign.maxAttempts", json!(campaign.max_attempts));
        ctx.set("campaign.tags", json!(campaign.tags));

        if let Some(target) = overrides.workflow_id.as_ref().filter(|t| **t != campaign.workflow_id) {
            match self.workflows.find_latest(target).await? {
                Some(workflow) => {
                    tracing::info!(campaign_id = %campaign.id, workflow_id = %target, "redirecting campaign");
                    campaign.redirect(&workflow, now)?;
                }
                None => {
                    tracing::warn!(campaign_id = %campaign.id, workflow_id = %target, "rule names unknown workflow")
                }
            }
        }

        if overrides.escalate_immediately && campaign.escalated_at.is_none() {
            campaign.escalate(None, now)?;
        }

        if overrides.notify_account_manager && !campaign.account_manager_notified() {
            let mut merge = ctx.as_json();
            merge["campaign"]["id"] = json!(campaign.id.to_string());
            let notification = Notification {
                template_id: settings.account_manager_template_id.clone(),
                channel: settings.account_manager_channel,
                merge_context: merge,
                idempotency_key: format!("{}:account_manager", campaign.id),
            };
            match self.dispatcher.send(&notification).await {
                Ok(DeliveryResult::Delivered) => campaign.record_account_manager_notified(now),
                Ok(DeliveryResult::Failed { reason }) => {
                    tracing::warn!(campaign_id = %campaign.id, reason = %reason, "account manager notification failed");
                    campaign.record_account_manager_notified(now);
                }
                Err(e) => {
                    tracing::warn!(campaign_id = %campaign.id, error = %e, "account manager notification deferred")
                }
            }
        }
        Ok(())
    }

    // ════════════════════════════════════════════════════════════════════════
    // Operator actions
    // ════════════════════════════════════════════════════════════════════════

    pub async fn pause(&self, id: &CampaignId, now: Timestamp) -> Result<Campaign, DunningError> {
        self.with_lease(id, now, |c| c.pause(now)).await
    }

    pub async fn resume(&self, id: &CampaignId, now: Timestamp) -> Result<Campaign, DunningError> {
        self.with_lease(id, now, |c| c.resume(now)).await
    }

    pub async fn cancel(&self, id: &CampaignId, now: Timestamp) -> Result<Campaign, DunningError> {
        self.with_lease(id, now, |c| c.cancel(CampaignOutcome::OperatorCancelled, now))
            .await
    }

    /// Overrides the next action time.
    pub async fn modify_next(
        &self,
        id: &CampaignId,
        due_at: Timestamp,
        now: Timestamp,
    ) -> Result<Campaign, DunningError> {
        self.with_lease(id, now, |c| c.reschedule(due_at, now)).await
    }

    /// Runs `op` on the campaign under the coordinator's lease.
    async fn with_lease<F>(&self, id: &CampaignId, now: Timestamp, op: F) -> Result<Campaign, DunningError>
    where
        F: FnOnce(&mut Campaign) -> Result<(), DunningError>,
    {
        let owner = self.instance_id.as_str();
        let lease = lease_token(owner);
        if !self.acquire(id, &lease).await? {
            return Err(DunningError::LeaseUnavailable(*id));
        }
        let result = async {
            let mut campaign = self.load(id).await?;
            self.drain_signals(&mut campaign, owner, now).await?;
            op(&mut campaign)?;
            self.save(&mut campaign, owner).await?;
            Ok(campaign)
        }
        .await;
        self.release(id, &lease).await;
        result
    }

    // ════════════════════════════════════════════════════════════════════════
    // Helpers
    // ════════════════════════════════════════════════════════════════════════

    async fn load(&self, id: &CampaignId) -> Result<Campaign, DunningError> {
        self.campaigns
            .find_by_id(id)
            .await?
            .ok_or(DunningError::CampaignNotFound(*id))
    }

    /// Applies and commits queued signals. The lease must be held.
    async fn drain_signals(
        &self,
        campaign: &mut Campaign,
        owner: &str,
        now: Timestamp,
    ) -> Result<(), DunningError> {
        let signals = self.campaigns.take_signals(&campaign.id).await?;
        if signals.is_empty() {
            return Ok(());
        }
        let result = async {
            if apply_signals(campaign, &signals, now)? {
                self.save(campaign, owner).await?;
            }
            Ok(())
        }
        .await;
        if result.is_err() {
            self.requeue(&campaign.id, &signals).await;
        }
        result
    }

    async fn requeue(&self, id: &CampaignId, signals: &[ExternalSignal]) {
        for signal in signals {
            if let Err(e) = self.campaigns.enqueue_signal(id, signal).await {
                tracing::error!(campaign_id = %id, error = %e, "lost queued signal");
            }
        }
    }

    /// Compare-and-set save, then publish.
    async fn save(&self, campaign: &mut Campaign, owner: &str) -> Result<(), DunningError> {
        self.campaigns
            .update(campaign)
            .await
            .map_err(|e| update_error(campaign.id, e))?;
        campaign.version += 1;
        self.publish(campaign, owner).await;
        Ok(())
    }

    /// Publishes buffered events. Failures are logged; the change is committed.
    async fn publish(&self, campaign: &mut Campaign, owner: &str) {
        let mut envelopes = Vec::new();
        for event in campaign.take_events() {
            match event.to_envelope() {
                Ok(envelope) => envelopes.push(
                    envelope
                        .with_actor(owner)
                        .with_correlation_id(campaign.payment.payment_id.as_str()),
                ),
                Err(e) => tracing::error!(campaign_id = %campaign.id, error = %e, "event serialization failed"),
            }
        }
        if envelopes.is_empty() {
            return;
        }
        if let Err(e) = self.publisher.publish_all(envelopes).await {
            tracing::error!(campaign_id = %campaign.id, error = %e, "event publishing failed");
        }
    }

    async fn acquire(&self, id: &CampaignId, lease: &str) -> Result<bool, DunningError> {
        Ok(self.leases.try_acquire(id, lease, self.lease_ttl).await?)
    }

    async fn release(&self, id: &CampaignId, lease: &str) {
        match self.leases.release(id, lease).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(campaign_id = %id, lease, "lease expired before release"),
            Err(e) => tracing::error!(campaign_id = %id, lease, error = %e, "lease release failed"),
        }
    }
}

/// One token per guarded operation; leases are not reentrant.
fn lease_token(actor: &str) -> String {
    format!("{}:{}", actor, Uuid::new_v4())
}

fn apply_signals(
    campaign: &mut Campaign,
    signals: &[ExternalSignal],
    now: Timestamp,
) -> Result<bool, DunningError> {
    let mut applied = false;
    for signal in signals {
        applied |= campaign.apply_signal(signal.clone(), now)?;
    }
    if applied {
        tracing::info!(
            campaign_id = %campaign.id,
            status = %campaign.status,
            signals = signals.len(),
            "queued signals applied"
        );
    }
    Ok(applied)
}

fn update_error(id: CampaignId, err: DomainError) -> DunningError {
    match err.code {
        ErrorCode::VersionConflict => DunningError::Conflict(id),
        ErrorCode::CampaignNotFound => DunningError::CampaignNotFound(id),
        _ => err.into(),
    }
}
