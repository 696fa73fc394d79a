//! Shared fixtures: a coordinator over in-memory ports, with handles to
//! every fake so tests can script and inspect collaborators.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use dunning_engine::adapters::events::InMemoryEventBus;
use dunning_engine::adapters::gateway::MockPaymentGateway;
use dunning_engine::adapters::memory::{
    InMemoryCampaignRepository, InMemoryCustomerStore, InMemoryLeaseManager,
    InMemoryProcessedEventStore, InMemoryRuleRepository, InMemoryWorkflowRepository,
    StaticConfigurationStore,
};
use dunning_engine::adapters::notifications::RecordingDispatcher;
use dunning_engine::application::{
    CoordinatorPorts, DunningCoordinator, PaymentFailedCommand, RuleAdminHandler, Scheduler,
    SchedulerConfig, WorkflowAdminHandler,
};
use dunning_engine::domain::campaign::{Campaign, ExternalSignal};
use dunning_engine::domain::foundation::{
    CampaignId, CustomerId, DomainError, PaymentId, SubscriptionId, Timestamp,
};
use dunning_engine::domain::rules::RuleDraft;
use dunning_engine::domain::workflow::WorkflowDraft;
use dunning_engine::ports::{
    CampaignFilter, CampaignPage, CampaignRepository, CreateOutcome, CustomerProfile,
    DunningSettings, SubscriptionProfile,
};

pub const LEASE_TTL: Duration = Duration::from_secs(30);

pub struct Harness {
    pub campaigns: Arc<InMemoryCampaignRepository>,
    pub rules: Arc<InMemoryRuleRepository>,
    pub workflows: Arc<InMemoryWorkflowRepository>,
    pub leases: Arc<InMemoryLeaseManager>,
    pub customers: Arc<InMemoryCustomerStore>,
    pub configuration: Arc<StaticConfigurationStore>,
    pub gateway: Arc<MockPaymentGateway>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub bus: Arc<InMemoryEventBus>,
    pub coordinator: Arc<DunningCoordinator>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_gateway(MockPaymentGateway::new())
    }

    pub fn with_gateway(gateway: MockPaymentGateway) -> Self {
        Self::build(gateway, None)
    }

    /// The coordinator's campaign loads sleep for `latency`, widening the
    /// window in which a second operation can race the first.
    pub fn with_load_latency(latency: Duration) -> Self {
        Self::build(MockPaymentGateway::new(), Some(latency))
    }

    fn build(gateway: MockPaymentGateway, load_latency: Option<Duration>) -> Self {
        let campaigns = Arc::new(InMemoryCampaignRepository::new());
        let rules = Arc::new(InMemoryRuleRepository::new());
        let workflows = Arc::new(InMemoryWorkflowRepository::new());
        let leases = Arc::new(InMemoryLeaseManager::new());
        let customers = Arc::new(InMemoryCustomerStore::new());
        let configuration = Arc::new(StaticConfigurationStore::new(DunningSettings::default()));
        let gateway = Arc::new(gateway);
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let campaign_port: Arc<dyn CampaignRepository> = match load_latency {
            Some(latency) => Arc::new(SlowLoads {
                inner: campaigns.clone(),
                latency,
            }),
            None => campaigns.clone(),
        };

        let coordinator = Arc::new(DunningCoordinator::new(
            CoordinatorPorts {
                campaigns: campaign_port,
                rules: rules.clone(),
                workflows: workflows.clone(),
                leases: leases.clone(),
                processed_events: Arc::new(InMemoryProcessedEventStore::new()),
                configuration: configuration.clone(),
                customers: customers.clone(),
                gateway: gateway.clone(),
                dispatcher: dispatcher.clone(),
                publisher: bus.clone(),
            },
            LEASE_TTL,
        ));

        Self {
            campaigns,
            rules,
            workflows,
            leases,
            customers,
            configuration,
            gateway,
            dispatcher,
            bus,
            coordinator,
        }
    }

    pub fn scheduler(&self, worker_id: &str) -> Scheduler {
        Scheduler::new(
            self.coordinator.clone(),
            self.campaigns.clone(),
            SchedulerConfig::default(),
        )
        .with_worker_id(worker_id)
    }

    pub async fn save_workflow(&self, draft: serde_json::Value) {
        let draft: WorkflowDraft = serde_json::from_value(draft).unwrap();
        WorkflowAdminHandler::new(self.workflows.clone())
            .save(draft, Timestamp::now())
            .await
            .unwrap();
    }

    pub async fn save_rule(&self, draft: serde_json::Value) {
        let draft: RuleDraft = serde_json::from_value(draft).unwrap();
        RuleAdminHandler::new(self.rules.clone(), self.workflows.clone())
            .create(draft, Timestamp::now())
            .await
            .unwrap();
    }

    pub async fn enterprise_customer(&self) {
        self.customers
            .insert_customer(CustomerProfile {
                id: CustomerId::new("cus_1").unwrap(),
                name: "Acme Corp".into(),
                email: "billing@acme.example".into(),
                segment: Some("enterprise".into()),
                lifetime_value_cents: 2_500_000,
                created_at: Timestamp::now().add_days(-400),
                account_manager: Some("dana@vendor.example".into()),
                attributes: Default::default(),
            })
            .await;
        self.customers
            .insert_subscription(SubscriptionProfile {
                id: SubscriptionId::new("sub_1").unwrap(),
                customer_id: CustomerId::new("cus_1").unwrap(),
                plan: "enterprise".into(),
                value_cents: 99_900,
                billing_interval: "monthly".into(),
                attributes: Default::default(),
            })
            .await;
    }

    pub async fn campaign(&self, id: &CampaignId) -> Campaign {
        self.campaigns.find_by_id(id).await.unwrap().unwrap()
    }
}

/// Delegates to the in-memory store; `find_by_id` sleeps first.
struct SlowLoads {
    inner: Arc<InMemoryCampaignRepository>,
    latency: Duration,
}

#[async_trait]
impl CampaignRepository for SlowLoads {
    async fn create_if_absent(&self, campaign: &Campaign) -> Result<CreateOutcome, DomainError> {
        self.inner.create_if_absent(campaign).await
    }

    async fn update(&self, campaign: &Campaign) -> Result<(), DomainError> {
        self.inner.update(campaign).await
    }

    async fn find_by_id(&self, id: &CampaignId) -> Result<Option<Campaign>, DomainError> {
        tokio::time::sleep(self.latency).await;
        self.inner.find_by_id(id).await
    }

    async fn find_open_by_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<Campaign>, DomainError> {
        self.inner.find_open_by_subscription(subscription_id).await
    }

    async fn find_latest_by_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Option<Campaign>, DomainError> {
        self.inner.find_latest_by_subscription(subscription_id).await
    }

    async fn find_due(&self, now: Timestamp, limit: u32) -> Result<Vec<CampaignId>, DomainError> {
        self.inner.find_due(now, limit).await
    }

    async fn list(&self, filter: &CampaignFilter) -> Result<CampaignPage, DomainError> {
        self.inner.list(filter).await
    }

    async fn enqueue_signal(&self, id: &CampaignId, signal: &ExternalSignal) -> Result<(), DomainError> {
        self.inner.enqueue_signal(id, signal).await
    }

    async fn take_signals(&self, id: &CampaignId) -> Result<Vec<ExternalSignal>, DomainError> {
        self.inner.take_signals(id).await
    }
}

pub fn failure(payment: &str, failure_count: u32) -> PaymentFailedCommand {
    PaymentFailedCommand {
        subscription_id: SubscriptionId::new("sub_1").unwrap(),
        customer_id: Some(CustomerId::new("cus_1").unwrap()),
        payment_id: PaymentId::new(payment).unwrap(),
        amount_cents: 4_900,
        currency: "USD".into(),
        failure_reason: "insufficient_funds".into(),
        failure_count,
    }
}

/// start → retry → grace → final_retry → end
pub fn grace_workflow() -> serde_json::Value {
    json!({
        "id": "standard",
        "name": "Standard",
        "nodes": [
            { "id": "start", "kind": { "type": "start" } },
            { "id": "retry", "kind": { "type": "action", "action": { "kind": "retry" } } },
            { "id": "grace_period", "kind": { "type": "wait", "wait": "grace" } },
            { "id": "final_retry", "kind": { "type": "action", "action": { "kind": "retry" } } },
            { "id": "end", "kind": { "type": "end" } }
        ],
        "edges": [
            { "from": "start", "to": "retry" },
            { "from": "retry", "to": "grace_period" },
            { "from": "grace_period", "to": "final_retry" },
            { "from": "final_retry", "to": "end" }
        ]
    })
}

/// start → retry → notify → check{attempts < max → delay → retry; default → suspend → end}
pub fn looping_workflow() -> serde_json::Value {
    json!({
        "id": "standard",
        "name": "Looping",
        "nodes": [
            { "id": "start", "kind": { "type": "start" } },
            { "id": "retry", "kind": { "type": "action", "action": { "kind": "retry" } } },
            { "id": "notify", "kind": { "type": "action", "action": {
                "kind": "send_email", "template_id": "payment_failed" } } },
            { "id": "check", "kind": { "type": "condition" } },
            { "id": "delay", "kind": { "type": "wait", "wait": "delay" } },
            { "id": "suspend", "kind": { "type": "action", "action": { "kind": "suspend_account" } } },
            { "id": "end", "kind": { "type": "end" } }
        ],
        "edges": [
            { "from": "start", "to": "retry" },
            { "from": "retry", "to": "notify" },
            { "from": "notify", "to": "check" },
            { "from": "check", "to": "delay", "guard": { "type": "when", "conditions": [
                { "field": "campaign.attemptCount", "operator": "less_than", "value": 4 }
            ] } },
            { "from": "check", "to": "suspend", "guard": { "type": "default" } },
            { "from": "delay", "to": "retry" },
            { "from": "suspend", "to": "end" }
        ]
    })
}
