//! Re-running `advance` over recorded history never repeats side effects.

mod common;

use std::sync::Arc;

use common::{grace_workflow, looping_workflow};
use dunning_engine::adapters::gateway::MockPaymentGateway;
use dunning_engine::adapters::notifications::RecordingDispatcher;
use dunning_engine::application::{assemble_context, CampaignFacts, Stop, WorkflowExecutor};
use dunning_engine::domain::campaign::{Campaign, NewCampaign, PaymentSnapshot};
use dunning_engine::domain::foundation::{
    CustomerId, NodeId, PaymentId, SubscriptionId, Timestamp,
};
use dunning_engine::domain::workflow::{WorkflowDefinition, WorkflowDraft};
use dunning_engine::ports::DunningSettings;

struct Fixture {
    gateway: Arc<MockPaymentGateway>,
    dispatcher: Arc<RecordingDispatcher>,
    executor: WorkflowExecutor,
    settings: DunningSettings,
}

impl Fixture {
    fn new() -> Self {
        let gateway = Arc::new(MockPaymentGateway::new());
        let dispatcher = Arc::new(RecordingDispatcher::new());
        Self {
            executor: WorkflowExecutor::new(gateway.clone(), dispatcher.clone()),
            gateway,
            dispatcher,
            settings: DunningSettings::default(),
        }
    }

    async fn advance(&self, campaign: &mut Campaign, workflow: &WorkflowDefinition, now: Timestamp) -> Stop {
        let mut ctx = assemble_context(
            None,
            None,
            &campaign.payment,
            &CampaignFacts::of(campaign),
            &self.settings,
            now,
        );
        self.executor
            .advance(campaign, workflow, &mut ctx, &self.settings, now)
            .await
            .unwrap()
            .stop
    }
}

fn definition(draft: serde_json::Value, now: Timestamp) -> WorkflowDefinition {
    let draft: WorkflowDraft = serde_json::from_value(draft).unwrap();
    WorkflowDefinition::create(draft, 1, now).unwrap()
}

fn campaign(workflow: &WorkflowDefinition, now: Timestamp) -> Campaign {
    let mut campaign = Campaign::open(
        NewCampaign {
            subscription_id: SubscriptionId::new("sub_1").unwrap(),
            customer_id: CustomerId::new("cus_1").unwrap(),
            payment: PaymentSnapshot {
                payment_id: PaymentId::new("pay_1").unwrap(),
                amount_cents: 4_900,
                currency: "USD".into(),
                failure_reason: "card_declined".into(),
                failure_count: 1,
            },
            workflow,
            max_attempts: 4,
        },
        now,
    )
    .unwrap();
    campaign.activate(now).unwrap();
    campaign.schedule_at(now);
    campaign
}

#[tokio::test]
async fn second_advance_at_the_same_instant_is_a_no_op() {
    let f = Fixture::new();
    let now = Timestamp::now();
    let workflow = definition(grace_workflow(), now);
    let mut c = campaign(&workflow, now);

    assert_eq!(f.advance(&mut c, &workflow, now).await, Stop::Waiting);
    let node = c.current_node_id.clone();
    let history = c.history.len();
    let due = c.next_action_due_at;

    assert_eq!(f.advance(&mut c, &workflow, now).await, Stop::Waiting);

    assert_eq!(c.current_node_id, node);
    assert_eq!(c.history.len(), history);
    assert_eq!(c.next_action_due_at, due);
    assert_eq!(f.gateway.retry_calls().len(), 1);
}

#[tokio::test]
async fn rewound_campaign_replays_recorded_steps() {
    let f = Fixture::new();
    let now = Timestamp::now();
    let workflow = definition(looping_workflow(), now);
    let mut c = campaign(&workflow, now);

    assert_eq!(f.advance(&mut c, &workflow, now).await, Stop::Waiting);
    let history = c.history.len();
    let attempts = c.attempt_count;
    let sent = f.dispatcher.sent_count();

    // As if the retry had been recorded but the move after it was lost
    c.move_to(NodeId::new("retry").unwrap());
    c.attempt_count = 1;

    assert_eq!(f.advance(&mut c, &workflow, now).await, Stop::Waiting);

    assert_eq!(c.current_node_id.as_str(), "delay");
    assert_eq!(c.attempt_count, attempts);
    assert_eq!(c.history.len(), history);
    assert_eq!(f.gateway.retry_calls().len(), 1);
    assert_eq!(f.dispatcher.sent_count(), sent);
}
