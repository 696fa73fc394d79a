//! Concurrent work against one campaign: exactly one lease holder at a time.

mod common;

use std::time::Duration;

use common::{failure, grace_workflow, Harness};
use dunning_engine::adapters::gateway::MockPaymentGateway;
use dunning_engine::application::{
    FailureOutcome, ResolutionOutcome, SkipReason, SubscriptionCancelledCommand, TickOutcome,
};
use dunning_engine::domain::campaign::{CampaignOutcome, CampaignStatus, DunningError};
use dunning_engine::domain::foundation::{CampaignId, SubscriptionId, Timestamp};

async fn slow_harness() -> (Harness, CampaignId, Timestamp) {
    let h = Harness::with_gateway(MockPaymentGateway::new().with_latency(Duration::from_secs(5)));
    h.save_workflow(grace_workflow()).await;
    let now = Timestamp::now();
    let id = match h.coordinator.on_payment_failed(failure("pay_1", 1), now).await.unwrap() {
        FailureOutcome::Opened(id) => id,
        other => panic!("expected a new campaign, got {:?}", other),
    };
    (h, id, now)
}

#[tokio::test(start_paused = true)]
async fn concurrent_ticks_execute_once() {
    let (h, id, now) = slow_harness().await;

    let (a, b) = tokio::join!(
        h.coordinator.tick(&id, "worker-a", now),
        h.coordinator.tick(&id, "worker-b", now),
    );
    let outcomes = [a.unwrap(), b.unwrap()];

    let advanced = outcomes
        .iter()
        .filter(|o| matches!(o, TickOutcome::Advanced(_)))
        .count();
    let held = outcomes
        .iter()
        .filter(|o| **o == TickOutcome::Skipped(SkipReason::LeaseHeld))
        .count();
    assert_eq!((advanced, held), (1, 1));
    assert_eq!(h.gateway.retry_calls().len(), 1);
    assert_eq!(h.leases.holder(&id).await, None);
}

#[tokio::test(start_paused = true)]
async fn competing_schedulers_share_the_due_campaign() {
    let (h, id, now) = slow_harness().await;
    let first = h.scheduler("scheduler-a");
    let second = h.scheduler("scheduler-b");

    let (a, b) = tokio::join!(first.poll_once(now), second.poll_once(now));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.selected + b.selected, 2);
    assert_eq!(a.advanced + b.advanced, 1);
    assert_eq!(a.skipped + b.skipped, 1);
    assert_eq!(a.failed + b.failed, 0);
    assert_eq!(h.gateway.retry_calls().len(), 1);

    let campaign = h.campaign(&id).await;
    assert_eq!(campaign.current_node_id.as_str(), "grace_period");

    // Nothing is due until the grace wait elapses
    let idle = first.poll_once(now).await.unwrap();
    assert_eq!(idle.selected, 0);
}

#[tokio::test(start_paused = true)]
async fn operator_action_and_event_on_one_coordinator_do_not_interleave() {
    let h = Harness::with_load_latency(Duration::from_millis(100));
    h.save_workflow(grace_workflow()).await;
    let now = Timestamp::now();
    let id = match h.coordinator.on_payment_failed(failure("pay_1", 1), now).await.unwrap() {
        FailureOutcome::Opened(id) => id,
        other => panic!("expected a new campaign, got {:?}", other),
    };

    let (paused, cancelled) = tokio::join!(
        h.coordinator.pause(&id, now),
        h.coordinator.on_subscription_cancelled(
            SubscriptionCancelledCommand {
                subscription_id: SubscriptionId::new("sub_1").unwrap(),
            },
            now,
        ),
    );

    // The pause holds the lease, so the cancellation is queued for it
    assert_eq!(cancelled.unwrap(), ResolutionOutcome::Queued(id));
    // and drained before the pause applies, which then finds nothing to pause
    assert!(matches!(paused.unwrap_err(), DunningError::InvalidState { .. }));

    let campaign = h.campaign(&id).await;
    assert_eq!(campaign.status, CampaignStatus::Cancelled);
    assert_eq!(campaign.outcome, Some(CampaignOutcome::SubscriptionCancelled));
    assert_eq!(h.leases.holder(&id).await, None);
}

#[tokio::test(start_paused = true)]
async fn concurrent_operator_actions_on_one_coordinator_refuse_the_second() {
    let h = Harness::with_load_latency(Duration::from_millis(100));
    h.save_workflow(grace_workflow()).await;
    let now = Timestamp::now();
    let id = match h.coordinator.on_payment_failed(failure("pay_1", 1), now).await.unwrap() {
        FailureOutcome::Opened(id) => id,
        other => panic!("expected a new campaign, got {:?}", other),
    };

    let (paused, cancelled) = tokio::join!(h.coordinator.pause(&id, now), h.coordinator.cancel(&id, now));

    assert_eq!(paused.unwrap().status, CampaignStatus::Paused);
    assert!(matches!(cancelled.unwrap_err(), DunningError::LeaseUnavailable(_)));
    assert_eq!(h.campaign(&id).await.status, CampaignStatus::Paused);
}
