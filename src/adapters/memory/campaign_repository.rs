//! In-memory campaign store with the same contract as the Postgres one.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::campaign::{Campaign, ExternalSignal};
use crate::domain::foundation::{
    CampaignId, DomainError, ErrorCode, SubscriptionId, Timestamp,
};
use crate::ports::{CampaignFilter, CampaignPage, CampaignRepository, CampaignSort, CreateOutcome};

#[derive(Debug, Clone)]
struct StoredCampaign {
    campaign: Campaign,
    signals: Vec<ExternalSignal>,
}

#[derive(Debug, Default)]
pub struct InMemoryCampaignRepository {
    campaigns: RwLock<HashMap<CampaignId, StoredCampaign>>,
}

impl InMemoryCampaignRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored campaigns, open or closed.
    pub async fn len(&self) -> usize {
        self.campaigns.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn not_found(id: &CampaignId) -> DomainError {
    DomainError::new(ErrorCode::CampaignNotFound, format!("Campaign not found: {}", id))
}

#[async_trait]
impl CampaignRepository for InMemoryCampaignRepository {
    async fn create_if_absent(&self, campaign: &Campaign) -> Result<CreateOutcome, DomainError> {
        let mut campaigns = self.campaigns.write().await;

        if let Some(existing) = campaigns
            .values()
            .find(|s| s.campaign.subscription_id == campaign.subscription_id && s.campaign.is_open())
        {
            return Ok(CreateOutcome::Existing(existing.campaign.id));
        }

        campaigns.insert(
            campaign.id,
            StoredCampaign {
                campaign: campaign.clone(),
                signals: Vec::new(),
            },
        );
        Ok(CreateOutcome::Created)
    }

    async fn update(&self, campaign: &Campaign) -> Result<(), DomainError> {
        let mut campaigns = self.campaigns.write().await;
        let stored = campaigns.get_mut(&campaign.id).ok_or_else(|| not_found(&campaign.id))?;

        if stored.campaign.version != campaign.version {
            return Err(DomainError::new(
                ErrorCode::VersionConflict,
                format!(
                    "Campaign {} is at version {}, update was based on {}",
                    campaign.id, stored.campaign.version, campaign.version
                ),
            ));
        }

        let mut next = campaign.clone();
        next.version += 1;
        stored.campaign = next;
        Ok(())
    }

    async fn find_by_id(&self, id: &CampaignId) -> Result<Option<Campaign>, DomainError> {
        Ok(self.campaigns.read().await.get(id).map(|s| s.campaign.clone()))
    }

    async fn find_open_by_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<Campaign>, DomainError> {
        let mut open: Vec<Campaign> = self
            .campaigns
            .read()
            .await
            .values()
            .filter(|s| &s.campaign.subscription_id == subscription_id && s.campaign.is_open())
            .map(|s| s.campaign.clone())
            .collect();
        open.sort_by_key(|c| c.created_at);
        Ok(open)
    }

    async fn find_latest_by_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Option<Campaign>, DomainError> {
        let campaigns = self.campaigns.read().await;
        let mut matching: Vec<&Campaign> = campaigns
            .values()
            .map(|s| &s.campaign)
            .filter(|c| &c.subscription_id == subscription_id)
            .collect();
        // Open first, then newest.
        matching.sort_by(|a, b| b.is_open().cmp(&a.is_open()).then(b.created_at.cmp(&a.created_at)));
        Ok(matching.first().map(|c| (*c).clone()))
    }

    async fn find_due(&self, now: Timestamp, limit: u32) -> Result<Vec<CampaignId>, DomainError> {
        let campaigns = self.campaigns.read().await;
        let mut due: Vec<(Timestamp, CampaignId)> = campaigns
            .values()
            .filter(|s| s.campaign.is_due(now) || (!s.signals.is_empty() && s.campaign.is_open()))
            .map(|s| (s.campaign.next_action_due_at.unwrap_or(now), s.campaign.id))
            .collect();
        due.sort();
        Ok(due.into_iter().take(limit as usize).map(|(_, id)| id).collect())
    }

    async fn list(&self, filter: &CampaignFilter) -> Result<CampaignPage, DomainError> {
        let campaigns = self.campaigns.read().await;
        let mut items: Vec<Campaign> = campaigns
            .values()
            .map(|s| &s.campaign)
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();

        match filter.sort {
            CampaignSort::DueAt => items.sort_by(|a, b| {
                // Unscheduled campaigns sort last.
                match (a.next_action_due_at, b.next_action_due_at) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => a.created_at.cmp(&b.created_at),
                }
            }),
            CampaignSort::CreatedAt => items.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            CampaignSort::Attempts => items.sort_by(|a, b| b.attempt_count.cmp(&a.attempt_count)),
        }

        let total = items.len() as u64;
        let items = items
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .collect();
        Ok(CampaignPage { items, total })
    }

    async fn enqueue_signal(
        &self,
        id: &CampaignId,
        signal: &ExternalSignal,
    ) -> Result<(), DomainError> {
        let mut campaigns = self.campaigns.write().await;
        let stored = campaigns.get_mut(id).ok_or_else(|| not_found(id))?;
        stored.signals.push(signal.clone());
        Ok(())
    }

    async fn take_signals(&self, id: &CampaignId) -> Result<Vec<ExternalSignal>, DomainError> {
        let mut campaigns = self.campaigns.write().await;
        let stored = campaigns.get_mut(id).ok_or_else(|| not_found(id))?;
        Ok(std::mem::take(&mut stored.signals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::campaign::{NewCampaign, PaymentSnapshot};
    use crate::domain::foundation::{CustomerId, NodeId, PaymentId, WorkflowId};
    use crate::domain::workflow::{WorkflowDefinition, WorkflowDraft, WorkflowEdge, WorkflowNode, NodeKind};

    fn workflow() -> WorkflowDefinition {
        let start = NodeId::new("start").unwrap();
        let end = NodeId::new("end").unwrap();
        WorkflowDefinition::create(
            WorkflowDraft {
                id: WorkflowId::new("standard").unwrap(),
                name: "Standard".into(),
                description: None,
                nodes: vec![
                    WorkflowNode::new(start.clone(), NodeKind::Start),
                    WorkflowNode::new(end.clone(), NodeKind::End),
                ],
                edges: vec![WorkflowEdge::always(start, end)],
            },
            1,
            Timestamp::now(),
        )
        .unwrap()
    }

    fn campaign(subscription: &str, now: Timestamp) -> Campaign {
        let wf = workflow();
        let mut campaign = Campaign::open(
            NewCampaign {
                subscription_id: SubscriptionId::new(subscription).unwrap(),
                customer_id: CustomerId::new("cus_1").unwrap(),
                payment: PaymentSnapshot {
                    payment_id: PaymentId::new("pay_1").unwrap(),
                    amount_cents: 4_900,
                    currency: "USD".into(),
                    failure_reason: "insufficient_funds".into(),
                    failure_count: 1,
                },
                workflow: &wf,
                max_attempts: 4,
            },
            now,
        )
        .unwrap();
        campaign.activate(now).unwrap();
        campaign.schedule_at(now);
        campaign
    }

    // ════════════════════════════════════════════════════════════════════════
    // Creation
    // ════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn second_open_campaign_for_subscription_is_rejected() {
        let repo = InMemoryCampaignRepository::new();
        let now = Timestamp::now();
        let first = campaign("sub_1", now);
        let second = campaign("sub_1", now);

        assert_eq!(repo.create_if_absent(&first).await.unwrap(), CreateOutcome::Created);
        assert_eq!(
            repo.create_if_absent(&second).await.unwrap(),
            CreateOutcome::Existing(first.id)
        );
        assert_eq!(repo.len().await, 1);
    }

    // ════════════════════════════════════════════════════════════════════════
    // Optimistic updates
    // ════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn stale_update_is_a_version_conflict() {
        let repo = InMemoryCampaignRepository::new();
        let now = Timestamp::now();
        let c = campaign("sub_1", now);
        repo.create_if_absent(&c).await.unwrap();

        let mut fresh = repo.find_by_id(&c.id).await.unwrap().unwrap();
        let stale = fresh.clone();
        fresh.increment_attempts();
        repo.update(&fresh).await.unwrap();

        let err = repo.update(&stale).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::VersionConflict);
    }

    #[tokio::test]
    async fn update_of_unknown_campaign_is_not_found() {
        let repo = InMemoryCampaignRepository::new();
        let err = repo.update(&campaign("sub_1", Timestamp::now())).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::CampaignNotFound);
    }

    // ════════════════════════════════════════════════════════════════════════
    // Due selection and signals
    // ════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn find_due_includes_queued_signals() {
        let repo = InMemoryCampaignRepository::new();
        let now = Timestamp::now();
        let mut later = campaign("sub_1", now);
        later.schedule_at(now.add_hours(5));
        repo.create_if_absent(&later).await.unwrap();

        assert!(repo.find_due(now, 10).await.unwrap().is_empty());

        let signal = ExternalSignal::SubscriptionCancelled { received_at: now };
        repo.enqueue_signal(&later.id, &signal).await.unwrap();
        assert_eq!(repo.find_due(now, 10).await.unwrap(), vec![later.id]);

        assert_eq!(repo.take_signals(&later.id).await.unwrap(), vec![signal]);
        assert!(repo.take_signals(&later.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_pages_and_counts() {
        let repo = InMemoryCampaignRepository::new();
        let now = Timestamp::now();
        for i in 0..5 {
            repo.create_if_absent(&campaign(&format!("sub_{}", i), now)).await.unwrap();
        }

        let page = repo
            .list(&CampaignFilter {
                limit: 2,
                offset: 1,
                ..CampaignFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
    }
}
