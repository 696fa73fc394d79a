//! Campaign repository port.
//!
//! Persists Campaign aggregates and the queue of external signals that
//! arrive while another worker holds a campaign's lease.
//!
//! # Design
//!
//! - **At most one open campaign per subscription**: `create_if_absent` is
//!   atomic with respect to concurrent creators
//! - **Optimistic locking**: `update` succeeds only when the stored version
//!   equals `campaign.version`; the stored version is then incremented
//! - **Signals are stored apart from the aggregate**: `update` never
//!   overwrites queued signals

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::campaign::{Campaign, CampaignStatus, ExternalSignal};
use crate::domain::foundation::{CampaignId, DomainError, SubscriptionId, Timestamp};

/// Result of an atomic create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// An open campaign for the subscription already exists.
    Existing(CampaignId),
}

/// Sort order for campaign listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignSort {
    /// Soonest next action first; campaigns without one last.
    #[default]
    DueAt,
    /// Newest first.
    CreatedAt,
    /// Most attempts first.
    Attempts,
}

/// Listing filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignFilter {
    /// Empty means every open status.
    #[serde(default)]
    pub statuses: Vec<CampaignStatus>,
    #[serde(default)]
    pub subscription_id: Option<SubscriptionId>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub sort: CampaignSort,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    50
}

impl Default for CampaignFilter {
    fn default() -> Self {
        Self {
            statuses: Vec::new(),
            subscription_id: None,
            tag: None,
            sort: CampaignSort::default(),
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl CampaignFilter {
    /// Statuses to include after applying the "open" default.
    pub fn effective_statuses(&self) -> &[CampaignStatus] {
        if self.statuses.is_empty() {
            &CampaignStatus::OPEN
        } else {
            &self.statuses
        }
    }

    pub fn matches(&self, campaign: &Campaign) -> bool {
        self.effective_statuses().contains(&campaign.status)
            && self
                .subscription_id
                .as_ref()
                .map_or(true, |s| s == &campaign.subscription_id)
            && self.tag.as_ref().map_or(true, |t| campaign.tags.contains(t))
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignPage {
    pub items: Vec<Campaign>,
    pub total: u64,
}

/// Repository port for Campaign aggregates.
#[async_trait]
pub trait CampaignRepository: Send + Sync {
    /// Inserts the campaign unless an open campaign exists for its subscription.
    async fn create_if_absent(&self, campaign: &Campaign) -> Result<CreateOutcome, DomainError>;

    /// Compare-and-set save.
    ///
    /// # Errors
    ///
    /// - `CampaignNotFound` if the campaign doesn't exist
    /// - `VersionConflict` if the stored version differs from `campaign.version`
    async fn update(&self, campaign: &Campaign) -> Result<(), DomainError>;

    async fn find_by_id(&self, id: &CampaignId) -> Result<Option<Campaign>, DomainError>;

    /// Every open campaign for a subscription, oldest first.
    ///
    /// More than one entry is an invariant violation the caller repairs.
    async fn find_open_by_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<Campaign>, DomainError>;

    /// The open campaign for a subscription, or the most recently created closed one.
    async fn find_latest_by_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Option<Campaign>, DomainError>;

    /// Campaigns that need a tick: schedulable and due, or holding queued signals.
    async fn find_due(&self, now: Timestamp, limit: u32) -> Result<Vec<CampaignId>, DomainError>;

    async fn list(&self, filter: &CampaignFilter) -> Result<CampaignPage, DomainError>;

    /// Queues a signal for the lease holder to apply.
    async fn enqueue_signal(
        &self,
        id: &CampaignId,
        signal: &ExternalSignal,
    ) -> Result<(), DomainError>;

    /// Removes and returns queued signals in arrival order.
    async fn take_signals(&self, id: &CampaignId) -> Result<Vec<ExternalSignal>, DomainError>;
}
