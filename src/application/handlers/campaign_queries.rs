//! CampaignQueryHandler - read side for operators and the UI.

use std::sync::Arc;

use crate::domain::campaign::{Campaign, DunningError};
use crate::domain::foundation::{CampaignId, SubscriptionId};
use crate::ports::{CampaignFilter, CampaignPage, CampaignRepository};

const MAX_PAGE: u32 = 500;

pub struct CampaignQueryHandler {
    campaigns: Arc<dyn CampaignRepository>,
}

impl CampaignQueryHandler {
    pub fn new(campaigns: Arc<dyn CampaignRepository>) -> Self {
        Self { campaigns }
    }

    pub async fn get(&self, id: &CampaignId) -> Result<Campaign, DunningError> {
        self.campaigns
            .find_by_id(id)
            .await?
            .ok_or(DunningError::CampaignNotFound(*id))
    }

    /// Open campaign for the subscription, else its most recent closed one.
    pub async fn for_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Option<Campaign>, DunningError> {
        Ok(self
            .campaigns
            .find_latest_by_subscription(subscription_id)
            .await?)
    }

    pub async fn list(&self, mut filter: CampaignFilter) -> Result<CampaignPage, DunningError> {
        if filter.limit == 0 || filter.limit > MAX_PAGE {
            return Err(DunningError::validation(
                "limit",
                format!("must be between 1 and {}", MAX_PAGE),
            ));
        }
        filter.statuses.dedup();
        Ok(self.campaigns.list(&filter).await?)
    }
}
