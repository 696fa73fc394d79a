//! LeaseManager port - per-campaign mutual exclusion.
//!
//! A lease is a time-bounded exclusive claim on a campaign. Workers that
//! cannot acquire it skip the campaign instead of waiting.
//!
//! ## Expiry
//!
//! Leases expire after their TTL so a crashed worker's claim is reclaimed.
//! The TTL must exceed the longest expected tick, including gateway and
//! dispatcher timeouts.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::foundation::{CampaignId, DomainError};

#[async_trait]
pub trait LeaseManager: Send + Sync {
    /// Claims the campaign for `owner`. Returns `false` while any unexpired
    /// lease exists, including one held by the same owner; callers pass a
    /// token unique to the guarded operation.
    async fn try_acquire(
        &self,
        campaign_id: &CampaignId,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool, DomainError>;

    /// Releases the lease if `owner` still holds it.
    ///
    /// Returns `false` when the lease had expired or belongs to someone else.
    async fn release(&self, campaign_id: &CampaignId, owner: &str) -> Result<bool, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn LeaseManager) {}
}
