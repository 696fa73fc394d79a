//! In-process lease table for tests and single-node runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::domain::foundation::{CampaignId, DomainError};
use crate::ports::LeaseManager;

#[derive(Debug, Clone)]
struct Lease {
    owner: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
pub struct InMemoryLeaseManager {
    leases: Mutex<HashMap<CampaignId, Lease>>,
}

impl InMemoryLeaseManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current unexpired holder, if any.
    pub async fn holder(&self, campaign_id: &CampaignId) -> Option<String> {
        let leases = self.leases.lock().await;
        leases
            .get(campaign_id)
            .filter(|l| l.expires_at > Instant::now())
            .map(|l| l.owner.clone())
    }
}

#[async_trait]
impl LeaseManager for InMemoryLeaseManager {
    async fn try_acquire(
        &self,
        campaign_id: &CampaignId,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool, DomainError> {
        let now = Instant::now();
        let mut leases = self.leases.lock().await;

        if let Some(current) = leases.get(campaign_id) {
            if current.expires_at > now {
                return Ok(false);
            }
        }

        leases.insert(
            *campaign_id,
            Lease {
                owner: owner.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn release(&self, campaign_id: &CampaignId, owner: &str) -> Result<bool, DomainError> {
        let now = Instant::now();
        let mut leases = self.leases.lock().await;

        match leases.get(campaign_id) {
            Some(current) if current.owner == owner => {
                let live = current.expires_at > now;
                leases.remove(campaign_id);
                Ok(live)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(30);

    #[tokio::test]
    async fn second_owner_is_refused_until_release() {
        let leases = InMemoryLeaseManager::new();
        let id = CampaignId::new();

        assert!(leases.try_acquire(&id, "a", TTL).await.unwrap());
        assert!(!leases.try_acquire(&id, "b", TTL).await.unwrap());

        assert!(!leases.release(&id, "b").await.unwrap());
        assert!(leases.release(&id, "a").await.unwrap());
        assert!(leases.try_acquire(&id, "b", TTL).await.unwrap());
    }

    #[tokio::test]
    async fn same_owner_cannot_reacquire_a_live_lease() {
        let leases = InMemoryLeaseManager::new();
        let id = CampaignId::new();

        assert!(leases.try_acquire(&id, "a", TTL).await.unwrap());
        assert!(!leases.try_acquire(&id, "a", TTL).await.unwrap());
        assert_eq!(leases.holder(&id).await.as_deref(), Some("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_lease_can_be_taken_over() {
        let leases = InMemoryLeaseManager::new();
        let id = CampaignId::new();

        assert!(leases.try_acquire(&id, "crashed", TTL).await.unwrap());
        tokio::time::advance(TTL + Duration::from_secs(1)).await;

        assert!(leases.try_acquire(&id, "survivor", TTL).await.unwrap());
        assert_eq!(leases.holder(&id).await.as_deref(), Some("survivor"));
        assert!(!leases.release(&id, "crashed").await.unwrap());
    }
}
