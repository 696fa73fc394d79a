//! Redis-backed campaign leases for multi-worker deployments.
//!
//! Acquire is `SET key owner NX PX ttl` and never succeeds while the key is
//! live. Release is a Lua script that checks the owner first, so a worker
//! whose lease expired cannot drop a successor's.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Script;
use std::time::Duration;

use crate::domain::foundation::{CampaignId, DomainError, ErrorCode};
use crate::ports::LeaseManager;

const RELEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

#[derive(Clone)]
pub struct RedisLeaseManager {
    conn: MultiplexedConnection,
    key_prefix: String,
}

impl RedisLeaseManager {
    pub fn new(conn: MultiplexedConnection, key_prefix: impl Into<String>) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.into(),
        }
    }

    fn key(&self, campaign_id: &CampaignId) -> String {
        format!("{}{}", self.key_prefix, campaign_id)
    }
}

fn cache_error(e: redis::RedisError) -> DomainError {
    tracing::warn!(error = %e, "redis lease operation failed");
    DomainError::new(ErrorCode::CacheError, format!("Lease store unavailable: {}", e))
}

fn ttl_millis(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}

#[async_trait]
impl LeaseManager for RedisLeaseManager {
    async fn try_acquire(
        &self,
        campaign_id: &CampaignId,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool, DomainError> {
        let key = self.key(campaign_id);
        let ttl_ms = ttl_millis(ttl);
        let mut conn = self.conn.clone();

        let acquired: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(owner)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;
        Ok(acquired.is_some())
    }

    async fn release(&self, campaign_id: &CampaignId, owner: &str) -> Result<bool, DomainError> {
        let mut conn = self.conn.clone();
        let deleted: i64 = Script::new(RELEASE_SCRIPT)
            .key(self.key(campaign_id))
            .arg(owner)
            .invoke_async(&mut conn)
            .await
            .map_err(cache_error)?;
        Ok(deleted == 1)
    }
}

impl std::fmt::Debug for RedisLeaseManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisLeaseManager")
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}
