//! Scheduler configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::application::SchedulerConfig;

/// Polling and lease settings shared by every scheduler worker.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Campaigns selected per poll
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Ticks in flight per worker
    #[serde(default = "default_max_concurrent_ticks")]
    pub max_concurrent_ticks: usize,

    /// Lease expiry; must exceed the slowest tick
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,

    /// Scheduler workers started in this process; 0 runs the API only
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl SchedulerSettings {
    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_secs)
    }

    /// Upper bound on ticks in flight across all workers of this process.
    pub fn concurrent_ticks(&self) -> usize {
        self.workers * self.max_concurrent_ticks
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            batch_size: self.batch_size,
            max_concurrent_ticks: self.max_concurrent_ticks,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.poll_interval_ms == 0 {
            return Err(ValidationError::InvalidScheduler("poll_interval_ms"));
        }
        if self.batch_size == 0 || self.batch_size > 10_000 {
            return Err(ValidationError::InvalidScheduler("batch_size"));
        }
        if self.max_concurrent_ticks == 0 {
            return Err(ValidationError::InvalidScheduler("max_concurrent_ticks"));
        }
        if self.lease_ttl_secs < 5 {
            return Err(ValidationError::InvalidScheduler("lease_ttl_secs"));
        }
        Ok(())
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            batch_size: default_batch_size(),
            max_concurrent_ticks: default_max_concurrent_ticks(),
            lease_ttl_secs: default_lease_ttl_secs(),
            workers: default_workers(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_batch_size() -> u32 {
    100
}

fn default_max_concurrent_ticks() -> usize {
    16
}

fn default_lease_ttl_secs() -> u64 {
    60
}

fn default_workers() -> usize {
    1
}
