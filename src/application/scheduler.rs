//! Scheduler - background service that ticks due campaigns.
//!
//! Each poll selects campaigns that are due (or hold queued signals) and
//! ticks every one as its own task, bounded by a semaphore. Any number of
//! schedulers may run against the same store; the campaign lease keeps
//! their ticks from overlapping.
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `poll_interval` | 1s | How often to look for due campaigns |
//! | `batch_size` | 100 | Max campaigns selected per poll |
//! | `max_concurrent_ticks` | 16 | Ticks in flight per scheduler |
//!
//! ## Graceful Shutdown
//!
//! On shutdown the scheduler stops selecting and waits for in-flight ticks.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio::time;
use uuid::Uuid;

use crate::domain::campaign::DunningError;
use crate::domain::foundation::{CampaignId, DomainError, Timestamp};
use crate::ports::CampaignRepository;

use super::coordinator::{DunningCoordinator, SkipReason, TickOutcome};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
    pub batch_size: u32,
    pub max_concurrent_ticks: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            batch_size: 100,
            max_concurrent_ticks: 16,
        }
    }
}

/// Tally of one poll, for tests and logging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    pub selected: usize,
    pub dispatched: usize,
    pub advanced: usize,
    pub skipped: usize,
    pub failed: usize,
}

type TickHandle = JoinHandle<(CampaignId, Result<TickOutcome, DunningError>)>;

pub struct Scheduler {
    coordinator: Arc<DunningCoordinator>,
    campaigns: Arc<dyn CampaignRepository>,
    config: SchedulerConfig,
    worker_id: String,
    permits: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashSet<CampaignId>>>,
}

impl Scheduler {
    pub fn new(
        coordinator: Arc<DunningCoordinator>,
        campaigns: Arc<dyn CampaignRepository>,
        config: SchedulerConfig,
    ) -> Self {
        let max = config.max_concurrent_ticks.max(1);
        Self {
            coordinator,
            campaigns,
            config,
            worker_id: format!("scheduler-{}", Uuid::new_v4()),
            permits: Arc::new(Semaphore::new(max)),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Overrides the generated lease owner name.
    pub fn with_worker_id(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = worker_id.into();
        self
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Run the polling loop until shutdown signal is received.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), DomainError> {
        let mut interval = time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
        tracing::info!(worker_id = %self.worker_id, "scheduler started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!(worker_id = %self.worker_id, "scheduler draining");
                        self.wait_idle().await;
                        return Ok(());
                    }
                }

                _ = interval.tick() => {
                    match self.dispatch(Timestamp::now()).await {
                        Ok((selected, handles)) if selected > 0 => {
                            tracing::debug!(worker_id = %self.worker_id, selected, dispatched = handles.len(), "poll");
                        }
                        Ok(_) => {}
                        Err(e) => tracing::warn!(worker_id = %self.worker_id, error = %e, "due selection failed"),
                    }
                }
            }
        }
    }

    /// Runs one poll at `now` and waits for its ticks (for testing).
    pub async fn poll_once(&self, now: Timestamp) -> Result<PollReport, DomainError> {
        let (selected, handles) = self.dispatch(now).await?;
        let mut report = PollReport {
            selected,
            dispatched: handles.len(),
            ..PollReport::default()
        };
        for handle in handles {
            match handle.await {
                Ok((_, Ok(TickOutcome::Skipped(_)))) => report.skipped += 1,
                Ok((_, Ok(_))) => report.advanced += 1,
                Ok((_, Err(_))) => report.failed += 1,
                Err(e) => {
                    tracing::error!(error = %e, "tick task panicked");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    async fn dispatch(&self, now: Timestamp) -> Result<(usize, Vec<TickHandle>), DomainError> {
        let due = self.campaigns.find_due(now, self.config.batch_size).await?;
        let selected = due.len();
        let mut handles = Vec::with_capacity(selected);

        for id in due {
            if self.in_flight.lock().await.contains(&id) {
                continue;
            }
            let permit = match self.permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            self.in_flight.lock().await.insert(id);

            let coordinator = self.coordinator.clone();
            let in_flight = self.in_flight.clone();
            let owner = self.worker_id.clone();
            handles.push(tokio::spawn(async move {
                let result = coordinator.tick(&id, &owner, now).await;
                log_tick(&id, &owner, &result);
                in_flight.lock().await.remove(&id);
                drop(permit);
                (id, result)
            }));
        }
        Ok((selected, handles))
    }

    /// Resolves once no tick is in flight.
    async fn wait_idle(&self) {
        let max = self.config.max_concurrent_ticks.max(1) as u32;
        if let Ok(all) = self.permits.acquire_many(max).await {
            drop(all);
        }
    }
}

fn log_tick(id: &CampaignId, owner: &str, result: &Result<TickOutcome, DunningError>) {
    match result {
        Ok(TickOutcome::Advanced(report)) => {
            tracing::debug!(campaign_id = %id, owner, steps = report.steps_recorded, stop = ?report.stop, "tick")
        }
        Ok(TickOutcome::Skipped(SkipReason::LeaseHeld)) => {
            tracing::debug!(campaign_id = %id, owner, "tick skipped, lease held")
        }
        Ok(TickOutcome::Faulted(message)) => {
            tracing::error!(campaign_id = %id, owner, error = %message, "tick faulted")
        }
        Ok(_) => {}
        Err(e) if e.is_retryable() => tracing::warn!(campaign_id = %id, owner, error = %e, "tick failed"),
        Err(e) => tracing::error!(campaign_id = %id, owner, error = %e, "tick failed"),
    }
}
