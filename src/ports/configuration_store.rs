//! Configuration store port - hot-reloadable dunning tunables.
//!
//! Settings are read at every evaluation, so a change takes effect on the
//! next tick without restarting the engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::foundation::{DomainError, ValidationError, WorkflowId};
use crate::domain::workflow::Channel;

/// Engine tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DunningSettings {
    /// Delay before retry N is `retry_intervals_hours[N-1]`; the last value repeats.
    pub retry_intervals_hours: Vec<u32>,
    pub default_grace_period_days: u32,
    /// Per-plan grace period, keyed by `subscription.plan`.
    pub plan_grace_period_days: HashMap<String, u32>,
    pub default_max_attempts: u32,
    /// Exposed to rules and branches as `campaign.escalationThreshold`.
    pub escalation_threshold_attempts: u32,
    /// Payments at or above this amount have `payment.isHighValue = true`.
    pub high_value_threshold_cents: i64,
    /// Used when no rule selects a workflow.
    pub default_workflow_id: WorkflowId,
    pub account_manager_template_id: String,
    pub account_manager_channel: Channel,
    pub backoff_base_secs: u64,
    pub backoff_max_secs: u64,
    /// Node visits per tick before the campaign yields back to the scheduler.
    pub max_steps_per_tick: u32,
}

impl Default for DunningSettings {
    fn default() -> Self {
        Self {
            retry_intervals_hours: vec![24, 72, 168],
            default_grace_period_days: 7,
            plan_grace_period_days: HashMap::new(),
            default_max_attempts: 4,
            escalation_threshold_attempts: 3,
            high_value_threshold_cents: 100_000,
            default_workflow_id: WorkflowId::from_static("standard"),
            account_manager_template_id: "account_manager_alert".to_string(),
            account_manager_channel: Channel::Email,
            backoff_base_secs: 30,
            backoff_max_secs: 3600,
            max_steps_per_tick: 32,
        }
    }
}

impl DunningSettings {
    /// Grace period for a plan, falling back to the global default.
    pub fn grace_period_days(&self, plan: Option<&str>) -> u32 {
        plan.and_then(|p| self.plan_grace_period_days.get(p).copied())
            .unwrap_or(self.default_grace_period_days)
    }

    /// Retry delay before the given attempt (1-based).
    pub fn retry_interval_hours(&self, attempt: u32) -> u32 {
        let index = (attempt.max(1) - 1) as usize;
        self.retry_intervals_hours
            .get(index)
            .or_else(|| self.retry_intervals_hours.last())
            .copied()
            .unwrap_or(24)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.retry_intervals_hours.is_empty() {
            return Err(ValidationError::empty_field("retry_intervals_hours"));
        }
        if self.retry_intervals_hours.iter().any(|h| *h == 0) {
            return Err(ValidationError::invalid_format(
                "retry_intervals_hours",
                "intervals must be positive",
            ));
        }
        if !(1..=20).contains(&self.default_max_attempts) {
            return Err(ValidationError::out_of_range(
                "default_max_attempts",
                1,
                20,
                self.default_max_attempts as i64,
            ));
        }
        if self.backoff_base_secs == 0 || self.backoff_base_secs > self.backoff_max_secs {
            return Err(ValidationError::invalid_format(
                "backoff_base_secs",
                "must be positive and not exceed backoff_max_secs",
            ));
        }
        if self.max_steps_per_tick == 0 {
            return Err(ValidationError::out_of_range("max_steps_per_tick", 1, 1000, 0));
        }
        Ok(())
    }
}

#[async_trait]
pub trait ConfigurationStore: Send + Sync {
    /// Current settings snapshot.
    async fn settings(&self) -> Result<Arc<DunningSettings>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn ConfigurationStore) {}

    #[test]
    fn defaults_are_valid() {
        assert!(DunningSettings::default().validate().is_ok());
    }

    #[test]
    fn last_retry_interval_repeats() {
        let settings = DunningSettings::default();
        assert_eq!(settings.retry_interval_hours(1), 24);
        assert_eq!(settings.retry_interval_hours(3), 168);
        assert_eq!(settings.retry_interval_hours(9), 168);
    }

    #[test]
    fn plan_grace_overrides_global() {
        let mut settings = DunningSettings::default();
        settings.plan_grace_period_days.insert("enterprise".into(), 10);
        assert_eq!(settings.grace_period_days(Some("enterprise")), 10);
        assert_eq!(settings.grace_period_days(Some("starter")), 7);
        assert_eq!(settings.grace_period_days(None), 7);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let settings: DunningSettings =
            serde_yaml::from_str("default_grace_period_days: 5\nretry_intervals_hours: [12]\n")
                .unwrap();
        assert_eq!(settings.default_grace_period_days, 5);
        assert_eq!(settings.retry_interval_hours(4), 12);
        assert_eq!(settings.default_max_attempts, 4);
    }

    #[test]
    fn rejects_empty_intervals() {
        let settings = DunningSettings {
            retry_intervals_hours: vec![],
            ..DunningSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}
