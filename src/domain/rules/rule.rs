//! Rule aggregate: prioritized conditions with declarative actions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::foundation::{RuleId, Timestamp, WorkflowId};

use super::condition::{Condition, ConditionError};
use super::context::EvaluationContext;

/// Declarative effect of a matched rule, interpreted by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RuleAction {
    SetWorkflow(WorkflowId),
    ExtendGracePeriod(u32),
    DelayRetry(u32),
    SkipRetry,
    EscalateImmediately,
    AddTag(String),
    NotifyAccountManager,
    SetMaxAttempts(u32),
}

impl RuleAction {
    pub fn kind(&self) -> &'static str {
        match self {
            RuleAction::SetWorkflow(_) => "set_workflow",
            RuleAction::ExtendGracePeriod(_) => "extend_grace_period",
            RuleAction::DelayRetry(_) => "delay_retry",
            RuleAction::SkipRetry => "skip_retry",
            RuleAction::EscalateImmediately => "escalate_immediately",
            RuleAction::AddTag(_) => "add_tag",
            RuleAction::NotifyAccountManager => "notify_account_manager",
            RuleAction::SetMaxAttempts(_) => "set_max_attempts",
        }
    }

    fn bounds(&self) -> Option<(u32, u32, u32)> {
        match self {
            RuleAction::ExtendGracePeriod(days) => Some((1, 90, *days)),
            RuleAction::DelayRetry(hours) => Some((1, 720, *hours)),
            RuleAction::SetMaxAttempts(n) => Some((1, 20, *n)),
            _ => None,
        }
    }
}

/// Parameters a matched rule imposes on a campaign.
///
/// Built from one rule's actions only; lower-priority rules never contribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<WorkflowId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_period_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_hours: Option<u32>,
    #[serde(default)]
    pub skip_retry: bool,
    #[serde(default)]
    pub escalate_immediately: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notify_account_manager: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

impl Overrides {
    /// Folds actions in order; later scalar actions replace earlier ones.
    pub fn from_actions(actions: &[RuleAction]) -> Self {
        let mut overrides = Overrides::default();
        for action in actions {
            match action {
                RuleAction::SetWorkflow(id) => overrides.workflow_id = Some(id.clone()),
                RuleAction::ExtendGracePeriod(days) => overrides.grace_period_days = Some(*days),
                RuleAction::DelayRetry(hours) => overrides.retry_delay_hours = Some(*hours),
                RuleAction::SkipRetry => overrides.skip_retry = true,
                RuleAction::EscalateImmediately => overrides.escalate_immediately = true,
                RuleAction::AddTag(tag) => {
                    if !overrides.tags.contains(tag) {
                        overrides.tags.push(tag.clone());
                    }
                }
                RuleAction::NotifyAccountManager => overrides.notify_account_manager = true,
                RuleAction::SetMaxAttempts(n) => overrides.max_attempts = Some(*n),
            }
        }
        overrides
    }

    pub fn is_empty(&self) -> bool {
        *self == Overrides::default()
    }
}

/// Problems found when saving a rule. All of them are reported at once.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleValidationError {
    #[error("rule name cannot be empty")]
    EmptyName,

    #[error("rule must have at least one condition")]
    NoConditions,

    #[error("rule must have at least one action")]
    NoActions,

    #[error("condition {index}: {error}")]
    InvalidCondition { index: usize, error: ConditionError },

    #[error("action '{action}' value must be between {min} and {max}, got {actual}")]
    ActionOutOfRange {
        action: String,
        min: u32,
        max: u32,
        actual: u32,
    },

    #[error("add_tag requires a non-empty tag")]
    EmptyTag,

    /// Checked against the workflow repository, not by `RuleDraft::validate`.
    #[error("set_workflow names unknown workflow '{workflow_id}'")]
    UnknownWorkflow { workflow_id: String },
}

/// Operator-authored fields of a rule, as submitted for create or update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDraft {
    pub name: String,
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub conditions: Vec<Condition>,
    pub actions: Vec<RuleAction>,
}

fn default_enabled() -> bool {
    true
}

impl RuleDraft {
    pub fn validate(&self) -> Result<(), Vec<RuleValidationError>> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push(RuleValidationError::EmptyName);
        }
        if self.conditions.is_empty() {
            errors.push(RuleValidationError::NoConditions);
        }
        if self.actions.is_empty() {
            errors.push(RuleValidationError::NoActions);
        }
        for (index, condition) in self.conditions.iter().enumerate() {
            if let Err(error) = condition.validate() {
                errors.push(RuleValidationError::InvalidCondition { index, error });
            }
        }
        for action in &self.actions {
            if let Some((min, max, actual)) = action.bounds() {
                if actual < min || actual > max {
                    errors.push(RuleValidationError::ActionOutOfRange {
                        action: action.kind().to_string(),
                        min,
                        max,
                        actual,
                    });
                }
            }
            if let RuleAction::AddTag(tag) = action {
                if tag.trim().is_empty() {
                    errors.push(RuleValidationError::EmptyTag);
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// A persisted rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub name: String,
    /// Lower is evaluated first.
    pub priority: i32,
    pub enabled: bool,
    pub conditions: Vec<Condition>,
    pub actions: Vec<RuleAction>,
    /// Creation order, assigned by the repository; breaks priority ties.
    pub sequence: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Rule {
    /// Validates a draft and builds a new rule. `sequence` is set on insert.
    pub fn create(draft: RuleDraft, now: Timestamp) -> Result<Self, Vec<RuleValidationError>> {
        draft.validate()?;
        Ok(Self {
            id: RuleId::new(),
            name: draft.name.trim().to_string(),
            priority: draft.priority,
            enabled: draft.enabled,
            conditions: draft.conditions,
            actions: draft.actions,
            sequence: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replaces the authored fields, keeping id, sequence and creation time.
    pub fn revise(&mut self, draft: RuleDraft, now: Timestamp) -> Result<(), Vec<RuleValidationError>> {
        draft.validate()?;
        self.name = draft.name.trim().to_string();
        self.priority = draft.priority;
        self.enabled = draft.enabled;
        self.conditions = draft.conditions;
        self.actions = draft.actions;
        self.updated_at = now;
        Ok(())
    }

    pub fn set_enabled(&mut self, enabled: bool, now: Timestamp) {
        self.enabled = enabled;
        self.updated_at = now;
    }

    /// True when every condition holds (AND semantics).
    pub fn matches(&self, ctx: &EvaluationContext) -> bool {
        !self.conditions.is_empty() && self.conditions.iter().all(|c| c.evaluate(ctx))
    }

    pub fn overrides(&self) -> Overrides {
        Overrides::from_actions(&self.actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rules::Operator;
    use serde_json::json;

    fn draft() -> RuleDraft {
        RuleDraft {
            name: "High-Value Customer Priority".to_string(),
            priority: 1,
            enabled: true,
            conditions: vec![
                Condition::new("customer.lifetimeValue", Operator::GreaterThan, json!(10000)),
                Condition::new("subscription.plan", Operator::Equals, json!("enterprise")),
            ],
            actions: vec![RuleAction::ExtendGracePeriod(14)],
        }
    }

    #[test]
    fn actions_serialize_as_type_and_value() {
        let json = serde_json::to_value(RuleAction::ExtendGracePeriod(14)).unwrap();
        assert_eq!(json, json!({"type": "extend_grace_period", "value": 14}));

        let skip: RuleAction = serde_json::from_value(json!({"type": "skip_retry"})).unwrap();
        assert_eq!(skip, RuleAction::SkipRetry);
    }

    #[test]
    fn overrides_fold_all_actions() {
        let overrides = Overrides::from_actions(&[
            RuleAction::SetWorkflow(WorkflowId::new("vip").unwrap()),
            RuleAction::ExtendGracePeriod(7),
            RuleAction::ExtendGracePeriod(14),
            RuleAction::AddTag("vip".to_string()),
            RuleAction::AddTag("vip".to_string()),
            RuleAction::EscalateImmediately,
        ]);

        assert_eq!(overrides.workflow_id.unwrap().as_str(), "vip");
        assert_eq!(overrides.grace_period_days, Some(14));
        assert_eq!(overrides.tags, vec!["vip".to_string()]);
        assert!(overrides.escalate_immediately);
        assert!(!overrides.skip_retry);
    }

    #[test]
    fn create_accepts_valid_draft() {
        let rule = Rule::create(draft(), Timestamp::now()).unwrap();
        assert_eq!(rule.priority, 1);
        assert_eq!(rule.overrides().grace_period_days, Some(14));
    }

    #[test]
    fn empty_conditions_and_actions_are_rejected() {
        let mut d = draft();
        d.conditions.clear();
        d.actions.clear();
        let errors = Rule::create(d, Timestamp::now()).unwrap_err();
        assert!(errors.contains(&RuleValidationError::NoConditions));
        assert!(errors.contains(&RuleValidationError::NoActions));
    }

    #[test]
    fn every_problem_is_reported() {
        let mut d = draft();
        d.name = " ".to_string();
        d.conditions.push(Condition::new("subscription.plan", Operator::LessThan, json!(2)));
        d.actions.push(RuleAction::ExtendGracePeriod(120));
        d.actions.push(RuleAction::AddTag(String::new()));

        let errors = d.validate().unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(matches!(errors[1], RuleValidationError::InvalidCondition { index: 2, .. }));
    }

    #[test]
    fn revise_keeps_identity() {
        let mut rule = Rule::create(draft(), Timestamp::now()).unwrap();
        let id = rule.id;
        let mut d = draft();
        d.priority = 5;
        rule.revise(d, Timestamp::now()).unwrap();
        assert_eq!(rule.id, id);
        assert_eq!(rule.priority, 5);
    }
}
