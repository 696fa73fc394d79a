//! RuleAdminHandler - operator CRUD for dunning rules.
//!
//! Rules are validated in full on every save and rejected with the
//! complete list of problems. A rule that fails validation is never stored,
//! so evaluation never sees a malformed rule.

use std::sync::Arc;

use crate::domain::campaign::DunningError;
use crate::domain::foundation::{RuleId, Timestamp};
use crate::domain::rules::{Rule, RuleAction, RuleDraft, RuleValidationError};
use crate::ports::{RuleRepository, WorkflowRepository};

pub struct RuleAdminHandler {
    rules: Arc<dyn RuleRepository>,
    workflows: Arc<dyn WorkflowRepository>,
}

impl RuleAdminHandler {
    pub fn new(rules: Arc<dyn RuleRepository>, workflows: Arc<dyn WorkflowRepository>) -> Self {
        Self { rules, workflows }
    }

    pub async fn create(&self, draft: RuleDraft, now: Timestamp) -> Result<Rule, DunningError> {
        self.check(&draft).await?;
        let rule = Rule::create(draft, now).map_err(DunningError::InvalidRule)?;
        let saved = self.rules.create(rule).await?;
        tracing::info!(rule_id = %saved.id, name = %saved.name, priority = saved.priority, "rule created");
        Ok(saved)
    }

    pub async fn update(&self, id: &RuleId, draft: RuleDraft, now: Timestamp) -> Result<Rule, DunningError> {
        let mut rule = self.get(id).await?;
        self.check(&draft).await?;
        rule.revise(draft, now).map_err(DunningError::InvalidRule)?;
        self.rules.update(&rule).await?;
        tracing::info!(rule_id = %rule.id, "rule updated");
        Ok(rule)
    }

    pub async fn set_enabled(&self, id: &RuleId, enabled: bool, now: Timestamp) -> Result<Rule, DunningError> {
        let mut rule = self.get(id).await?;
        rule.set_enabled(enabled, now);
        self.rules.update(&rule).await?;
        tracing::info!(rule_id = %rule.id, enabled, "rule toggled");
        Ok(rule)
    }

    pub async fn delete(&self, id: &RuleId) -> Result<(), DunningError> {
        if !self.rules.delete(id).await? {
            return Err(DunningError::RuleNotFound(*id));
        }
        tracing::info!(rule_id = %id, "rule deleted");
        Ok(())
    }

    pub async fn get(&self, id: &RuleId) -> Result<Rule, DunningError> {
        self.rules
            .find_by_id(id)
            .await?
            .ok_or(DunningError::RuleNotFound(*id))
    }

    pub async fn list(&self) -> Result<Vec<Rule>, DunningError> {
        Ok(self.rules.list().await?)
    }

    /// Draft validation plus a lookup of every `set_workflow` target.
    async fn check(&self, draft: &RuleDraft) -> Result<(), DunningError> {
        let mut errors = draft.validate().err().unwrap_or_default();
        for action in &draft.actions {
            if let RuleAction::SetWorkflow(workflow_id) = action {
                if self.workflows.find_latest(workflow_id).await?.is_none() {
                    errors.push(RuleValidationError::UnknownWorkflow {
                        workflow_id: workflow_id.to_string(),
                    });
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(DunningError::InvalidRule(errors))
        }
    }
}
