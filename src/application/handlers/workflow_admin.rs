//! WorkflowAdminHandler - versioned workflow authoring.
//!
//! Saving never edits a stored definition: it validates the graph and
//! appends the next version. Campaigns already running keep their pinned
//! version.

use std::sync::Arc;

use crate::domain::campaign::DunningError;
use crate::domain::foundation::{ErrorCode, Timestamp, WorkflowId};
use crate::domain::workflow::{validate, WorkflowDefinition, WorkflowDraft, WorkflowValidationError};
use crate::ports::WorkflowRepository;

pub struct WorkflowAdminHandler {
    workflows: Arc<dyn WorkflowRepository>,
}

impl WorkflowAdminHandler {
    pub fn new(workflows: Arc<dyn WorkflowRepository>) -> Self {
        Self { workflows }
    }

    /// Validates the draft and stores it as the next version.
    pub async fn save(&self, draft: WorkflowDraft, now: Timestamp) -> Result<WorkflowDefinition, DunningError> {
        let version = self
            .workflows
            .find_latest(&draft.id)
            .await?
            .map_or(1, |latest| latest.version + 1);
        let definition =
            WorkflowDefinition::create(draft, version, now).map_err(DunningError::InvalidWorkflow)?;

        self.workflows
            .insert_version(&definition)
            .await
            .map_err(|e| match e.code {
                ErrorCode::VersionConflict => {
                    DunningError::validation("version", "workflow was saved concurrently, retry")
                }
                _ => e.into(),
            })?;
        tracing::info!(workflow_id = %definition.id, version = definition.version, "workflow version saved");
        Ok(definition)
    }

    /// Saves a new version of an existing workflow.
    pub async fn update(
        &self,
        id: &WorkflowId,
        draft: WorkflowDraft,
        now: Timestamp,
    ) -> Result<WorkflowDefinition, DunningError> {
        if &draft.id != id {
            return Err(DunningError::validation("id", "body id does not match path"));
        }
        self.latest(id).await?;
        self.save(draft, now).await
    }

    /// Dry-run validation.
    pub fn validate(&self, draft: &WorkflowDraft) -> Vec<WorkflowValidationError> {
        validate(draft).err().unwrap_or_default()
    }

    pub async fn latest(&self, id: &WorkflowId) -> Result<WorkflowDefinition, DunningError> {
        self.workflows
            .find_latest(id)
            .await?
            .ok_or_else(|| DunningError::workflow_not_found(id.clone(), None))
    }

    pub async fn version(&self, id: &WorkflowId, version: u32) -> Result<WorkflowDefinition, DunningError> {
        self.workflows
            .find_version(id, version)
            .await?
            .ok_or_else(|| DunningError::workflow_not_found(id.clone(), Some(version)))
    }

    pub async fn list(&self) -> Result<Vec<WorkflowDefinition>, DunningError> {
        Ok(self.workflows.list_latest().await?)
    }

    pub async fn versions(&self, id: &WorkflowId) -> Result<Vec<u32>, DunningError> {
        let versions = self.workflows.list_versions(id).await?;
        if versions.is_empty() {
            return Err(DunningError::workflow_not_found(id.clone(), None));
        }
        Ok(versions)
    }
}
