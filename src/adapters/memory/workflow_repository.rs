use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, WorkflowId};
use crate::domain::workflow::WorkflowDefinition;
use crate::ports::WorkflowRepository;

/// Append-only in-memory workflow store keyed by `(id, version)`.
#[derive(Debug, Default)]
pub struct InMemoryWorkflowRepository {
    workflows: RwLock<HashMap<WorkflowId, BTreeMap<u32, WorkflowDefinition>>>,
}

impl InMemoryWorkflowRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn insert_version(&self, definition: &WorkflowDefinition) -> Result<(), DomainError> {
        let mut workflows = self.workflows.write().await;
        let versions = workflows.entry(definition.id.clone()).or_default();
        if versions.contains_key(&definition.version) {
            return Err(DomainError::new(
                ErrorCode::VersionConflict,
                format!("Workflow {} v{} already exists", definition.id, definition.version),
            ));
        }
        versions.insert(definition.version, definition.clone());
        Ok(())
    }

    async fn find_latest(&self, id: &WorkflowId) -> Result<Option<WorkflowDefinition>, DomainError> {
        Ok(self
            .workflows
            .read()
            .await
            .get(id)
            .and_then(|versions| versions.values().next_back().cloned()))
    }

    async fn find_version(
        &self,
        id: &WorkflowId,
        version: u32,
    ) -> Result<Option<WorkflowDefinition>, DomainError> {
        Ok(self
            .workflows
            .read()
            .await
            .get(id)
            .and_then(|versions| versions.get(&version).cloned()))
    }

    async fn list_latest(&self) -> Result<Vec<WorkflowDefinition>, DomainError> {
        let mut latest: Vec<WorkflowDefinition> = self
            .workflows
            .read()
            .await
            .values()
            .filter_map(|versions| versions.values().next_back().cloned())
            .collect();
        latest.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(latest)
    }

    async fn list_versions(&self, id: &WorkflowId) -> Result<Vec<u32>, DomainError> {
        Ok(self
            .workflows
            .read()
            .await
            .get(id)
            .map(|versions| versions.keys().copied().collect())
            .unwrap_or_default())
    }
}
