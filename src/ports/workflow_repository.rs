//! Workflow repository port.
//!
//! Definitions are append-only per version: saving a workflow always adds
//! a new version, and an existing `(id, version)` is never modified. Open
//! campaigns keep executing the version they were pinned to.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, WorkflowId};
use crate::domain::workflow::WorkflowDefinition;

#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    /// Inserts a new version.
    ///
    /// # Errors
    ///
    /// - `VersionConflict` if `(id, version)` already exists
    async fn insert_version(&self, definition: &WorkflowDefinition) -> Result<(), DomainError>;

    async fn find_latest(&self, id: &WorkflowId) -> Result<Option<WorkflowDefinition>, DomainError>;

    async fn find_version(
        &self,
        id: &WorkflowId,
        version: u32,
    ) -> Result<Option<WorkflowDefinition>, DomainError>;

    /// Latest version of every workflow, ordered by id.
    async fn list_latest(&self) -> Result<Vec<WorkflowDefinition>, DomainError>;

    /// All stored version numbers of one workflow, ascending.
    async fn list_versions(&self, id: &WorkflowId) -> Result<Vec<u32>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn WorkflowRepository) {}
}
