//! PostgreSQL implementation of WorkflowRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, WorkflowId};
use crate::domain::workflow::{WorkflowDefinition, WorkflowEdge, WorkflowNode};
use crate::ports::WorkflowRepository;

use super::db_error;

pub struct PostgresWorkflowRepository {
    pool: PgPool,
}

impl PostgresWorkflowRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WorkflowRow {
    id: String,
    version: i32,
    name: String,
    description: Option<String>,
    nodes: Json<Vec<WorkflowNode>>,
    edges: Json<Vec<WorkflowEdge>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<WorkflowRow> for WorkflowDefinition {
    type Error = DomainError;

    fn try_from(row: WorkflowRow) -> Result<Self, Self::Error> {
        Ok(WorkflowDefinition {
            id: WorkflowId::new(row.id).map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Invalid workflow id: {}", e))
            })?,
            version: row.version as u32,
            name: row.name,
            description: row.description,
            nodes: row.nodes.0,
            edges: row.edges.0,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

const COLUMNS: &str = "id, version, name, description, nodes, edges, created_at";

#[async_trait]
impl WorkflowRepository for PostgresWorkflowRepository {
    async fn insert_version(&self, definition: &WorkflowDefinition) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO dunning_workflows (id, version, name, description, nodes, edges, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(definition.id.as_str())
        .bind(definition.version as i32)
        .bind(&definition.name)
        .bind(&definition.description)
        .bind(Json(&definition.nodes))
        .bind(Json(&definition.edges))
        .bind(definition.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("dunning_workflows_pkey") {
                    return DomainError::new(
                        ErrorCode::VersionConflict,
                        format!("Workflow {} v{} already exists", definition.id, definition.version),
                    );
                }
            }
            db_error("insert workflow", e)
        })?;
        Ok(())
    }

    async fn find_latest(&self, id: &WorkflowId) -> Result<Option<WorkflowDefinition>, DomainError> {
        let row: Option<WorkflowRow> = sqlx::query_as(&format!(
            "SELECT {} FROM dunning_workflows WHERE id = $1 ORDER BY version DESC LIMIT 1",
            COLUMNS
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find workflow", e))?;
        row.map(WorkflowDefinition::try_from).transpose()
    }

    async fn find_version(
        &self,
        id: &WorkflowId,
        version: u32,
    ) -> Result<Option<WorkflowDefinition>, DomainError> {
        let row: Option<WorkflowRow> = sqlx::query_as(&format!(
            "SELECT {} FROM dunning_workflows WHERE id = $1 AND version = $2",
            COLUMNS
        ))
        .bind(id.as_str())
        .bind(version as i32)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find workflow version", e))?;
        row.map(WorkflowDefinition::try_from).transpose()
    }

    async fn list_latest(&self) -> Result<Vec<WorkflowDefinition>, DomainError> {
        let rows: Vec<WorkflowRow> = sqlx::query_as(&format!(
            "SELECT DISTINCT ON (id) {} FROM dunning_workflows ORDER BY id, version DESC",
            COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list workflows", e))?;
        rows.into_iter().map(WorkflowDefinition::try_from).collect()
    }

    async fn list_versions(&self, id: &WorkflowId) -> Result<Vec<u32>, DomainError> {
        let versions: Vec<i32> =
            sqlx::query_scalar("SELECT version FROM dunning_workflows WHERE id = $1 ORDER BY version")
                .bind(id.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(|e| db_error("list workflow versions", e))?;
        Ok(versions.into_iter().map(|v| v as u32).collect())
    }
}
