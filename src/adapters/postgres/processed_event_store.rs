//! PostgreSQL implementation of ProcessedEventStore.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, EventId, Timestamp};
use crate::ports::ProcessedEventStore;

use super::db_error;

pub struct PostgresProcessedEventStore {
    pool: PgPool,
}

impl PostgresProcessedEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProcessedEventStore for PostgresProcessedEventStore {
    async fn contains(&self, event_id: &EventId, handler_name: &str) -> Result<bool, DomainError> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM dunning_processed_events WHERE event_id = $1 AND handler_name = $2)",
        )
        .bind(event_id.as_str())
        .bind(handler_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("check processed event", e))
    }

    async fn mark_processed(&self, event_id: &EventId, handler_name: &str) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO dunning_processed_events (event_id, handler_name)
            VALUES ($1, $2)
            ON CONFLICT (event_id, handler_name) DO NOTHING
            "#,
        )
        .bind(event_id.as_str())
        .bind(handler_name)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("mark processed event", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn unmark(&self, event_id: &EventId, handler_name: &str) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM dunning_processed_events WHERE event_id = $1 AND handler_name = $2")
            .bind(event_id.as_str())
            .bind(handler_name)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("unmark processed event", e))?;
        Ok(())
    }

    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM dunning_processed_events WHERE processed_at < $1")
            .bind(timestamp.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("prune processed events", e))?;
        Ok(result.rows_affected())
    }
}
