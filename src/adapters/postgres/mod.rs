//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresCampaignRepository` - Campaign documents with optimistic versioning
//! - `PostgresRuleRepository` - Rules ordered by priority then creation sequence
//! - `PostgresWorkflowRepository` - Append-only workflow versions
//! - `PostgresProcessedEventStore` - Inbound event deduplication
//! - `PostgresCustomerStore` - Read-only customer/subscription attributes

mod campaign_repository;
mod customer_store;
mod processed_event_store;
mod rule_repository;
mod workflow_repository;

pub use campaign_repository::PostgresCampaignRepository;
pub use customer_store::PostgresCustomerStore;
pub use processed_event_store::PostgresProcessedEventStore;
pub use rule_repository::PostgresRuleRepository;
pub use workflow_repository::PostgresWorkflowRepository;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Runs the embedded migrations.
pub async fn run_migrations(pool: &sqlx::PgPool) -> Result<(), DomainError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DomainError::new(ErrorCode::DatabaseError, format!("Migration failed: {}", e)))
}

pub(crate) fn db_error(operation: &str, e: sqlx::Error) -> DomainError {
    tracing::error!(operation, error = %e, "database error");
    DomainError::new(ErrorCode::DatabaseError, format!("Failed to {}: {}", operation, e))
}
