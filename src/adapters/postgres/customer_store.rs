//! PostgreSQL customer/subscription directory (read-only).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value as JsonValue};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::domain::foundation::{CustomerId, DomainError, ErrorCode, SubscriptionId, Timestamp};
use crate::ports::{CustomerProfile, CustomerStore, SubscriptionProfile};

use super::db_error;

pub struct PostgresCustomerStore {
    pool: PgPool,
}

impl PostgresCustomerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: String,
    name: String,
    email: String,
    segment: Option<String>,
    lifetime_value_cents: i64,
    account_manager: Option<String>,
    attributes: Json<Map<String, JsonValue>>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: String,
    customer_id: String,
    plan: String,
    value_cents: i64,
    billing_interval: String,
    attributes: Json<Map<String, JsonValue>>,
}

fn invalid_id(e: impl std::fmt::Display) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("Invalid stored id: {}", e))
}

impl TryFrom<CustomerRow> for CustomerProfile {
    type Error = DomainError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        Ok(CustomerProfile {
            id: CustomerId::new(row.id).map_err(invalid_id)?,
            name: row.name,
            email: row.email,
            segment: row.segment,
            lifetime_value_cents: row.lifetime_value_cents,
            created_at: Timestamp::from_datetime(row.created_at),
            account_manager: row.account_manager,
            attributes: row.attributes.0,
        })
    }
}

impl TryFrom<SubscriptionRow> for SubscriptionProfile {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(SubscriptionProfile {
            id: SubscriptionId::new(row.id).map_err(invalid_id)?,
            customer_id: CustomerId::new(row.customer_id).map_err(invalid_id)?,
            plan: row.plan,
            value_cents: row.value_cents,
            billing_interval: row.billing_interval,
            attributes: row.attributes.0,
        })
    }
}

#[async_trait]
impl CustomerStore for PostgresCustomerStore {
    async fn customer(&self, id: &CustomerId) -> Result<Option<CustomerProfile>, DomainError> {
        let row: Option<CustomerRow> = sqlx::query_as(
            r#"
            SELECT id, name, email, segment, lifetime_value_cents, account_manager, attributes, created_at
            FROM dunning_customers WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find customer", e))?;
        row.map(CustomerProfile::try_from).transpose()
    }

    async fn subscription(
        &self,
        id: &SubscriptionId,
    ) -> Result<Option<SubscriptionProfile>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(
            r#"
            SELECT id, customer_id, plan, value_cents, billing_interval, attributes
            FROM dunning_subscriptions WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find subscription", e))?;
        row.map(SubscriptionProfile::try_from).transpose()
    }
}
