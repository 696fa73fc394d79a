//! PostgreSQL implementation of RuleRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, RuleId, Timestamp};
use crate::domain::rules::{Condition, Rule, RuleAction};
use crate::ports::RuleRepository;

use super::db_error;

pub struct PostgresRuleRepository {
    pool: PgPool,
}

impl PostgresRuleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RuleRow {
    id: Uuid,
    name: String,
    priority: i32,
    enabled: bool,
    conditions: Json<Vec<Condition>>,
    actions: Json<Vec<RuleAction>>,
    sequence: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RuleRow> for Rule {
    fn from(row: RuleRow) -> Self {
        Rule {
            id: RuleId::from_uuid(row.id),
            name: row.name,
            priority: row.priority,
            enabled: row.enabled,
            conditions: row.conditions.0,
            actions: row.actions.0,
            sequence: row.sequence,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        }
    }
}

const COLUMNS: &str =
    "id, name, priority, enabled, conditions, actions, sequence, created_at, updated_at";

#[async_trait]
impl RuleRepository for PostgresRuleRepository {
    async fn create(&self, mut rule: Rule) -> Result<Rule, DomainError> {
        let sequence: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO dunning_rules (id, name, priority, enabled, conditions, actions, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING sequence
            "#,
        )
        .bind(rule.id.as_uuid())
        .bind(&rule.name)
        .bind(rule.priority)
        .bind(rule.enabled)
        .bind(Json(&rule.conditions))
        .bind(Json(&rule.actions))
        .bind(rule.created_at.as_datetime())
        .bind(rule.updated_at.as_datetime())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("insert rule", e))?;

        rule.sequence = sequence;
        Ok(rule)
    }

    async fn update(&self, rule: &Rule) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE dunning_rules SET
                name = $2, priority = $3, enabled = $4, conditions = $5, actions = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(rule.id.as_uuid())
        .bind(&rule.name)
        .bind(rule.priority)
        .bind(rule.enabled)
        .bind(Json(&rule.conditions))
        .bind(Json(&rule.actions))
        .bind(rule.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("update rule", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::RuleNotFound,
                format!("Rule not found: {}", rule.id),
            ));
        }
        Ok(())
    }

    async fn delete(&self, id: &RuleId) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM dunning_rules WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete rule", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_by_id(&self, id: &RuleId) -> Result<Option<Rule>, DomainError> {
        let row: Option<RuleRow> =
            sqlx::query_as(&format!("SELECT {} FROM dunning_rules WHERE id = $1", COLUMNS))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("find rule", e))?;
        Ok(row.map(Rule::from))
    }

    async fn list(&self) -> Result<Vec<Rule>, DomainError> {
        let rows: Vec<RuleRow> = sqlx::query_as(&format!(
            "SELECT {} FROM dunning_rules ORDER BY priority ASC, sequence ASC",
            COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list rules", e))?;
        Ok(rows.into_iter().map(Rule::from).collect())
    }
}
