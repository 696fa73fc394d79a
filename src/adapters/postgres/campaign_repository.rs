//! PostgreSQL implementation of CampaignRepository.
//!
//! The aggregate is stored as a JSONB document; the projected columns
//! (`status`, `next_action_due_at`, `tags`, ...) exist for indexing and are
//! rewritten on every save. The `version` column is authoritative.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::campaign::{Campaign, CampaignStatus, ExternalSignal};
use crate::domain::foundation::{CampaignId, DomainError, ErrorCode, SubscriptionId, Timestamp};
use crate::ports::{CampaignFilter, CampaignPage, CampaignRepository, CampaignSort, CreateOutcome};

use super::db_error;

const OPEN_STATUSES: &str = "('pending', 'active', 'paused', 'escalated')";

pub struct PostgresCampaignRepository {
    pool: PgPool,
}

impl PostgresCampaignRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CampaignRow {
    document: Json<Campaign>,
    version: i64,
}

impl From<CampaignRow> for Campaign {
    fn from(row: CampaignRow) -> Self {
        let mut campaign = row.document.0;
        campaign.version = row.version;
        campaign
    }
}

fn status_strings(statuses: &[CampaignStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

fn due_at(campaign: &Campaign) -> Option<DateTime<Utc>> {
    campaign.next_action_due_at.map(|t| *t.as_datetime())
}

fn order_clause(sort: CampaignSort) -> &'static str {
    match sort {
        CampaignSort::DueAt => "next_action_due_at ASC NULLS LAST, created_at ASC",
        CampaignSort::CreatedAt => "created_at DESC",
        CampaignSort::Attempts => "attempt_count DESC, created_at ASC",
    }
}

#[async_trait]
impl CampaignRepository for PostgresCampaignRepository {
    async fn create_if_absent(&self, campaign: &Campaign) -> Result<CreateOutcome, DomainError> {
        let inserted = sqlx::query(&format!(
            r#"
            INSERT INTO dunning_campaigns (
                id, subscription_id, customer_id, status, next_action_due_at,
                attempt_count, tags, document, version, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (subscription_id) WHERE status IN {} DO NOTHING
            "#,
            OPEN_STATUSES
        ))
        .bind(campaign.id.as_uuid())
        .bind(campaign.subscription_id.as_str())
        .bind(campaign.customer_id.as_str())
        .bind(campaign.status.as_str())
        .bind(due_at(campaign))
        .bind(campaign.attempt_count as i32)
        .bind(&campaign.tags)
        .bind(Json(campaign))
        .bind(campaign.version)
        .bind(campaign.created_at.as_datetime())
        .bind(campaign.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("insert campaign", e))?;

        if inserted.rows_affected() == 1 {
            return Ok(CreateOutcome::Created);
        }

        let existing: Option<Uuid> = sqlx::query_scalar(&format!(
            "SELECT id FROM dunning_campaigns WHERE subscription_id = $1 AND status IN {}",
            OPEN_STATUSES
        ))
        .bind(campaign.subscription_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find conflicting campaign", e))?;

        match existing {
            Some(id) => Ok(CreateOutcome::Existing(CampaignId::from_uuid(id))),
            // The conflicting campaign closed between the two statements.
            None => Err(DomainError::new(
                ErrorCode::VersionConflict,
                "open campaign for subscription changed concurrently",
            )),
        }
    }

    async fn update(&self, campaign: &Campaign) -> Result<(), DomainError> {
        let mut document = campaign.clone();
        document.version += 1;

        let result = sqlx::query(
            r#"
            UPDATE dunning_campaigns SET
                status = $3,
                next_action_due_at = $4,
                attempt_count = $5,
                tags = $6,
                document = $7,
                updated_at = $8,
                version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(campaign.id.as_uuid())
        .bind(campaign.version)
        .bind(campaign.status.as_str())
        .bind(due_at(campaign))
        .bind(campaign.attempt_count as i32)
        .bind(&campaign.tags)
        .bind(Json(&document))
        .bind(campaign.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("update campaign", e))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM dunning_campaigns WHERE id = $1)")
                .bind(campaign.id.as_uuid())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| db_error("check campaign", e))?;

        if exists {
            Err(DomainError::new(
                ErrorCode::VersionConflict,
                format!("Campaign {} was modified concurrently", campaign.id),
            ))
        } else {
            Err(DomainError::new(
                ErrorCode::CampaignNotFound,
                format!("Campaign not found: {}", campaign.id),
            ))
        }
    }

    async fn find_by_id(&self, id: &CampaignId) -> Result<Option<Campaign>, DomainError> {
        let row: Option<CampaignRow> =
            sqlx::query_as("SELECT document, version FROM dunning_campaigns WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("find campaign", e))?;
        Ok(row.map(Campaign::from))
    }

    async fn find_open_by_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<Campaign>, DomainError> {
        let rows: Vec<CampaignRow> = sqlx::query_as(&format!(
            r#"
            SELECT document, version FROM dunning_campaigns
            WHERE subscription_id = $1 AND status IN {}
            ORDER BY created_at ASC
            "#,
            OPEN_STATUSES
        ))
        .bind(subscription_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("find open campaigns", e))?;
        Ok(rows.into_iter().map(Campaign::from).collect())
    }

    async fn find_latest_by_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Option<Campaign>, DomainError> {
        let row: Option<CampaignRow> = sqlx::query_as(&format!(
            r#"
            SELECT document, version FROM dunning_campaigns
            WHERE subscription_id = $1
            ORDER BY (status IN {}) DESC, created_at DESC
            LIMIT 1
            "#,
            OPEN_STATUSES
        ))
        .bind(subscription_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find latest campaign", e))?;
        Ok(row.map(Campaign::from))
    }

    async fn find_due(&self, now: Timestamp, limit: u32) -> Result<Vec<CampaignId>, DomainError> {
        let ids: Vec<Uuid> = sqlx::query_scalar(&format!(
            r#"
            SELECT id FROM dunning_campaigns
            WHERE (status IN ('active', 'escalated') AND next_action_due_at <= $1)
               OR (status IN {} AND jsonb_array_length(pending_signals) > 0)
            ORDER BY next_action_due_at ASC NULLS FIRST
            LIMIT $2
            "#,
            OPEN_STATUSES
        ))
        .bind(now.as_datetime())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("select due campaigns", e))?;
        Ok(ids.into_iter().map(CampaignId::from_uuid).collect())
    }

    async fn list(&self, filter: &CampaignFilter) -> Result<CampaignPage, DomainError> {
        let statuses = status_strings(filter.effective_statuses());
        let subscription = filter.subscription_id.as_ref().map(|s| s.as_str().to_string());
        let predicate = r#"
            status = ANY($1)
            AND ($2::TEXT IS NULL OR subscription_id = $2)
            AND ($3::TEXT IS NULL OR tags @> ARRAY[$3::TEXT])
        "#;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM dunning_campaigns WHERE {}",
            predicate
        ))
        .bind(&statuses)
        .bind(&subscription)
        .bind(&filter.tag)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("count campaigns", e))?;

        let rows: Vec<CampaignRow> = sqlx::query_as(&format!(
            "SELECT document, version FROM dunning_campaigns WHERE {} ORDER BY {} LIMIT $4 OFFSET $5",
            predicate,
            order_clause(filter.sort)
        ))
        .bind(&statuses)
        .bind(&subscription)
        .bind(&filter.tag)
        .bind(filter.limit as i64)
        .bind(filter.offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list campaigns", e))?;

        Ok(CampaignPage {
            items: rows.into_iter().map(Campaign::from).collect(),
            total: total.max(0) as u64,
        })
    }

    async fn enqueue_signal(
        &self,
        id: &CampaignId,
        signal: &ExternalSignal,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            "UPDATE dunning_campaigns SET pending_signals = pending_signals || $2 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(Json(vec![signal]))
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("enqueue signal", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::CampaignNotFound,
                format!("Campaign not found: {}", id),
            ));
        }
        Ok(())
    }

    async fn take_signals(&self, id: &CampaignId) -> Result<Vec<ExternalSignal>, DomainError> {
        let taken: Option<Json<Vec<ExternalSignal>>> = sqlx::query_scalar(
            r#"
            WITH taken AS (
                SELECT id, pending_signals FROM dunning_campaigns WHERE id = $1 FOR UPDATE
            )
            UPDATE dunning_campaigns c
            SET pending_signals = '[]'::jsonb
            FROM taken
            WHERE c.id = taken.id
            RETURNING taken.pending_signals
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("take signals", e))?;

        match taken {
            Some(Json(signals)) => Ok(signals),
            None => Err(DomainError::new(
                ErrorCode::CampaignNotFound,
                format!("Campaign not found: {}", id),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_clauses_are_static_and_distinct() {
        let clauses = [
            order_clause(CampaignSort::DueAt),
            order_clause(CampaignSort::CreatedAt),
            order_clause(CampaignSort::Attempts),
        ];
        assert!(clauses[0].starts_with("next_action_due_at"));
        assert_ne!(clauses[1], clauses[2]);
    }

    #[test]
    fn status_strings_match_check_constraint() {
        let all = status_strings(&CampaignStatus::OPEN);
        assert_eq!(all, vec!["pending", "active", "paused", "escalated"]);
    }
}
