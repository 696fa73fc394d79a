//! Request and response bodies for the dunning API.
//!
//! Domain types that already serialize (campaigns, rules, workflows) are
//! returned as-is; these DTOs cover inbound events, operator commands and
//! outcome summaries.

use serde::{Deserialize, Serialize};

use crate::application::{
    FailureOutcome, PaymentFailedCommand, PaymentSucceededCommand, ResolutionOutcome,
    SubscriptionCancelledCommand,
};
use crate::domain::campaign::{Campaign, CampaignStatus};
use crate::domain::foundation::{CampaignId, CustomerId, PaymentId, SubscriptionId, Timestamp};
use crate::domain::workflow::WorkflowValidationError;
use crate::ports::{CampaignFilter, CampaignPage, CampaignSort};

// ════════════════════════════════════════════════════════════════════════════════
// Inbound Events
// ════════════════════════════════════════════════════════════════════════════════

/// Body of `POST /api/events/payment-failed`.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentFailedRequest {
    pub subscription_id: SubscriptionId,
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    pub payment_id: PaymentId,
    pub amount_cents: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub failure_reason: String,
    #[serde(default = "default_failure_count")]
    pub failure_count: u32,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_failure_count() -> u32 {
    1
}

impl From<PaymentFailedRequest> for PaymentFailedCommand {
    fn from(req: PaymentFailedRequest) -> Self {
        Self {
            subscription_id: req.subscription_id,
            customer_id: req.customer_id,
            payment_id: req.payment_id,
            amount_cents: req.amount_cents,
            currency: req.currency,
            failure_reason: req.failure_reason,
            failure_count: req.failure_count,
        }
    }
}

/// Body of `POST /api/events/payment-succeeded`.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentSucceededRequest {
    pub subscription_id: SubscriptionId,
    pub payment_id: PaymentId,
}

impl From<PaymentSucceededRequest> for PaymentSucceededCommand {
    fn from(req: PaymentSucceededRequest) -> Self {
        Self {
            subscription_id: req.subscription_id,
            payment_id: req.payment_id,
        }
    }
}

/// Body of `POST /api/events/subscription-cancelled`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionCancelledRequest {
    pub subscription_id: SubscriptionId,
}

impl From<SubscriptionCancelledRequest> for SubscriptionCancelledCommand {
    fn from(req: SubscriptionCancelledRequest) -> Self {
        Self {
            subscription_id: req.subscription_id,
        }
    }
}

/// What an inbound event did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventAcceptedResponse {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<CampaignId>,
}

impl From<FailureOutcome> for EventAcceptedResponse {
    fn from(outcome: FailureOutcome) -> Self {
        let (outcome, campaign_id) = match outcome {
            FailureOutcome::Opened(id) => ("opened", Some(id)),
            FailureOutcome::Folded(id) => ("folded", Some(id)),
            FailureOutcome::Queued(id) => ("queued", Some(id)),
            FailureOutcome::Duplicate => ("duplicate", None),
        };
        Self { outcome, campaign_id }
    }
}

impl From<ResolutionOutcome> for EventAcceptedResponse {
    fn from(outcome: ResolutionOutcome) -> Self {
        let (outcome, campaign_id) = match outcome {
            ResolutionOutcome::Resolved(id) => ("resolved", Some(id)),
            ResolutionOutcome::Queued(id) => ("queued", Some(id)),
            ResolutionOutcome::NoOpenCampaign => ("no_open_campaign", None),
        };
        Self { outcome, campaign_id }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Campaigns
// ════════════════════════════════════════════════════════════════════════════════

/// Query string of `GET /api/campaigns`.
///
/// `status` is a comma-separated list, e.g. `status=active,escalated`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListCampaignsQuery {
    pub status: Option<String>,
    pub subscription_id: Option<SubscriptionId>,
    pub tag: Option<String>,
    pub sort: Option<CampaignSort>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ListCampaignsQuery {
    /// Builds the repository filter, rejecting unknown statuses.
    pub fn into_filter(self) -> Result<CampaignFilter, crate::domain::foundation::ValidationError> {
        let mut filter = CampaignFilter::default();
        if let Some(raw) = self.status {
            filter.statuses = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::parse::<CampaignStatus>)
                .collect::<Result<_, _>>()?;
        }
        filter.subscription_id = self.subscription_id;
        filter.tag = self.tag.filter(|t| !t.is_empty());
        if let Some(sort) = self.sort {
            filter.sort = sort;
        }
        if let Some(limit) = self.limit {
            filter.limit = limit;
        }
        filter.offset = self.offset.unwrap_or(0);
        Ok(filter)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignListResponse {
    pub items: Vec<Campaign>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

impl CampaignListResponse {
    pub fn new(page: CampaignPage, limit: u32, offset: u32) -> Self {
        Self {
            items: page.items,
            total: page.total,
            limit,
            offset,
        }
    }
}

/// Body of `POST /api/campaigns/:id/next-action`.
#[derive(Debug, Clone, Deserialize)]
pub struct ModifyNextActionRequest {
    pub due_at: Timestamp,
}

// ════════════════════════════════════════════════════════════════════════════════
// Rules and Workflows
// ════════════════════════════════════════════════════════════════════════════════

/// Body of `POST /api/rules/:id/enabled`.
#[derive(Debug, Clone, Deserialize)]
pub struct SetRuleEnabledRequest {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowValidationResponse {
    pub valid: bool,
    pub errors: Vec<WorkflowValidationError>,
}

impl From<Vec<WorkflowValidationError>> for WorkflowValidationResponse {
    fn from(errors: Vec<WorkflowValidationError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowVersionsResponse {
    pub id: String,
    pub versions: Vec<u32>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Errors and Health
// ════════════════════════════════════════════════════════════════════════════════

/// Standard error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        error_code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            details: Some(details),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}
