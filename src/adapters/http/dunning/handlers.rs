//! HTTP handlers for dunning endpoints.
//!
//! These handlers connect Axum routes to the coordinator and the operator
//! command/query handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Json, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::adapters::gateway::{SignatureError, SignatureVerifier, SIGNATURE_HEADER};
use crate::application::{
    CampaignQueryHandler, DunningCoordinator, RuleAdminHandler, WorkflowAdminHandler,
};
use crate::domain::campaign::DunningError;
use crate::domain::foundation::{CampaignId, RuleId, SubscriptionId, Timestamp, WorkflowId};
use crate::domain::rules::RuleDraft;
use crate::domain::workflow::WorkflowDraft;
use crate::ports::{CampaignRepository, RuleRepository, WorkflowRepository};

use super::dto::{
    CampaignListResponse, ErrorResponse, EventAcceptedResponse, HealthResponse,
    ListCampaignsQuery, ModifyNextActionRequest, PaymentFailedRequest, PaymentSucceededRequest,
    SetRuleEnabledRequest, SubscriptionCancelledRequest, WorkflowValidationResponse,
    WorkflowVersionsResponse,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// Cloned for each request; every field is an `Arc`.
#[derive(Clone)]
pub struct DunningAppState {
    pub coordinator: Arc<DunningCoordinator>,
    pub campaign_repository: Arc<dyn CampaignRepository>,
    pub rule_repository: Arc<dyn RuleRepository>,
    pub workflow_repository: Arc<dyn WorkflowRepository>,
    /// Inbound events are unauthenticated when `None`.
    pub signature_verifier: Option<Arc<SignatureVerifier>>,
}

impl DunningAppState {
    pub fn campaign_query_handler(&self) -> CampaignQueryHandler {
        CampaignQueryHandler::new(self.campaign_repository.clone())
    }

    pub fn rule_admin_handler(&self) -> RuleAdminHandler {
        RuleAdminHandler::new(self.rule_repository.clone(), self.workflow_repository.clone())
    }

    pub fn workflow_admin_handler(&self) -> WorkflowAdminHandler {
        WorkflowAdminHandler::new(self.workflow_repository.clone())
    }

    /// Verifies the gateway signature and decodes the JSON body.
    fn decode_event<T: DeserializeOwned>(
        &self,
        headers: &HeaderMap,
        body: &Bytes,
    ) -> Result<T, DunningApiError> {
        if let Some(verifier) = &self.signature_verifier {
            let header = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
            verifier
                .verify(body, header)
                .map_err(DunningApiError::Unauthorized)?;
        }
        serde_json::from_slice(body).map_err(|e| DunningApiError::MalformedBody(e.to_string()))
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Inbound Events
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/events/payment-failed
pub async fn payment_failed(
    State(state): State<DunningAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, DunningApiError> {
    let request: PaymentFailedRequest = state.decode_event(&headers, &body)?;
    let outcome = state
        .coordinator
        .on_payment_failed(request.into(), Timestamp::now())
        .await?;
    Ok((StatusCode::ACCEPTED, Json(EventAcceptedResponse::from(outcome))))
}

/// POST /api/events/payment-succeeded
pub async fn payment_succeeded(
    State(state): State<DunningAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, DunningApiError> {
    let request: PaymentSucceededRequest = state.decode_event(&headers, &body)?;
    let outcome = state
        .coordinator
        .on_payment_succeeded(request.into(), Timestamp::now())
        .await?;
    Ok((StatusCode::ACCEPTED, Json(EventAcceptedResponse::from(outcome))))
}

/// POST /api/events/subscription-cancelled
pub async fn subscription_cancelled(
    State(state): State<DunningAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, DunningApiError> {
    let request: SubscriptionCancelledRequest = state.decode_event(&headers, &body)?;
    let outcome = state
        .coordinator
        .on_subscription_cancelled(request.into(), Timestamp::now())
        .await?;
    Ok((StatusCode::ACCEPTED, Json(EventAcceptedResponse::from(outcome))))
}

// ════════════════════════════════════════════════════════════════════════════════
// Campaigns
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/campaigns
pub async fn list_campaigns(
    State(state): State<DunningAppState>,
    Query(query): Query<ListCampaignsQuery>,
) -> Result<impl IntoResponse, DunningApiError> {
    let filter = query
        .into_filter()
        .map_err(|e| DunningError::validation(e.field().to_string(), e.to_string()))?;
    let (limit, offset) = (filter.limit, filter.offset);
    let page = state.campaign_query_handler().list(filter).await?;
    Ok(Json(CampaignListResponse::new(page, limit, offset)))
}

/// GET /api/campaigns/:id
pub async fn get_campaign(
    State(state): State<DunningAppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, DunningApiError> {
    let campaign = state
        .campaign_query_handler()
        .get(&CampaignId::from_uuid(id))
        .await?;
    Ok(Json(campaign))
}

/// GET /api/subscriptions/:id/campaign
///
/// The open campaign if any, otherwise the most recent closed one.
pub async fn get_subscription_campaign(
    State(state): State<DunningAppState>,
    Path(subscription_id): Path<String>,
) -> Result<impl IntoResponse, DunningApiError> {
    let subscription_id = SubscriptionId::new(subscription_id)
        .map_err(|e| DunningError::validation("subscription_id", e.to_string()))?;
    match state
        .campaign_query_handler()
        .for_subscription(&subscription_id)
        .await?
    {
        Some(campaign) => Ok(Json(campaign)),
        None => Err(DunningApiError::NoCampaignForSubscription(subscription_id)),
    }
}

/// POST /api/campaigns/:id/pause
pub async fn pause_campaign(
    State(state): State<DunningAppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, DunningApiError> {
    let campaign = state
        .coordinator
        .pause(&CampaignId::from_uuid(id), Timestamp::now())
        .await?;
    Ok(Json(campaign))
}

/// POST /api/campaigns/:id/resume
pub async fn resume_campaign(
    State(state): State<DunningAppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, DunningApiError> {
    let campaign = state
        .coordinator
        .resume(&CampaignId::from_uuid(id), Timestamp::now())
        .await?;
    Ok(Json(campaign))
}

/// POST /api/campaigns/:id/cancel
pub async fn cancel_campaign(
    State(state): State<DunningAppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, DunningApiError> {
    let campaign = state
        .coordinator
        .cancel(&CampaignId::from_uuid(id), Timestamp::now())
        .await?;
    Ok(Json(campaign))
}

/// POST /api/campaigns/:id/next-action
pub async fn modify_next_action(
    State(state): State<DunningAppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ModifyNextActionRequest>,
) -> Result<impl IntoResponse, DunningApiError> {
    let campaign = state
        .coordinator
        .modify_next(&CampaignId::from_uuid(id), request.due_at, Timestamp::now())
        .await?;
    Ok(Json(campaign))
}

// ════════════════════════════════════════════════════════════════════════════════
// Rules
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/rules
pub async fn list_rules(
    State(state): State<DunningAppState>,
) -> Result<impl IntoResponse, DunningApiError> {
    Ok(Json(state.rule_admin_handler().list().await?))
}

/// POST /api/rules
pub async fn create_rule(
    State(state): State<DunningAppState>,
    Json(draft): Json<RuleDraft>,
) -> Result<impl IntoResponse, DunningApiError> {
    let rule = state.rule_admin_handler().create(draft, Timestamp::now()).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

/// GET /api/rules/:id
pub async fn get_rule(
    State(state): State<DunningAppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, DunningApiError> {
    Ok(Json(state.rule_admin_handler().get(&RuleId::from_uuid(id)).await?))
}

/// PUT /api/rules/:id
pub async fn update_rule(
    State(state): State<DunningAppState>,
    Path(id): Path<Uuid>,
    Json(draft): Json<RuleDraft>,
) -> Result<impl IntoResponse, DunningApiError> {
    let rule = state
        .rule_admin_handler()
        .update(&RuleId::from_uuid(id), draft, Timestamp::now())
        .await?;
    Ok(Json(rule))
}

/// DELETE /api/rules/:id
pub async fn delete_rule(
    State(state): State<DunningAppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, DunningApiError> {
    state
        .rule_admin_handler()
        .delete(&RuleId::from_uuid(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/rules/:id/enabled
pub async fn set_rule_enabled(
    State(state): State<DunningAppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SetRuleEnabledRequest>,
) -> Result<impl IntoResponse, DunningApiError> {
    let rule = state
        .rule_admin_handler()
        .set_enabled(&RuleId::from_uuid(id), request.enabled, Timestamp::now())
        .await?;
    Ok(Json(rule))
}

// ════════════════════════════════════════════════════════════════════════════════
// Workflows
// ════════════════════════════════════════════════════════════════════════════════

fn workflow_id(raw: String) -> Result<WorkflowId, DunningApiError> {
    WorkflowId::new(raw)
        .map_err(|e| DunningApiError::from(DunningError::validation("id", e.to_string())))
}

/// GET /api/workflows - latest version of every workflow
pub async fn list_workflows(
    State(state): State<DunningAppState>,
) -> Result<impl IntoResponse, DunningApiError> {
    Ok(Json(state.workflow_admin_handler().list().await?))
}

/// POST /api/workflows - saves a new version
pub async fn save_workflow(
    State(state): State<DunningAppState>,
    Json(draft): Json<WorkflowDraft>,
) -> Result<impl IntoResponse, DunningApiError> {
    let definition = state
        .workflow_admin_handler()
        .save(draft, Timestamp::now())
        .await?;
    Ok((StatusCode::CREATED, Json(definition)))
}

/// POST /api/workflows/validate - dry run, nothing is stored
pub async fn validate_workflow(
    State(state): State<DunningAppState>,
    Json(draft): Json<WorkflowDraft>,
) -> impl IntoResponse {
    let errors = state.workflow_admin_handler().validate(&draft);
    Json(WorkflowValidationResponse::from(errors))
}

/// GET /api/workflows/:id
pub async fn get_workflow(
    State(state): State<DunningAppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, DunningApiError> {
    let id = workflow_id(id)?;
    Ok(Json(state.workflow_admin_handler().latest(&id).await?))
}

/// PUT /api/workflows/:id - publishes the next version of an existing workflow
pub async fn update_workflow(
    State(state): State<DunningAppState>,
    Path(id): Path<String>,
    Json(draft): Json<WorkflowDraft>,
) -> Result<impl IntoResponse, DunningApiError> {
    let id = workflow_id(id)?;
    let definition = state
        .workflow_admin_handler()
        .update(&id, draft, Timestamp::now())
        .await?;
    Ok(Json(definition))
}

/// GET /api/workflows/:id/versions
pub async fn list_workflow_versions(
    State(state): State<DunningAppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, DunningApiError> {
    let id = workflow_id(id)?;
    let versions = state.workflow_admin_handler().versions(&id).await?;
    Ok(Json(WorkflowVersionsResponse {
        id: id.to_string(),
        versions,
    }))
}

/// GET /api/workflows/:id/versions/:version
pub async fn get_workflow_version(
    State(state): State<DunningAppState>,
    Path((id, version)): Path<(String, u32)>,
) -> Result<impl IntoResponse, DunningApiError> {
    let id = workflow_id(id)?;
    Ok(Json(state.workflow_admin_handler().version(&id, version).await?))
}

// ════════════════════════════════════════════════════════════════════════════════
// Health
// ════════════════════════════════════════════════════════════════════════════════

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts dunning errors to HTTP responses.
#[derive(Debug)]
pub enum DunningApiError {
    Dunning(DunningError),
    Unauthorized(SignatureError),
    MalformedBody(String),
    NoCampaignForSubscription(SubscriptionId),
}

impl From<DunningError> for DunningApiError {
    fn from(err: DunningError) -> Self {
        Self::Dunning(err)
    }
}

impl From<crate::domain::foundation::DomainError> for DunningApiError {
    fn from(err: crate::domain::foundation::DomainError) -> Self {
        Self::Dunning(DunningError::from(err))
    }
}

impl IntoResponse for DunningApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            DunningApiError::Unauthorized(e) => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new("INVALID_SIGNATURE", e.to_string()),
            ),
            DunningApiError::MalformedBody(reason) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("MALFORMED_BODY", reason),
            ),
            DunningApiError::NoCampaignForSubscription(id) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new(
                    "CAMPAIGN_NOT_FOUND",
                    format!("No campaign for subscription {}", id),
                ),
            ),
            DunningApiError::Dunning(err) => {
                let status = match &err {
                    DunningError::CampaignNotFound(_)
                    | DunningError::RuleNotFound(_)
                    | DunningError::WorkflowNotFound { .. } => StatusCode::NOT_FOUND,
                    DunningError::InvalidRule(_)
                    | DunningError::InvalidWorkflow(_)
                    | DunningError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    DunningError::InvalidState { .. } | DunningError::Conflict(_) => {
                        StatusCode::CONFLICT
                    }
                    DunningError::LeaseUnavailable(_) => StatusCode::LOCKED,
                    DunningError::TransientExternal(_) => StatusCode::SERVICE_UNAVAILABLE,
                    DunningError::InvariantViolation(_) | DunningError::Infrastructure(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                if status.is_server_error() {
                    tracing::error!(error = %err, "request failed");
                }
                let code = err.code().to_string();
                let details = match &err {
                    DunningError::InvalidRule(errors) => serde_json::to_value(errors).ok(),
                    DunningError::InvalidWorkflow(errors) => serde_json::to_value(errors).ok(),
                    DunningError::Validation { field, .. } => {
                        Some(serde_json::json!({ "field": field }))
                    }
                    _ => None,
                };
                let body = match details {
                    Some(details) => ErrorResponse::with_details(code, err.message(), details),
                    None => ErrorResponse::new(code, err.message()),
                };
                (status, body)
            }
        };
        (status, Json(body)).into_response()
    }
}
