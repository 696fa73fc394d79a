//! Axum router configuration for dunning endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    cancel_campaign, create_rule, delete_rule, get_campaign, get_rule, get_subscription_campaign,
    get_workflow, get_workflow_version, health, list_campaigns, list_rules,
    list_workflow_versions, list_workflows, modify_next_action, pause_campaign, payment_failed,
    payment_succeeded, resume_campaign, save_workflow, set_rule_enabled, subscription_cancelled,
    update_rule, update_workflow, validate_workflow, DunningAppState,
};

/// Gateway event intake.
///
/// # Routes
/// - `POST /payment-failed`
/// - `POST /payment-succeeded`
/// - `POST /subscription-cancelled`
pub fn event_routes() -> Router<DunningAppState> {
    Router::new()
        .route("/payment-failed", post(payment_failed))
        .route("/payment-succeeded", post(payment_succeeded))
        .route("/subscription-cancelled", post(subscription_cancelled))
}

/// Campaign queries and operator actions.
///
/// # Routes
/// - `GET /` - List campaigns (status, subscription_id, tag, sort, limit, offset)
/// - `GET /:id` - Campaign with full history
/// - `POST /:id/pause` | `/:id/resume` | `/:id/cancel`
/// - `POST /:id/next-action` - Override the next action time
pub fn campaign_routes() -> Router<DunningAppState> {
    Router::new()
        .route("/", get(list_campaigns))
        .route("/:id", get(get_campaign))
        .route("/:id/pause", post(pause_campaign))
        .route("/:id/resume", post(resume_campaign))
        .route("/:id/cancel", post(cancel_campaign))
        .route("/:id/next-action", post(modify_next_action))
}

/// Rule administration.
pub fn rule_routes() -> Router<DunningAppState> {
    Router::new()
        .route("/", get(list_rules).post(create_rule))
        .route("/:id", get(get_rule).put(update_rule).delete(delete_rule))
        .route("/:id/enabled", post(set_rule_enabled))
}

/// Workflow administration. Every save publishes a new immutable version.
pub fn workflow_routes() -> Router<DunningAppState> {
    Router::new()
        .route("/", get(list_workflows).post(save_workflow))
        .route("/validate", post(validate_workflow))
        .route("/:id", get(get_workflow).put(update_workflow))
        .route("/:id/versions", get(list_workflow_versions))
        .route("/:id/versions/:version", get(get_workflow_version))
}

/// Create the complete dunning router.
///
/// # Example
///
/// ```ignore
/// let app = dunning_router()
///     .layer(TraceLayer::new_for_http())
///     .with_state(app_state);
/// ```
pub fn dunning_router() -> Router<DunningAppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/api/events", event_routes())
        .nest("/api/campaigns", campaign_routes())
        .route("/api/subscriptions/:id/campaign", get(get_subscription_campaign))
        .nest("/api/rules", rule_routes())
        .nest("/api/workflows", workflow_routes())
}
