//! Application handlers.
//!
//! Operator-facing command and query handlers. Campaign commands (pause,
//! resume, cancel, reschedule) live on the coordinator because they need
//! the campaign lease.

mod campaign_queries;
mod rule_admin;
mod workflow_admin;

pub use campaign_queries::CampaignQueryHandler;
pub use rule_admin::RuleAdminHandler;
pub use workflow_admin::WorkflowAdminHandler;
