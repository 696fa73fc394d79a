//! Application layer - orchestration between the domain and the ports.
//!
//! - `context` - Evaluation context assembly
//! - `executor` - Workflow node execution for one campaign
//! - `coordinator` - Gateway events, ticks and operator actions under lease
//! - `scheduler` - Background polling of due campaigns
//! - `handlers` - Rule/workflow administration and campaign queries

pub mod context;
pub mod coordinator;
pub mod executor;
pub mod handlers;
pub mod scheduler;

pub use context::{assemble_context, CampaignFacts, ContextBuilder};
pub use coordinator::{
    CoordinatorPorts, DunningCoordinator, FailureOutcome, PaymentFailedCommand,
    PaymentSucceededCommand, ResolutionOutcome, SkipReason, SubscriptionCancelledCommand,
    TickOutcome,
};
pub use executor::{AdvanceReport, Stop, WorkflowExecutor};
pub use handlers::{CampaignQueryHandler, RuleAdminHandler, WorkflowAdminHandler};
pub use scheduler::{PollReport, Scheduler, SchedulerConfig};
