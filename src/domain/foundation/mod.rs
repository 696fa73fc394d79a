//! Foundation module - Shared domain primitives.
//!
//! Identifiers, time, errors, the state machine contract, and the event
//! envelope used across the dunning domain.

mod errors;
mod events;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use events::{DomainEvent, EventEnvelope, EventId, EventMetadata};
pub use ids::{CampaignId, CustomerId, NodeId, PaymentId, RuleId, SubscriptionId, WorkflowId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
