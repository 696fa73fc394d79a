//! Workflow domain module.
//!
//! Operator-authored directed graphs of dunning actions, validated once at
//! save time and immutable per version afterwards.

mod definition;
mod validate;

pub use definition::{
    next_node, ActionKind, Channel, EdgeGuard, GraphError, NodeKind, WaitKind, WorkflowDefinition,
    WorkflowDraft, WorkflowEdge, WorkflowNode,
};
pub use validate::{validate, WorkflowValidationError, MAX_WAIT_HOURS};
