//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, events)
//! - `rules` - Prioritized business rules and the evaluation context
//! - `workflow` - Versioned dunning workflow graphs
//! - `campaign` - Campaign aggregate, history and lifecycle events

pub mod campaign;
pub mod foundation;
pub mod rules;
pub mod workflow;
