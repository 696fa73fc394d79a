//! Rules domain module.
//!
//! Prioritized, multi-condition business rules evaluated against a
//! per-evaluation attribute snapshot.
//!
//! # Module Structure
//!
//! - `context` - `EvaluationContext` and the typed field catalog
//! - `condition` - `Condition`/`Operator`, shared with workflow branches
//! - `rule` - `Rule`, `RuleDraft`, `RuleAction`, `Overrides`
//! - `evaluator` - first-match-wins `evaluate`

mod condition;
mod context;
mod evaluator;
mod rule;

pub use condition::{Condition, ConditionError, Operator};
pub use context::{known_field_type, known_root, EvaluationContext, FieldType, CONTEXT_ROOTS};
pub use evaluator::{evaluate, evaluation_order, EvaluationResult};
pub use rule::{Overrides, Rule, RuleAction, RuleDraft, RuleValidationError};
