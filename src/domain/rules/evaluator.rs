//! Pure rule evaluation: first matching rule wins.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::RuleId;

use super::context::EvaluationContext;
use super::rule::{Overrides, Rule};

/// Outcome of evaluating a rule set against one context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub matched_rule: Option<RuleId>,
    pub matched_rule_name: Option<String>,
    pub overrides: Overrides,
}

impl EvaluationResult {
    pub fn no_match() -> Self {
        Self::default()
    }
}

/// Returns the rules that take part in evaluation, in evaluation order:
/// enabled only, ascending priority, ties by creation sequence.
pub fn evaluation_order(rules: &[Rule]) -> Vec<&Rule> {
    let mut ordered: Vec<&Rule> = rules.iter().filter(|r| r.enabled).collect();
    ordered.sort_by_key(|r| (r.priority, r.sequence));
    ordered
}

/// Evaluates `rules` against `ctx`. Never fails; no match yields no overrides.
pub fn evaluate(rules: &[Rule], ctx: &EvaluationContext) -> EvaluationResult {
    evaluation_order(rules)
        .into_iter()
        .find(|rule| rule.matches(ctx))
        .map(|rule| EvaluationResult {
            matched_rule: Some(rule.id),
            matched_rule_name: Some(rule.name.clone()),
            overrides: rule.overrides(),
        })
        .unwrap_or_default()
}
