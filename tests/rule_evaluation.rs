//! Rule selection properties over arbitrary priorities and operators.

use proptest::prelude::*;
use serde_json::{json, Value};

use dunning_engine::domain::foundation::{RuleId, Timestamp};
use dunning_engine::domain::rules::{
    evaluate, Condition, EvaluationContext, Operator, Rule, RuleAction,
};

// ════════════════════════════════════════════════════════════════════════════
// Fixtures
// ════════════════════════════════════════════════════════════════════════════

const OPERATORS: [Operator; 10] = [
    Operator::Equals,
    Operator::NotEquals,
    Operator::GreaterThan,
    Operator::LessThan,
    Operator::GreaterThanOrEqual,
    Operator::LessThanOrEqual,
    Operator::Contains,
    Operator::StartsWith,
    Operator::In,
    Operator::NotIn,
];

fn rule(name: &str, priority: i32, sequence: i64, grace_days: u32) -> Rule {
    let now = Timestamp::now();
    Rule {
        id: RuleId::new(),
        name: name.to_string(),
        priority,
        enabled: true,
        conditions: vec![Condition::new("payment.amount", Operator::GreaterThan, 0)],
        actions: vec![RuleAction::ExtendGracePeriod(grace_days)],
        sequence,
        created_at: now,
        updated_at: now,
    }
}

fn context() -> EvaluationContext {
    EvaluationContext::new()
        .with_section("payment", json!({ "amount": 250.0, "failureCount": 1 }))
        .with_section("customer", json!({ "segment": "smb", "lifetimeValue": 1200.0 }))
}

fn any_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(|n| json!(n)),
        "[a-z]{0,8}".prop_map(|s| json!(s)),
        any::<bool>().prop_map(|b| json!(b)),
        prop::collection::vec("[a-z]{1,4}", 0..4).prop_map(|v| json!(v)),
        Just(Value::Null),
    ]
}

// ════════════════════════════════════════════════════════════════════════════
// Properties
// ════════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn lowest_priority_matching_rule_wins(a in -1000i32..1000, b in -1000i32..1000) {
        prop_assume!(a != b);
        let rules = vec![rule("first", a, 1, 10), rule("second", b, 2, 20)];

        let result = evaluate(&rules, &context());

        let (expected_name, expected_days) = if a < b { ("first", 10) } else { ("second", 20) };
        prop_assert_eq!(result.matched_rule_name.as_deref(), Some(expected_name));
        prop_assert_eq!(result.overrides.grace_period_days, Some(expected_days));
    }

    #[test]
    fn priority_ties_go_to_the_older_rule(priority in -100i32..100, first_seq in 0i64..50, gap in 1i64..50) {
        // Listed newest first so input order cannot decide the outcome
        let rules = vec![
            rule("newer", priority, first_seq + gap, 20),
            rule("older", priority, first_seq, 10),
        ];

        let result = evaluate(&rules, &context());

        prop_assert_eq!(result.matched_rule_name.as_deref(), Some("older"));
    }

    #[test]
    fn missing_field_never_matches(
        op in prop::sample::select(OPERATORS.to_vec()),
        value in any_value(),
        field in "(customer|subscription|payment|system|campaign)\\.missing[A-Z][a-z]{0,6}",
    ) {
        let condition = Condition::new(field, op, value);
        prop_assert!(!condition.evaluate(&context()));
    }

    #[test]
    fn rule_with_missing_field_is_skipped_for_the_next(op in prop::sample::select(OPERATORS.to_vec())) {
        let mut blind = rule("blind", 1, 1, 30);
        blind.conditions = vec![Condition::new("customer.accountManager", op, json!("x"))];
        let rules = vec![blind, rule("fallback", 2, 2, 5)];

        let result = evaluate(&rules, &context());

        prop_assert_eq!(result.matched_rule_name.as_deref(), Some("fallback"));
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Examples
// ════════════════════════════════════════════════════════════════════════════

#[test]
fn disabled_rules_are_not_evaluated() {
    let mut top = rule("top", 1, 1, 30);
    top.enabled = false;
    let rules = vec![top, rule("next", 5, 2, 14)];

    let result = evaluate(&rules, &context());

    assert_eq!(result.matched_rule_name.as_deref(), Some("next"));
    assert_eq!(result.overrides.grace_period_days, Some(14));
}

#[test]
fn no_match_yields_empty_overrides() {
    let mut strict = rule("strict", 1, 1, 30);
    strict.conditions = vec![Condition::new("customer.segment", Operator::Equals, "enterprise")];

    let result = evaluate(&[strict], &context());

    assert!(result.matched_rule.is_none());
    assert!(result.overrides.is_empty());
}
