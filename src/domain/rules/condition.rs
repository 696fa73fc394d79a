//! Field/operator/value conditions shared by rules and workflow branches.
//!
//! Evaluation never fails: anything that cannot be compared (missing field,
//! non-numeric value under a numeric operator, wrong shape) is a non-match.
//! Operator applicability is checked once, when a rule or workflow is saved.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use super::context::{known_field_type, known_root, EvaluationContext, FieldType};

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    Contains,
    StartsWith,
    In,
    NotIn,
}

impl Operator {
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Operator::GreaterThan
                | Operator::LessThan
                | Operator::GreaterThanOrEqual
                | Operator::LessThanOrEqual
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "not_equals",
            Operator::GreaterThan => "greater_than",
            Operator::LessThan => "less_than",
            Operator::GreaterThanOrEqual => "greater_than_or_equal",
            Operator::LessThanOrEqual => "less_than_or_equal",
            Operator::Contains => "contains",
            Operator::StartsWith => "starts_with",
            Operator::In => "in",
            Operator::NotIn => "not_in",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a condition is rejected at save time.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConditionError {
    #[error("condition field cannot be empty")]
    EmptyField,

    #[error("field '{field}' does not start with a known context root")]
    UnknownRoot { field: String },

    #[error("operator '{operator}' cannot be applied to {field_type:?} field '{field}'")]
    OperatorNotApplicable {
        field: String,
        operator: String,
        field_type: FieldType,
    },

    #[error("operator '{operator}' requires {expected}")]
    InvalidValue { operator: String, expected: String },
}

/// One `field operator value` test against an [`EvaluationContext`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Tests the condition. Missing fields fail closed for every operator.
    pub fn evaluate(&self, ctx: &EvaluationContext) -> bool {
        let Some(actual) = ctx.resolve(&self.field) else {
            return false;
        };
        let expected = &self.value;

        match self.operator {
            Operator::Equals => loosely_equals(actual, expected),
            Operator::NotEquals => !loosely_equals(actual, expected),
            Operator::GreaterThan => compare(actual, expected, |a, b| a > b),
            Operator::LessThan => compare(actual, expected, |a, b| a < b),
            Operator::GreaterThanOrEqual => compare(actual, expected, |a, b| a >= b),
            Operator::LessThanOrEqual => compare(actual, expected, |a, b| a <= b),
            Operator::Contains => match (actual, expected) {
                (Value::String(haystack), _) => {
                    text_of(expected).map_or(false, |needle| haystack.contains(&needle))
                }
                (Value::Array(items), _) => items.iter().any(|item| scalar_equals(item, expected)),
                _ => false,
            },
            Operator::StartsWith => match actual {
                Value::String(s) => text_of(expected).map_or(false, |prefix| s.starts_with(&prefix)),
                _ => false,
            },
            Operator::In => is_member(actual, expected),
            Operator::NotIn => !is_member(actual, expected),
        }
    }

    /// Save-time check of field root, operator applicability and value shape.
    pub fn validate(&self) -> Result<(), ConditionError> {
        if self.field.trim().is_empty() {
            return Err(ConditionError::EmptyField);
        }
        if known_root(&self.field).is_none() {
            return Err(ConditionError::UnknownRoot {
                field: self.field.clone(),
            });
        }

        let field_type = known_field_type(&self.field).or_else(|| self.inferred_field_type());
        let not_applicable = |field_type: FieldType| ConditionError::OperatorNotApplicable {
            field: self.field.clone(),
            operator: self.operator.to_string(),
            field_type,
        };
        let invalid_value = |expected: &str| ConditionError::InvalidValue {
            operator: self.operator.to_string(),
            expected: expected.to_string(),
        };

        match self.operator {
            op if op.is_numeric() => {
                if let Some(ft) = field_type.filter(|ft| *ft != FieldType::Number) {
                    return Err(not_applicable(ft));
                }
                if number_of(&self.value).is_none() {
                    return Err(invalid_value("a numeric value"));
                }
            }
            Operator::Contains | Operator::StartsWith => {
                if let Some(ft) = field_type {
                    let ok = match self.operator {
                        Operator::StartsWith => ft == FieldType::Text,
                        _ => ft.is_text_like(),
                    };
                    if !ok {
                        return Err(not_applicable(ft));
                    }
                }
                if text_of(&self.value).map_or(true, |s| s.is_empty()) {
                    return Err(invalid_value("a non-empty text value"));
                }
            }
            Operator::In | Operator::NotIn => {
                if let Some(ft) = field_type.filter(|ft| !ft.is_text_like()) {
                    return Err(not_applicable(ft));
                }
                if candidates(&self.value).map_or(true, |c| c.is_empty()) {
                    return Err(invalid_value("a list or comma-separated text of candidates"));
                }
            }
            _ => {
                if !is_scalar(&self.value) {
                    return Err(invalid_value("a text, number or boolean value"));
                }
            }
        }
        Ok(())
    }

    // Fields outside the catalog are typed by the value they are compared to.
    fn inferred_field_type(&self) -> Option<FieldType> {
        match self.operator {
            Operator::In | Operator::NotIn => Some(FieldType::Text),
            _ => FieldType::of(&self.value),
        }
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

/// Numbers and numeric strings coerce to f64.
fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn compare(actual: &Value, expected: &Value, op: impl Fn(f64, f64) -> bool) -> bool {
    // Only real numbers on the context side; "12" in the data is not numeric.
    match (actual.as_f64(), number_of(expected)) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}

fn scalar_equals(actual: &Value, expected: &Value) -> bool {
    if let (Value::Number(_), Some(a), Some(b)) = (actual, actual.as_f64(), number_of(expected)) {
        return a == b;
    }
    match (text_of(actual), text_of(expected)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn loosely_equals(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::Array(items) => items.iter().any(|item| scalar_equals(item, expected)),
        _ => scalar_equals(actual, expected),
    }
}

fn candidates(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) if items.iter().all(is_scalar) => Some(items.clone()),
        Value::String(s) => Some(
            s.split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(|c| Value::String(c.to_string()))
                .collect(),
        ),
        _ => None,
    }
}

fn is_member(actual: &Value, expected: &Value) -> bool {
    let Some(candidates) = candidates(expected) else {
        return false;
    };
    match actual {
        Value::Array(items) => items
            .iter()
            .any(|item| candidates.iter().any(|c| scalar_equals(item, c))),
        _ => candidates.iter().any(|c| scalar_equals(actual, c)),
    }
}
