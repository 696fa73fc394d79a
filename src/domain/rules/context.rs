//! Evaluation context: the read-only attribute snapshot rules and branch
//! conditions are tested against.
//!
//! The context is a JSON object addressed by dotted paths
//! (`customer.lifetimeValue`). It is assembled fresh for every evaluation
//! by the application layer and never cached across steps.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Top-level namespaces a condition field may start with.
pub const CONTEXT_ROOTS: [&str; 5] = ["customer", "subscription", "payment", "system", "campaign"];

/// Coarse value type used for operator applicability checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Number,
    Text,
    Bool,
    List,
}

impl FieldType {
    /// Infers the type of a JSON value; `None` for null and objects.
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Number(_) => Some(FieldType::Number),
            Value::String(_) => Some(FieldType::Text),
            Value::Bool(_) => Some(FieldType::Bool),
            Value::Array(_) => Some(FieldType::List),
            Value::Null | Value::Object(_) => None,
        }
    }

    pub fn is_text_like(self) -> bool {
        matches!(self, FieldType::Text | FieldType::List)
    }
}

static FIELD_CATALOG: Lazy<HashMap<&'static str, FieldType>> = Lazy::new(|| {
    use FieldType::*;
    HashMap::from([
        ("customer.lifetimeValue", Number),
        ("customer.accountAgeDays", Number),
        ("customer.segment", Text),
        ("customer.name", Text),
        ("customer.email", Text),
        ("customer.accountManager", Text),
        ("subscription.plan", Text),
        ("subscription.value", Number),
        ("subscription.billingInterval", Text),
        ("payment.amount", Number),
        ("payment.amountCents", Number),
        ("payment.failureCount", Number),
        ("payment.failureReason", Text),
        ("payment.isHighValue", Bool),
        ("system.dayOfWeek", Text),
        ("system.hourOfDay", Number),
        ("campaign.attemptCount", Number),
        ("campaign.maxAttempts", Number),
        ("campaign.daysInDunning", Number),
        ("campaign.escalationThreshold", Number),
        ("campaign.tags", List),
    ])
});

/// Declared type of a well-known context field.
pub fn known_field_type(path: &str) -> Option<FieldType> {
    FIELD_CATALOG.get(path).copied()
}

/// Returns the root segment if it is one of [`CONTEXT_ROOTS`].
pub fn known_root(path: &str) -> Option<&'static str> {
    let root = path.split('.').next()?;
    CONTEXT_ROOTS.iter().copied().find(|r| *r == root)
}

/// Snapshot of customer, subscription, payment, system and campaign attributes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvaluationContext(Map<String, Value>);

impl EvaluationContext {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wraps an existing JSON object; non-object values yield an empty context.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::new(),
        }
    }

    /// Sets (or replaces) one namespace, e.g. `customer`.
    pub fn with_section(mut self, root: &str, section: Value) -> Self {
        self.0.insert(root.to_string(), section);
        self
    }

    /// Sets a single leaf by dotted path, creating intermediate objects.
    pub fn set(&mut self, path: &str, value: Value) {
        let mut segments = path.split('.').peekable();
        let mut current = &mut self.0;
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                current.insert(segment.to_string(), value);
                return;
            }
            let entry = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            current = match entry {
                Value::Object(map) => map,
                _ => return,
            };
        }
    }

    /// Resolves a dotted path. Null leaves count as missing.
    pub fn resolve(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.0.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        if current.is_null() {
            None
        } else {
            Some(current)
        }
    }

    /// The whole snapshot, used as the notification merge context.
    pub fn as_json(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> EvaluationContext {
        EvaluationContext::new()
            .with_section("customer", json!({"lifetimeValue": 12000, "segment": "enterprise"}))
            .with_section("payment", json!({"failureReason": null}))
    }

    #[test]
    fn resolves_nested_paths() {
        assert_eq!(ctx().resolve("customer.lifetimeValue"), Some(&json!(12000)));
        assert_eq!(ctx().resolve("customer.segment"), Some(&json!("enterprise")));
    }

    #[test]
    fn missing_and_null_paths_resolve_to_none() {
        let ctx = ctx();
        assert!(ctx.resolve("customer.nope").is_none());
        assert!(ctx.resolve("subscription.plan").is_none());
        assert!(ctx.resolve("payment.failureReason").is_none());
        assert!(ctx.resolve("customer.segment.deeper").is_none());
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let mut ctx = EvaluationContext::new();
        ctx.set("system.dayOfWeek", json!("monday"));
        ctx.set("system.hourOfDay", json!(9));
        assert_eq!(ctx.resolve("system.dayOfWeek"), Some(&json!("monday")));
        assert_eq!(ctx.as_json(), json!({"system": {"dayOfWeek": "monday", "hourOfDay": 9}}));
    }

    #[test]
    fn catalog_knows_documented_fields() {
        assert_eq!(known_field_type("customer.lifetimeValue"), Some(FieldType::Number));
        assert_eq!(known_field_type("campaign.tags"), Some(FieldType::List));
        assert_eq!(known_field_type("customer.shoeSize"), None);
    }

    #[test]
    fn known_root_rejects_foreign_namespaces() {
        assert_eq!(known_root("payment.amount"), Some("payment"));
        assert_eq!(known_root("invoice.total"), None);
    }
}
