//! Customer/Subscription store port (read-only).
//!
//! Attribute lookups used to build the evaluation context. Money amounts
//! are integer cents.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::domain::foundation::{CustomerId, DomainError, SubscriptionId, Timestamp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub segment: Option<String>,
    pub lifetime_value_cents: i64,
    pub created_at: Timestamp,
    #[serde(default)]
    pub account_manager: Option<String>,
    /// Additional attributes exposed under `customer.*` as-is.
    #[serde(default)]
    pub attributes: Map<String, JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionProfile {
    pub id: SubscriptionId,
    pub customer_id: CustomerId,
    pub plan: String,
    pub value_cents: i64,
    pub billing_interval: String,
    /// Additional attributes exposed under `subscription.*` as-is.
    #[serde(default)]
    pub attributes: Map<String, JsonValue>,
}

#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn customer(&self, id: &CustomerId) -> Result<Option<CustomerProfile>, DomainError>;

    async fn subscription(
        &self,
        id: &SubscriptionId,
    ) -> Result<Option<SubscriptionProfile>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn CustomerStore) {}
}
