//! Strongly-typed identifier value objects.
//!
//! Engine-owned entities (campaigns, rules) use UUIDs. Identifiers that come
//! from collaborators (subscriptions, customers, payments) or are authored by
//! operators (workflows, nodes) are opaque non-empty strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ValidationError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates the identifier, returning error if empty or blank.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::empty_field($field));
                }
                Ok(Self(id))
            }

            /// Wraps a non-empty literal.
            #[allow(dead_code)]
            pub(crate) fn from_static(id: &'static str) -> Self {
                debug_assert!(!id.trim().is_empty());
                Self(id.to_string())
            }

            /// Returns the inner string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a dunning campaign.
    CampaignId
);

uuid_id!(
    /// Unique identifier for a dunning rule.
    RuleId
);

string_id!(
    /// Operator-chosen identifier for a workflow definition (e.g. `standard-dunning`).
    WorkflowId,
    "workflow_id"
);

string_id!(
    /// Identifier of a node within one workflow definition.
    NodeId,
    "node_id"
);

string_id!(
    /// Subscription identifier owned by the billing system.
    SubscriptionId,
    "subscription_id"
);

string_id!(
    /// Customer identifier owned by the billing system.
    CustomerId,
    "customer_id"
);

string_id!(
    /// Payment (invoice charge) identifier owned by the payment gateway.
    PaymentId,
    "payment_id"
);
