//! Rule repository port.
//!
//! Rules are configuration: created, revised, enabled/disabled and deleted
//! by operators, read on every evaluation.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, RuleId};
use crate::domain::rules::Rule;

#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// Inserts a new rule and returns it with its creation `sequence` assigned.
    ///
    /// Sequences are strictly increasing and break priority ties.
    async fn create(&self, rule: Rule) -> Result<Rule, DomainError>;

    /// Replaces an existing rule, keeping its sequence.
    ///
    /// # Errors
    ///
    /// - `RuleNotFound` if the rule doesn't exist
    async fn update(&self, rule: &Rule) -> Result<(), DomainError>;

    /// Returns `true` if a rule was removed.
    async fn delete(&self, id: &RuleId) -> Result<bool, DomainError>;

    async fn find_by_id(&self, id: &RuleId) -> Result<Option<Rule>, DomainError>;

    /// Every rule, enabled or not, ordered by priority then sequence.
    async fn list(&self) -> Result<Vec<Rule>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn RuleRepository) {}
}
