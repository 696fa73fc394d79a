use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, RuleId};
use crate::domain::rules::Rule;
use crate::ports::RuleRepository;

#[derive(Debug, Default)]
struct RuleTable {
    rules: HashMap<RuleId, Rule>,
    next_sequence: i64,
}

/// In-memory rule store. Sequences increase monotonically like a BIGSERIAL.
#[derive(Debug, Default)]
pub struct InMemoryRuleRepository {
    table: RwLock<RuleTable>,
}

impl InMemoryRuleRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RuleRepository for InMemoryRuleRepository {
    async fn create(&self, mut rule: Rule) -> Result<Rule, DomainError> {
        let mut table = self.table.write().await;
        table.next_sequence += 1;
        rule.sequence = table.next_sequence;
        table.rules.insert(rule.id, rule.clone());
        Ok(rule)
    }

    async fn update(&self, rule: &Rule) -> Result<(), DomainError> {
        let mut table = self.table.write().await;
        match table.rules.get_mut(&rule.id) {
            Some(stored) => {
                let sequence = stored.sequence;
                *stored = rule.clone();
                stored.sequence = sequence;
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::RuleNotFound,
                format!("Rule not found: {}", rule.id),
            )),
        }
    }

    async fn delete(&self, id: &RuleId) -> Result<bool, DomainError> {
        Ok(self.table.write().await.rules.remove(id).is_some())
    }

    async fn find_by_id(&self, id: &RuleId) -> Result<Option<Rule>, DomainError> {
        Ok(self.table.read().await.rules.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Rule>, DomainError> {
        let mut rules: Vec<Rule> = self.table.read().await.rules.values().cloned().collect();
        rules.sort_by_key(|r| (r.priority, r.sequence));
        Ok(rules)
    }
}
