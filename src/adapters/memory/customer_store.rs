use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{CustomerId, DomainError, SubscriptionId};
use crate::ports::{CustomerProfile, CustomerStore, SubscriptionProfile};

/// In-memory customer/subscription directory, seeded by tests or fixtures.
#[derive(Debug, Default)]
pub struct InMemoryCustomerStore {
    customers: RwLock<HashMap<CustomerId, CustomerProfile>>,
    subscriptions: RwLock<HashMap<SubscriptionId, SubscriptionProfile>>,
}

impl InMemoryCustomerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_customer(&self, customer: CustomerProfile) {
        self.customers.write().await.insert(customer.id.clone(), customer);
    }

    pub async fn insert_subscription(&self, subscription: SubscriptionProfile) {
        self.subscriptions
            .write()
            .await
            .insert(subscription.id.clone(), subscription);
    }
}

#[async_trait]
impl CustomerStore for InMemoryCustomerStore {
    async fn customer(&self, id: &CustomerId) -> Result<Option<CustomerProfile>, DomainError> {
        Ok(self.customers.read().await.get(id).cloned())
    }

    async fn subscription(
        &self,
        id: &SubscriptionId,
    ) -> Result<Option<SubscriptionProfile>, DomainError> {
        Ok(self.subscriptions.read().await.get(id).cloned())
    }
}
