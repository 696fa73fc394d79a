use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::DomainError;
use crate::ports::{ConfigurationStore, DunningSettings};

/// Settings held in memory, replaceable at runtime.
#[derive(Debug)]
pub struct StaticConfigurationStore {
    settings: RwLock<Arc<DunningSettings>>,
}

impl StaticConfigurationStore {
    pub fn new(settings: DunningSettings) -> Self {
        Self {
            settings: RwLock::new(Arc::new(settings)),
        }
    }

    /// Swaps in new settings; the next evaluation sees them.
    pub async fn replace(&self, settings: DunningSettings) {
        *self.settings.write().await = Arc::new(settings);
    }
}

impl Default for StaticConfigurationStore {
    fn default() -> Self {
        Self::new(DunningSettings::default())
    }
}

#[async_trait]
impl ConfigurationStore for StaticConfigurationStore {
    async fn settings(&self) -> Result<Arc<DunningSettings>, DomainError> {
        Ok(self.settings.read().await.clone())
    }
}
