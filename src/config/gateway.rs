//! Payment gateway configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Payment gateway client and inbound event verification.
///
/// Without a `base_url` the engine logs retries instead of calling out.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    pub base_url: Option<String>,

    /// Bearer token for outbound calls
    pub api_key: Option<SecretString>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// HMAC secret for `X-Gateway-Signature` on inbound events
    pub webhook_secret: Option<SecretString>,
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn validate(&self, production: bool) -> Result<(), ValidationError> {
        if let Some(url) = &self.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ValidationError::InvalidHttpUrl("gateway.base_url"));
            }
            if production && !url.starts_with("https://") {
                return Err(ValidationError::HttpsRequired("gateway.base_url"));
            }
            if self
                .api_key
                .as_ref()
                .map_or(true, |k| k.expose_secret().is_empty())
            {
                return Err(ValidationError::MissingRequired("GATEWAY__API_KEY"));
            }
        }
        if production && self.webhook_secret.is_none() {
            return Err(ValidationError::MissingRequired("GATEWAY__WEBHOOK_SECRET"));
        }
        Ok(())
    }
}

fn default_timeout() -> u64 {
    10
}
