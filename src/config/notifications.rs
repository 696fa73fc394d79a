//! Notification delivery configuration

use secrecy::SecretString;
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Outbound messaging service. Without a `webhook_url` notifications are
/// logged and reported delivered.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationConfig {
    pub webhook_url: Option<String>,

    /// Signs each request with `X-Dunning-Signature` when set
    pub signing_secret: Option<SecretString>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl NotificationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.webhook_url {
            Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
                Err(ValidationError::InvalidHttpUrl("notifications.webhook_url"))
            }
            _ => Ok(()),
        }
    }
}

fn default_timeout() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_url_must_be_http() {
        let config = NotificationConfig {
            webhook_url: Some("ftp://messages.example.com".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = NotificationConfig {
            webhook_url: Some("https://messages.example.com/send".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
