//! Webhook notification dispatcher.
//!
//! POSTs each notification as JSON to the messaging service, which owns the
//! templates and channel integrations. Bodies are signed with HMAC-SHA256
//! when a signing secret is configured.
//!
//! # Response mapping
//!
//! | Response | Result |
//! |----------|--------|
//! | 2xx `{"status":"delivered"}` or empty | `Delivered` |
//! | 2xx `{"status":"failed","reason":..}` | `Failed` |
//! | 4xx/5xx | `Rejected` (transient for 429 and 5xx) |
//! | timeout / connection error | `Timeout` / `Unavailable` |

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::time::Duration;

use crate::ports::{DeliveryResult, DispatchError, Notification, NotificationDispatcher};

type HmacSha256 = Hmac<Sha256>;

pub const NOTIFICATION_SIGNATURE_HEADER: &str = "X-Dunning-Signature";

#[derive(Clone)]
pub struct WebhookDispatcherConfig {
    pub url: String,
    pub signing_secret: Option<SecretString>,
    pub timeout: Duration,
}

impl std::fmt::Debug for WebhookDispatcherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookDispatcherConfig")
            .field("url", &self.url)
            .field("signed", &self.signing_secret.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

pub struct WebhookNotificationDispatcher {
    config: WebhookDispatcherConfig,
    http_client: reqwest::Client,
}

impl WebhookNotificationDispatcher {
    pub fn new(config: WebhookDispatcherConfig) -> Result<Self, DispatchError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DispatchError::Unavailable(e.to_string()))?;
        Ok(Self { config, http_client })
    }

    fn signature(&self, body: &[u8]) -> Option<String> {
        let secret = self.config.signing_secret.as_ref()?;
        let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes()).ok()?;
        mac.update(body);
        Some(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
    }
}

fn parse_delivery(body: &str) -> DeliveryResult {
    if body.trim().is_empty() {
        return DeliveryResult::Delivered;
    }
    serde_json::from_str(body).unwrap_or(DeliveryResult::Delivered)
}

#[async_trait]
impl NotificationDispatcher for WebhookNotificationDispatcher {
    async fn send(&self, notification: &Notification) -> Result<DeliveryResult, DispatchError> {
        let body = serde_json::to_vec(notification).map_err(|e| DispatchError::Rejected {
            status: 400,
            message: format!("unserializable notification: {}", e),
        })?;

        let mut request = self
            .http_client
            .post(&self.config.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header("Idempotency-Key", &notification.idempotency_key);
        if let Some(signature) = self.signature(&body) {
            request = request.header(NOTIFICATION_SIGNATURE_HEADER, signature);
        }

        let response = request.body(body).send().await.map_err(|e| {
            if e.is_timeout() {
                DispatchError::Timeout
            } else {
                DispatchError::Unavailable(e.to_string())
            }
        })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            tracing::warn!(
                template_id = %notification.template_id,
                status = status.as_u16(),
                error = %text,
                "notification webhook rejected"
            );
            return Err(DispatchError::Rejected {
                status: status.as_u16(),
                message: text,
            });
        }

        let result = parse_delivery(&text);
        tracing::debug!(template_id = %notification.template_id, channel = %notification.channel, result = ?result, "notification sent");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher(secret: Option<&str>) -> WebhookNotificationDispatcher {
        WebhookNotificationDispatcher::new(WebhookDispatcherConfig {
            url: "https://notify.test/send".into(),
            signing_secret: secret.map(|s| SecretString::new(s.to_string())),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn parses_delivery_bodies() {
        assert_eq!(parse_delivery(""), DeliveryResult::Delivered);
        assert_eq!(parse_delivery(r#"{"status":"delivered"}"#), DeliveryResult::Delivered);
        assert_eq!(
            parse_delivery(r#"{"status":"failed","reason":"bounced"}"#),
            DeliveryResult::Failed {
                reason: "bounced".into()
            }
        );
    }

    #[test]
    fn signs_only_with_secret() {
        assert!(dispatcher(None).signature(b"{}").is_none());

        let a = dispatcher(Some("s1")).signature(b"{}").unwrap();
        let b = dispatcher(Some("s2")).signature(b"{}").unwrap();
        assert!(a.starts_with("sha256="));
        assert_ne!(a, b);
    }
}
