//! HTTP payment gateway adapter.
//!
//! Talks to the billing gateway's REST API:
//!
//! | Call | Request |
//! |------|---------|
//! | `attempt_retry` | `POST {base}/v1/payments/{id}/retry` |
//! | `suspend_account` | `POST {base}/v1/subscriptions/{id}/suspend` |
//!
//! Every request carries the bearer API key and an `Idempotency-Key` header.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use crate::domain::foundation::{PaymentId, SubscriptionId};
use crate::ports::{GatewayError, PaymentGateway, RetryResult};

#[derive(Clone)]
pub struct HttpGatewayConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub timeout: Duration,
}

impl std::fmt::Debug for HttpGatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGatewayConfig")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct RetryResponse {
    status: String,
    #[serde(default)]
    failure_reason: Option<String>,
}

pub struct HttpPaymentGateway {
    config: HttpGatewayConfig,
    http_client: reqwest::Client,
}

impl HttpPaymentGateway {
    pub fn new(config: HttpGatewayConfig) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        Ok(Self { config, http_client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post(&self, path: &str, idempotency_key: &str) -> Result<reqwest::Response, GatewayError> {
        let response = self
            .http_client
            .post(self.url(path))
            .bearer_auth(self.config.api_key.expose_secret())
            .header("Idempotency-Key", idempotency_key)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GatewayError::RateLimited);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(path, status = status.as_u16(), error = %message, "gateway request failed");
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Unavailable(e.to_string())
    }
}

fn parse_retry(body: RetryResponse) -> Result<RetryResult, GatewayError> {
    match body.status.as_str() {
        "succeeded" => Ok(RetryResult::Succeeded),
        "failed" => Ok(RetryResult::Failed {
            failure_reason: body.failure_reason.unwrap_or_else(|| "unknown".to_string()),
        }),
        other => Err(GatewayError::Rejected {
            status: 502,
            message: format!("unexpected retry status '{}'", other),
        }),
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn attempt_retry(
        &self,
        payment_id: &PaymentId,
        idempotency_key: &str,
    ) -> Result<RetryResult, GatewayError> {
        let path = format!("/v1/payments/{}/retry", payment_id);
        let response = self.post(&path, idempotency_key).await?;
        let body: RetryResponse = response.json().await.map_err(|e| GatewayError::Rejected {
            status: 502,
            message: format!("invalid retry response: {}", e),
        })?;
        let result = parse_retry(body)?;
        tracing::debug!(payment_id = %payment_id, result = ?result, "gateway retry");
        Ok(result)
    }

    async fn suspend_account(&self, subscription_id: &SubscriptionId) -> Result<(), GatewayError> {
        let path = format!("/v1/subscriptions/{}/suspend", subscription_id);
        let key = format!("suspend:{}", subscription_id);
        self.post(&path, &key).await?;
        tracing::info!(subscription_id = %subscription_id, "account suspended at gateway");
        Ok(())
    }
}
