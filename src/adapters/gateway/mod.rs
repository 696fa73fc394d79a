//! Payment gateway adapters.
//!
//! - `HttpPaymentGateway` - REST client for the billing gateway
//! - `MockPaymentGateway` - Scripted gateway with a call log for tests
//! - `SignatureVerifier` - HMAC-SHA256 check for inbound gateway events

mod http_gateway;
mod mock_gateway;
mod signature;

pub use http_gateway::{HttpGatewayConfig, HttpPaymentGateway};
pub use mock_gateway::{MockPaymentGateway, RetryCall};
pub use signature::{SignatureError, SignatureVerifier, SIGNATURE_HEADER};
