//! Notification dispatcher adapters.
//!
//! - `WebhookNotificationDispatcher` - Signed JSON POST to the messaging service
//! - `LoggingDispatcher` - Logs and reports delivery, for local runs
//! - `RecordingDispatcher` - Scripted results and a send log for tests

mod logging;
mod recording;
mod webhook;

pub use logging::LoggingDispatcher;
pub use recording::RecordingDispatcher;
pub use webhook::{WebhookDispatcherConfig, WebhookNotificationDispatcher, NOTIFICATION_SIGNATURE_HEADER};
