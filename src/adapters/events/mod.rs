//! Event publishing adapters.
//!
//! - `InMemoryEventBus` - Captures events in-process for testing
//! - `LoggingEventPublisher` - Emits events to the structured log

mod in_memory;
mod logging;

pub use in_memory::InMemoryEventBus;
pub use logging::LoggingEventPublisher;
