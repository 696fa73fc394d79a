//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `memory` - In-memory ports for tests and single-node development
//! - `postgres` - PostgreSQL persistence (sqlx)
//! - `redis` - Campaign leases
//! - `gateway` - Payment gateway client and inbound signature checks
//! - `notifications` - Outbound notification delivery
//! - `settings` - Hot-reloadable dunning tunables
//! - `events` - Domain event publishing
//! - `http` - Axum REST surface

pub mod events;
pub mod gateway;
pub mod http;
pub mod memory;
pub mod notifications;
pub mod postgres;
pub mod redis;
pub mod settings;

pub use events::{InMemoryEventBus, LoggingEventPublisher};
