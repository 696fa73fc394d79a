//! Redis adapters.

mod lease_manager;

pub use lease_manager::RedisLeaseManager;
