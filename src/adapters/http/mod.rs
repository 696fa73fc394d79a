//! HTTP adapters - REST API implementations.

pub mod dunning;

// Re-export key types for convenience
pub use dunning::dunning_router;
pub use dunning::{DunningApiError, DunningAppState};
