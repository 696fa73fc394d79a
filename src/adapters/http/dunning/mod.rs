//! HTTP adapter for dunning endpoints.
//!
//! Exposes the engine via REST API:
//! - `POST /api/events/*` - Gateway events (signature verified when configured)
//! - `/api/campaigns` - Campaign queries and operator actions
//! - `/api/rules` - Rule administration
//! - `/api/workflows` - Versioned workflow administration
//! - `GET /health` - Liveness

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;
pub use handlers::{DunningApiError, DunningAppState};
pub use routes::dunning_router;
