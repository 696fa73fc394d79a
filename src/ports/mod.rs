//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `CampaignRepository` - Campaigns and their queued signals
//! - `RuleRepository` - Dunning rules
//! - `WorkflowRepository` - Versioned workflow definitions
//! - `ProcessedEventStore` - Inbound event deduplication
//!
//! ## Coordination Ports
//!
//! - `LeaseManager` - Per-campaign mutual exclusion with expiry
//!
//! ## Collaborator Ports
//!
//! - `PaymentGateway` - Charge retries and account suspension
//! - `NotificationDispatcher` - Template delivery on any channel
//! - `CustomerStore` - Read-only customer and subscription attributes
//! - `ConfigurationStore` - Hot-reloadable dunning tunables
//! - `EventPublisher` - Outbound domain events

mod campaign_repository;
mod configuration_store;
mod customer_store;
mod event_publisher;
mod lease_manager;
mod notification_dispatcher;
mod payment_gateway;
mod processed_event_store;
mod rule_repository;
mod workflow_repository;

pub use campaign_repository::{
    CampaignFilter, CampaignPage, CampaignRepository, CampaignSort, CreateOutcome,
};
pub use configuration_store::{ConfigurationStore, DunningSettings};
pub use customer_store::{CustomerProfile, CustomerStore, SubscriptionProfile};
pub use event_publisher::EventPublisher;
pub use lease_manager::LeaseManager;
pub use notification_dispatcher::{DeliveryResult, DispatchError, Notification, NotificationDispatcher};
pub use payment_gateway::{GatewayError, PaymentGateway, RetryResult};
pub use processed_event_store::ProcessedEventStore;
pub use rule_repository::RuleRepository;
pub use workflow_repository::WorkflowRepository;
