//! In-memory adapters for testing and single-process development.
//!
//! State lives in the process and is lost on restart. Several schedulers can
//! share one instance to exercise lease contention in tests.

mod campaign_repository;
mod configuration_store;
mod customer_store;
mod lease_manager;
mod processed_event_store;
mod rule_repository;
mod workflow_repository;

pub use campaign_repository::InMemoryCampaignRepository;
pub use configuration_store::StaticConfigurationStore;
pub use customer_store::InMemoryCustomerStore;
pub use lease_manager::InMemoryLeaseManager;
pub use processed_event_store::InMemoryProcessedEventStore;
pub use rule_repository::InMemoryRuleRepository;
pub use workflow_repository::InMemoryWorkflowRepository;
