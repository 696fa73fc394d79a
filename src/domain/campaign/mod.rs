//! Campaign domain module.
//!
//! A campaign is the unit of work driven through a workflow for one
//! subscription with an unresolved payment failure.
//!
//! # Module Structure
//!
//! - `aggregate` - `Campaign` aggregate and its transitions
//! - `status` - `CampaignStatus` state machine
//! - `step` - history entries, outcomes and queued external signals
//! - `events` - domain events published after commit
//! - `errors` - `DunningError`
//! - `probability` - advisory recovery estimate

mod aggregate;
mod errors;
mod events;
mod probability;
mod status;
mod step;

pub use aggregate::{Campaign, NewCampaign};
pub use errors::DunningError;
pub use events::{
    CampaignCancelled, CampaignCompleted, CampaignCreated, CampaignEscalated, CampaignEvent,
    CampaignPaused, CampaignRescheduled, CampaignResumed, CampaignStepExecuted,
};
pub use probability::success_probability;
pub use status::CampaignStatus;
pub use step::{CampaignOutcome, CampaignStep, ExternalSignal, PaymentSnapshot, StepOutcome};
