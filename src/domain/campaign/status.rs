//! Campaign status state machine.

use crate::domain::foundation::{StateMachine, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a dunning campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    /// Created, start transition not yet applied.
    Pending,

    /// Progressing through its workflow.
    Active,

    /// Halted by an operator; the scheduler skips it.
    Paused,

    /// Escalated to a human. Still progresses through the workflow.
    Escalated,

    /// Terminal: recovered, exhausted, suspended or workflow ended.
    Completed,

    /// Terminal: subscription cancelled, operator cancelled or merged away.
    Cancelled,
}

impl CampaignStatus {
    pub const OPEN: [CampaignStatus; 4] = [
        CampaignStatus::Pending,
        CampaignStatus::Active,
        CampaignStatus::Paused,
        CampaignStatus::Escalated,
    ];

    /// Open campaigns count against the one-per-subscription invariant.
    pub fn is_open(&self) -> bool {
        !matches!(self, CampaignStatus::Completed | CampaignStatus::Cancelled)
    }

    /// Statuses the scheduler advances.
    pub fn is_schedulable(&self) -> bool {
        matches!(self, CampaignStatus::Active | CampaignStatus::Escalated)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Pending => "pending",
            CampaignStatus::Active => "active",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Escalated => "escalated",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CampaignStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CampaignStatus::Pending),
            "active" => Ok(CampaignStatus::Active),
            "paused" => Ok(CampaignStatus::Paused),
            "escalated" => Ok(CampaignStatus::Escalated),
            "completed" => Ok(CampaignStatus::Completed),
            "cancelled" => Ok(CampaignStatus::Cancelled),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown campaign status '{}'", other),
            )),
        }
    }
}

impl StateMachine for CampaignStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use CampaignStatus::*;
        matches!(
            (self, target),
            // From PENDING
            (Pending, Active)
                | (Pending, Completed)
                | (Pending, Cancelled)
            // From ACTIVE
                | (Active, Active) // step advance
                | (Active, Paused)
                | (Active, Escalated)
                | (Active, Completed)
                | (Active, Cancelled)
            // From PAUSED
                | (Paused, Active)
                | (Paused, Escalated) // resume of an escalated campaign
                | (Paused, Completed)
                | (Paused, Cancelled)
            // From ESCALATED
                | (Escalated, Escalated)
                | (Escalated, Paused)
                | (Escalated, Completed)
                | (Escalated, Cancelled)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use CampaignStatus::*;
        match self {
            Pending => vec![Active, Completed, Cancelled],
            Active => vec![Active, Paused, Escalated, Completed, Cancelled],
            Paused => vec![Active, Escalated, Completed, Cancelled],
            Escalated => vec![Escalated, Paused, Completed, Cancelled],
            Completed | Cancelled => vec![],
        }
    }
}
