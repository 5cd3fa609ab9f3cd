use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{BranchOptionId, InjectId};

/// Who made a branch decision during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecidedBy {
    Facilitator,
    ParticipantVote,
    /// The inject's default option was taken because no choice was given.
    Automatic,
}

/// One entry in a run's append-only decision log. Never part of the
/// authored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchDecision {
    pub inject_id: InjectId,
    pub branch_option_id: BranchOptionId,
    pub decided_at: DateTime<Utc>,
    pub decided_by: DecidedBy,
}
