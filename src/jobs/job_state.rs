//! Job lifecycle states and their allowed transitions
//!
//! `Queued → Running → {Paused, Stopped, Completed, Failed}`,
//! `Paused → Running` (resume) and `Paused → Stopped`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque identifier of a crawl job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle state of a crawl job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    // ===== Active States =====
    /// Submitted, never started
    Queued,

    /// Crawl loop is executing
    Running,

    /// Checkpointed and resumable
    Paused,

    // ===== Terminal States =====
    /// Stopped by the caller; the persisted state can only seed a new job
    Stopped,

    /// Frontier exhausted or page budget spent
    Completed,

    /// Failure ceiling tripped or checkpoints could not be written
    Failed,
}

impl JobState {
    /// Returns true if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Completed | Self::Failed)
    }

    /// Returns true if `start` may (re)launch the crawl loop
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Queued | Self::Paused)
    }

    /// Returns true if the state machine allows moving to `next`
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Queued, Running)
                | (Running, Paused)
                | (Running, Stopped)
                | (Running, Completed)
                | (Running, Failed)
                | (Paused, Running)
                | (Paused, Stopped)
        )
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "paused" => Some(Self::Paused),
            "stopped" => Some(Self::Stopped),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn all_states() -> [Self; 6] {
        [
            Self::Queued,
            Self::Running,
            Self::Paused,
            Self::Stopped,
            Self::Completed,
            Self::Failed,
        ]
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Queued => "Queued",
            Self::Running => "Running",
            Self::Paused => "Paused",
            Self::Stopped => "Stopped",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        };
        write!(f, "{}", name)
    }
}
