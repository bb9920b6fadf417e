/// Outcome tags recorded in the visited set
///
/// Every URL that leaves the frontier ends up with exactly one of these.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Final outcome of processing one page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageOutcome {
    /// Extracted and written
    Success,

    /// Fetch, extraction or write failed
    Failed,

    /// Extracted, but below the quality threshold; not written
    Skipped,
}

impl PageOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Converts the outcome to its storage string
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    /// Parses an outcome from its storage string
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }
}

impl fmt::Display for PageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
