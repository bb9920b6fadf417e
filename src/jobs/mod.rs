//! Job lifecycle module
//!
//! # Components
//!
//! - `JobId`: Identifier of a job, stable across restarts
//! - `JobState`: The job state machine
//! - `JobStatus` / `SharedStatus`: Non-blocking status snapshots
//! - `JobManager`: submit, start, pause, stop, status and friends

mod job_state;
mod manager;
mod status;

pub use job_state::{JobId, JobState};
pub use manager::JobManager;
pub use status::{JobStatus, SharedStatus};
