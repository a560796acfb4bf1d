//! Status types for the `job_statuses` lookup table.
//!
//! The enum itself lives in `analysis_core::job_status` so the transition
//! rules are shared with code that never touches the database.

pub use analysis_core::job_status::{JobStatus, StatusId};
