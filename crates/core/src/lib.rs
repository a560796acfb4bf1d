//! Domain rules for the analysis job platform.
//!
//! This crate has no internal dependencies so the API server, the worker and
//! the storage layer can all share the same job state machine, naming rules
//! and intake limits.

pub mod artifact;
pub mod dispatch_policy;
pub mod error;
pub mod intake;
pub mod job_status;
pub mod job_type;
pub mod signing;
pub mod types;
