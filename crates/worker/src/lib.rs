//! Analysis worker: claims a pending job, runs its computation over the
//! uploaded artifact, records the outcome and cleans the artifact up.
//!
//! The [`processor`] is used both by the standalone worker binary (behind the
//! [`server`] trigger endpoint) and in-process by the API server.

pub mod analysis;
pub mod config;
pub mod error;
pub mod processor;
pub mod server;

pub use error::WorkerError;
pub use processor::{JobProcessor, ProcessOutcome};
