//! Analysis API server library.
//!
//! Exposes the building blocks (config, state, intake gateway, dispatcher,
//! routes, background sweep) so integration tests and the binary entrypoint
//! can both access them.

pub mod background;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod intake;
pub mod middleware;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
