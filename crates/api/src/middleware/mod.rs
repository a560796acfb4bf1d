//! Request extractors shared by handlers.
//!
//! - [`auth::IntakeCredential`] -- the bearer secret presented by the caller.

pub mod auth;
