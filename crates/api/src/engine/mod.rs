//! Job dispatch engine.
//!
//! Contains the fire-and-forget [`dispatcher::Dispatcher`] and the worker
//! clients it can call (HTTP or in-process).

pub mod dispatcher;
