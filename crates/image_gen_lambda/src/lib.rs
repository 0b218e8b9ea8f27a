//! AWS-oriented adapters and handlers for image generation.
//!
//! This crate owns runtime integration details (Lambda handlers, the model
//! service and storage adapters, the chat channel client) and exposes a single
//! runtime module boundary for the contract, key and signature primitives.

pub mod adapters;
pub mod config;
pub mod edge;
pub mod error;
pub mod handlers;
pub mod runtime;
pub mod telemetry;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
