//! Shared image generation domain primitives.
//!
//! This crate owns the request/response contracts, model-service body shapes,
//! object key derivation, and chat webhook payloads. It intentionally excludes
//! AWS SDK and Lambda runtime concerns.

pub mod artifact;
pub mod contract;
pub mod messaging;
pub mod signature;
pub mod storage_keys;
