//! Common types for the txpipe transaction pipeline.
//!
//! This crate defines the data model shared by every pipeline component:
//! operation requests, unsigned descriptors, signed payloads, tracked
//! transactions and batch items, plus the configuration validation
//! framework used by pluggable implementations.

/// Batch item types recorded by the batch orchestrator.
pub mod batch;
/// Event types published while operations move through the pipeline.
pub mod events;
/// Network selector and address prefix rules.
pub mod network;
/// Caller-supplied operation requests and contract argument values.
pub mod request;
/// Implementation registry trait for pluggable components.
pub mod registry;
/// Transaction descriptors, signed payloads and tracking state.
pub mod transaction;
/// Formatting helpers for identifiers and amounts.
pub mod utils;
/// Configuration validation types for implementation-specific tables.
pub mod validation;

pub use batch::*;
pub use events::*;
pub use network::*;
pub use registry::*;
pub use request::*;
pub use transaction::*;
pub use utils::{truncate_id, with_0x_prefix};
pub use validation::*;
