//! Formatting helpers shared across the workspace.

pub mod formatting;

pub use formatting::{truncate_id, with_0x_prefix};
