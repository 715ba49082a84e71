//! Finality tracking for broadcast transactions.
//!
//! A poller checks each tracked transaction on a fixed interval until it
//! reaches a terminal status or the caller stops polling.

pub mod transaction;

pub use transaction::{PollSubscription, StatusPoller};
