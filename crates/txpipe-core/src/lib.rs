//! Core transaction pipeline.
//!
//! Ties the builder, signing delegate, broadcaster, status poller and batch
//! orchestrator together. Requests flow one way: build an unsigned
//! descriptor, have the user sign it, broadcast the signed bytes and poll the
//! network until the transaction settles. Every step publishes events on a
//! shared `EventBus`.

pub mod batch;
pub mod builder;
pub mod engine;
pub mod monitoring;
pub mod transaction;

pub use batch::{BatchExecutor, DECLINED_MESSAGE};
pub use builder::{BuilderError, Pipeline, PipelineBuilder, PipelineFactories};
pub use engine::event_bus::EventBus;
pub use engine::{ErrorCode, OperationError, OperationPipeline};
pub use monitoring::{PollSubscription, StatusPoller};
pub use transaction::{BuildError, TransactionBuilder};
