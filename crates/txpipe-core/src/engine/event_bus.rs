//! Event bus for pipeline notifications.
//!
//! A thin wrapper over a tokio broadcast channel. Publishing never blocks;
//! publishing with no subscribers returns an error that callers ignore.

use tokio::sync::broadcast;
use txpipe_types::PipelineEvent;

/// Default number of events buffered per subscriber.
pub const DEFAULT_CAPACITY: usize = 1000;

#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Subscribes to every event published from now on.
	pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event to all current subscribers.
	pub fn publish(
		&self,
		event: PipelineEvent,
	) -> Result<usize, broadcast::error::SendError<PipelineEvent>> {
		self.sender.send(event)
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(DEFAULT_CAPACITY)
	}
}
