//! Status polling for broadcast transactions.
//!
//! Each tracked transaction gets its own background task. The task checks
//! immediately, then once per interval, and exits as soon as the status is
//! terminal. Callers observe progress through a `PollSubscription`.

use crate::engine::event_bus::EventBus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;
use txpipe_delivery::DeliveryService;
use txpipe_types::{
	truncate_id, Network, PipelineEvent, StatusEvent, StatusObservation, TrackedTransaction,
	TransactionId, TxStatus,
};

/// Starts polling tasks for broadcast transactions.
#[derive(Clone)]
pub struct StatusPoller {
	delivery: Arc<DeliveryService>,
	event_bus: EventBus,
	interval: Duration,
}

impl StatusPoller {
	pub fn new(delivery: Arc<DeliveryService>, event_bus: EventBus, interval: Duration) -> Self {
		Self {
			delivery,
			event_bus,
			interval,
		}
	}

	/// Starts tracking `txid` on `network`.
	///
	/// Must be called from within a tokio runtime. Polling ends when the
	/// returned subscription is stopped or dropped.
	pub fn poll(&self, txid: TransactionId, network: Network) -> PollSubscription {
		let span = tracing::info_span!("poll", txid = %truncate_id(txid.as_str()), network = %network);
		span.in_scope(|| tracing::info!("Tracking transaction"));

		let (state, receiver) = watch::channel(TrackedTransaction::new(txid, network));
		let tracker = Arc::new(Tracker {
			delivery: self.delivery.clone(),
			event_bus: self.event_bus.clone(),
			state,
			polling: AtomicBool::new(true),
		});

		let handle = tokio::spawn(run(tracker.clone(), self.interval).instrument(span));

		PollSubscription {
			tracker,
			state: receiver,
			handle,
		}
	}
}

async fn run(tracker: Arc<Tracker>, interval: Duration) {
	loop {
		tracker.check().await;
		if tracker.is_terminal() {
			tracker.finish();
			break;
		}
		tokio::time::sleep(interval).await;
	}
}

struct Tracker {
	delivery: Arc<DeliveryService>,
	event_bus: EventBus,
	state: watch::Sender<TrackedTransaction>,
	polling: AtomicBool,
}

impl Tracker {
	fn is_terminal(&self) -> bool {
		self.state.borrow().status.is_terminal()
	}

	/// Marks polling as ended. Publishes `Stopped` only on the first call.
	fn finish(&self) {
		if self.polling.swap(false, Ordering::SeqCst) {
			let txid = self.state.borrow().txid.clone();
			tracing::debug!(txid = %truncate_id(txid.as_str()), "Stopped polling");
			self.event_bus
				.publish(PipelineEvent::Status(StatusEvent::Stopped { txid }))
				.ok();
		}
	}

	/// Runs one status check. Does nothing once the status is terminal.
	async fn check(&self) {
		let (txid, network) = {
			let current = self.state.borrow();
			if current.status.is_terminal() {
				return;
			}
			(current.txid.clone(), current.network)
		};

		let raw = match self.delivery.get_status(&txid, network).await {
			Ok(raw) => raw,
			Err(e) => {
				tracing::debug!(error = %e, "Status check failed");
				self.state.send_if_modified(|tracked| {
					let before = tracked.error.clone();
					tracked.record_error(e.to_string());
					tracked.error != before
				});
				return;
			}
		};

		let status = TxStatus::from_raw(&raw.tx_status);
		let network_height = match raw.block_height {
			Some(_) => match self.delivery.get_block_height(network).await {
				Ok(height) => Some(height),
				Err(e) => {
					tracing::debug!(error = %e, "Failed to read chain height");
					None
				}
			},
			None => None,
		};

		let observation = StatusObservation {
			status,
			block_height: raw.block_height,
			network_height,
		};

		let mut updated = None;
		self.state.send_if_modified(|tracked| {
			let changed = tracked.apply(observation);
			if changed {
				updated = Some(tracked.clone());
			}
			changed
		});

		if let Some(tracked) = updated {
			match tracked.status {
				TxStatus::Confirmed => tracing::info!(
					block_height = ?tracked.block_height,
					confirmations = tracked.confirmations,
					"Confirmed"
				),
				TxStatus::Failed => tracing::warn!(raw_status = %raw.tx_status, "Transaction failed"),
				_ => tracing::debug!(status = ?tracked.status, "Status changed"),
			}
			self.event_bus
				.publish(PipelineEvent::Status(StatusEvent::Changed { tracked }))
				.ok();
		}
	}
}

/// Handle on a polled transaction.
///
/// Dropping the subscription stops polling.
pub struct PollSubscription {
	tracker: Arc<Tracker>,
	state: watch::Receiver<TrackedTransaction>,
	handle: JoinHandle<()>,
}

impl PollSubscription {
	/// Current tracked state.
	pub fn snapshot(&self) -> TrackedTransaction {
		self.state.borrow().clone()
	}

	/// True until the status is terminal or polling was stopped.
	pub fn is_polling(&self) -> bool {
		self.tracker.polling.load(Ordering::SeqCst)
	}

	/// Stops future checks. Calling it again has no effect.
	pub fn stop_polling(&self) {
		self.handle.abort();
		self.tracker.finish();
	}

	/// Runs one check right away and returns the resulting state.
	///
	/// Works after polling was stopped; does nothing once terminal.
	pub async fn refresh(&self) -> TrackedTransaction {
		self.tracker.check().await;
		self.snapshot()
	}

	/// Waits for the next state change.
	pub async fn changed(&mut self) -> Option<TrackedTransaction> {
		self.state.changed().await.ok()?;
		Some(self.state.borrow_and_update().clone())
	}

	/// Waits until the status is terminal or polling has ended.
	pub async fn settled(&mut self) -> TrackedTransaction {
		loop {
			let current = self.state.borrow_and_update().clone();
			if current.status.is_terminal() || !self.is_polling() {
				return current;
			}
			if self.state.changed().await.is_err() {
				return self.snapshot();
			}
		}
	}
}

impl Drop for PollSubscription {
	fn drop(&mut self) {
		self.stop_polling();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use std::collections::HashMap;
	use std::sync::atomic::AtomicUsize;
	use txpipe_delivery::{DeliveryError, DeliveryInterface};
	use txpipe_types::{ConfigSchema, RawTransactionStatus, SignedPayload};

	mockall::mock! {
		pub Provider {}

		#[async_trait]
		impl DeliveryInterface for Provider {
			fn config_schema(&self) -> Box<dyn ConfigSchema>;
			async fn broadcast(&self, payload: &SignedPayload) -> Result<TransactionId, DeliveryError>;
			async fn get_transaction_status(&self, txid: &TransactionId) -> Result<RawTransactionStatus, DeliveryError>;
			async fn get_block_height(&self) -> Result<u64, DeliveryError>;
		}
	}

	fn raw(status: &str, block_height: Option<u64>) -> RawTransactionStatus {
		RawTransactionStatus {
			tx_status: status.to_string(),
			block_height,
			burn_block_height: None,
		}
	}

	fn poller(provider: MockProvider, event_bus: EventBus) -> StatusPoller {
		let mut providers: HashMap<Network, Box<dyn DeliveryInterface>> = HashMap::new();
		providers.insert(Network::Testnet, Box::new(provider));
		StatusPoller::new(
			Arc::new(DeliveryService::new(providers)),
			event_bus,
			Duration::from_secs(10),
		)
	}

	#[tokio::test(start_paused = true)]
	async fn test_polls_until_confirmed() {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = calls.clone();

		let mut provider = MockProvider::new();
		provider.expect_get_transaction_status().returning(move |_| {
			match counter.fetch_add(1, Ordering::SeqCst) {
				0 | 1 => Ok(raw("pending", None)),
				_ => Ok(raw("success", Some(100))),
			}
		});
		provider.expect_get_block_height().returning(|| Ok(105));

		let poller = poller(provider, EventBus::default());
		let mut subscription = poller.poll(TransactionId::new("0xabc"), Network::Testnet);

		let settled = subscription.settled().await;
		assert_eq!(settled.status, TxStatus::Confirmed);
		assert_eq!(settled.block_height, Some(100));
		assert_eq!(settled.confirmations, 5);
		assert_eq!(calls.load(Ordering::SeqCst), 3);
		assert!(!subscription.is_polling());

		// No further checks after the terminal status.
		tokio::time::sleep(Duration::from_secs(60)).await;
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test(start_paused = true)]
	async fn test_failure_is_frozen() {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = calls.clone();

		let mut provider = MockProvider::new();
		provider.expect_get_transaction_status().returning(move |_| {
			match counter.fetch_add(1, Ordering::SeqCst) {
				0 => Ok(raw("pending", None)),
				1 => Ok(raw("abort_by_response", None)),
				_ => Ok(raw("success", Some(1))),
			}
		});
		provider.expect_get_block_height().returning(|| Ok(10));

		let poller = poller(provider, EventBus::default());
		let mut subscription = poller.poll(TransactionId::new("0xdead"), Network::Testnet);

		let settled = subscription.settled().await;
		assert_eq!(settled.status, TxStatus::Failed);

		let refreshed = subscription.refresh().await;
		assert_eq!(refreshed.status, TxStatus::Failed);
		assert_eq!(calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn test_stop_polling_is_idempotent() {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = calls.clone();

		let mut provider = MockProvider::new();
		provider.expect_get_transaction_status().returning(move |_| {
			counter.fetch_add(1, Ordering::SeqCst);
			Ok(raw("pending", None))
		});

		let event_bus = EventBus::default();
		let mut events = event_bus.subscribe();
		let poller = poller(provider, event_bus);
		let mut subscription = poller.poll(TransactionId::new("0x01"), Network::Testnet);

		let first = subscription.changed().await.unwrap();
		assert_eq!(first.status, TxStatus::Pending);

		subscription.stop_polling();
		subscription.stop_polling();
		assert!(!subscription.is_polling());

		let checks = calls.load(Ordering::SeqCst);
		tokio::time::sleep(Duration::from_secs(120)).await;
		assert_eq!(calls.load(Ordering::SeqCst), checks);
		assert_eq!(subscription.snapshot().status, TxStatus::Pending);

		let mut stopped = 0;
		while let Ok(event) = events.try_recv() {
			if matches!(event, PipelineEvent::Status(StatusEvent::Stopped { .. })) {
				stopped += 1;
			}
		}
		assert_eq!(stopped, 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_lookup_errors_are_recorded() {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = calls.clone();

		let mut provider = MockProvider::new();
		provider.expect_get_transaction_status().returning(move |_| {
			match counter.fetch_add(1, Ordering::SeqCst) {
				0 => Err(DeliveryError::Network("connection reset".to_string())),
				_ => Ok(raw("pending", None)),
			}
		});

		let poller = poller(provider, EventBus::default());
		let mut subscription = poller.poll(TransactionId::new("0x02"), Network::Testnet);

		let errored = subscription.changed().await.unwrap();
		assert_eq!(errored.status, TxStatus::Unknown);
		assert!(errored.error.unwrap().contains("connection reset"));

		let recovered = subscription.changed().await.unwrap();
		assert_eq!(recovered.status, TxStatus::Pending);
		assert!(recovered.error.is_none());
	}
}
