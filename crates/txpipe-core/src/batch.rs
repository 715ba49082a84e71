//! Sequential batch execution.
//!
//! Runs a list of operation requests one at a time through the pipeline,
//! in input order, pausing between items so the user can answer one signing
//! prompt before the next appears. A failed or declined item never stops
//! the run.

use crate::engine::event_bus::EventBus;
use crate::engine::OperationPipeline;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;
use txpipe_types::{BatchEvent, BatchItem, BatchItemStatus, OperationRequest, PipelineEvent};

/// Recorded on items the user declined to sign.
pub const DECLINED_MESSAGE: &str = "User declined to sign the transaction";

pub struct BatchExecutor {
	pipeline: Arc<OperationPipeline>,
	event_bus: EventBus,
	item_delay: Duration,
	items: RwLock<Vec<BatchItem>>,
	/// Bumped by every run and every clear, always under the `items` write
	/// lock. Stale runs stop recording.
	generation: AtomicU64,
	/// Serializes runs so prompts never overlap.
	run_lock: Mutex<()>,
}

impl BatchExecutor {
	pub fn new(pipeline: Arc<OperationPipeline>, event_bus: EventBus, item_delay: Duration) -> Self {
		Self {
			pipeline,
			event_bus,
			item_delay,
			items: RwLock::new(Vec::new()),
			generation: AtomicU64::new(0),
			run_lock: Mutex::new(()),
		}
	}

	/// Runs every request in order and returns one resolved item per request.
	#[instrument(skip_all, fields(total = requests.len()))]
	pub async fn execute(&self, requests: Vec<OperationRequest>) -> Vec<BatchItem> {
		let _run = self.run_lock.lock().await;

		let run_id = uuid::Uuid::new_v4().to_string();
		let total = requests.len();

		let generation = {
			let mut items = self.items.write().await;
			*items = requests.iter().cloned().map(BatchItem::pending).collect();
			self.generation.fetch_add(1, Ordering::SeqCst) + 1
		};

		tracing::info!(run_id = %run_id, "Starting batch");
		self.event_bus
			.publish(PipelineEvent::Batch(BatchEvent::Started {
				run_id: run_id.clone(),
				total,
			}))
			.ok();

		let mut resolved = Vec::with_capacity(total);
		for (index, request) in requests.into_iter().enumerate() {
			let item = self.run_item(request).await;

			self.record(generation, index, &item).await;
			self.event_bus
				.publish(PipelineEvent::Batch(BatchEvent::ItemResolved {
					run_id: run_id.clone(),
					index,
					item: item.clone(),
				}))
				.ok();
			resolved.push(item);

			if index + 1 < total {
				tokio::time::sleep(self.item_delay).await;
			}
		}

		let succeeded = resolved
			.iter()
			.filter(|item| item.status == BatchItemStatus::Success)
			.count();
		let failed = total - succeeded;

		tracing::info!(run_id = %run_id, succeeded, failed, "Batch completed");
		self.event_bus
			.publish(PipelineEvent::Batch(BatchEvent::Completed {
				run_id,
				succeeded,
				failed,
			}))
			.ok();

		resolved
	}

	/// Items of the current run, including the ones still pending.
	pub async fn items(&self) -> Vec<BatchItem> {
		self.items.read().await.clone()
	}

	/// Empties the item list. A run in progress keeps going but no longer
	/// records into the list.
	pub async fn clear(&self) {
		let mut items = self.items.write().await;
		self.generation.fetch_add(1, Ordering::SeqCst);
		items.clear();
	}

	async fn run_item(&self, request: OperationRequest) -> BatchItem {
		let outcome = self.pipeline.submit(&request).await;

		let mut item = BatchItem::pending(request);
		match outcome {
			Ok(Some(txid)) => {
				item.succeed(txid);
			}
			Ok(None) => {
				item.fail(DECLINED_MESSAGE);
			}
			Err(e) => {
				item.fail(e.to_string());
			}
		}
		item
	}

	async fn record(&self, generation: u64, index: usize, item: &BatchItem) {
		let mut items = self.items.write().await;
		if self.generation.load(Ordering::SeqCst) != generation {
			return;
		}
		if let Some(slot) = items.get_mut(index) {
			*slot = item.clone();
		}
	}
}
