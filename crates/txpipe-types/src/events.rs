//! Event types published while operations move through the pipeline.
//!
//! Events flow through the event bus so that consumers (the CLI, loggers,
//! progress displays) can follow operations without sharing mutable state
//! with the components that perform them.

use crate::{BatchItem, Network, TrackedTransaction, TransactionId};
use serde::{Deserialize, Serialize};

/// Main event type encompassing all pipeline events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
	/// Events from the single-operation path.
	Operation(OperationEvent),
	/// Events from the status poller.
	Status(StatusEvent),
	/// Events from the batch orchestrator.
	Batch(BatchEvent),
}

/// Events related to a single build/sign/broadcast operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OperationEvent {
	/// A descriptor was built and handed to the signing delegate.
	SigningRequested {
		contract_id: String,
		kind: String,
		fingerprint: String,
	},
	/// The user declined to sign.
	Declined { contract_id: String },
	/// The network accepted the transaction.
	Broadcast {
		contract_id: String,
		txid: TransactionId,
		network: Network,
	},
	/// The operation ended with an error.
	Failed {
		contract_id: String,
		code: String,
		message: String,
	},
}

/// Events related to finality polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StatusEvent {
	/// The tracked state of a transaction changed.
	Changed { tracked: TrackedTransaction },
	/// Polling for a transaction stopped.
	Stopped { txid: TransactionId },
}

/// Events related to batch runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BatchEvent {
	/// A batch run started with `total` items.
	Started { run_id: String, total: usize },
	/// One item was resolved.
	ItemResolved {
		run_id: String,
		index: usize,
		item: BatchItem,
	},
	/// Every item has been attempted.
	Completed {
		run_id: String,
		succeeded: usize,
		failed: usize,
	},
}
