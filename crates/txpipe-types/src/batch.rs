//! Batch item types.
//!
//! A batch item wraps one operation request for the duration of a batch run
//! and records how that request was resolved.

use crate::{OperationRequest, TransactionId};
use serde::{Deserialize, Serialize};

/// Resolution state of a batch item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchItemStatus {
	Pending,
	Success,
	Failed,
}

/// One request inside a batch run, with its outcome once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
	pub request: OperationRequest,
	pub status: BatchItemStatus,
	pub txid: Option<TransactionId>,
	pub error: Option<String>,
}

impl BatchItem {
	pub fn pending(request: OperationRequest) -> Self {
		Self {
			request,
			status: BatchItemStatus::Pending,
			txid: None,
			error: None,
		}
	}

	/// Resolves the item as successful. Resolved items are left untouched.
	pub fn succeed(&mut self, txid: TransactionId) -> bool {
		if self.status != BatchItemStatus::Pending {
			return false;
		}
		self.status = BatchItemStatus::Success;
		self.txid = Some(txid);
		true
	}

	/// Resolves the item as failed. Resolved items are left untouched.
	pub fn fail(&mut self, error: impl Into<String>) -> bool {
		if self.status != BatchItemStatus::Pending {
			return false;
		}
		self.status = BatchItemStatus::Failed;
		self.error = Some(error.into());
		true
	}

	pub fn is_resolved(&self) -> bool {
		self.status != BatchItemStatus::Pending
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Network;

	fn item() -> BatchItem {
		BatchItem::pending(OperationRequest::contract_call(
			Network::Testnet,
			"ST000000000000000000002AMW42H",
			"token",
			"mint",
			vec![],
		))
	}

	#[test]
	fn test_resolves_once() {
		let mut item = item();
		assert!(!item.is_resolved());
		assert!(item.fail("broadcast rejected"));
		assert!(!item.succeed(TransactionId::new("0xabc")));
		assert_eq!(item.status, BatchItemStatus::Failed);
		assert_eq!(item.txid, None);
		assert_eq!(item.error.as_deref(), Some("broadcast rejected"));
	}

	#[test]
	fn test_success_records_txid() {
		let mut item = item();
		assert!(item.succeed(TransactionId::new("0xabc")));
		assert!(!item.fail("late failure"));
		assert_eq!(item.status, BatchItemStatus::Success);
		assert_eq!(item.txid, Some(TransactionId::new("0xabc")));
		assert_eq!(item.error, None);
	}
}
