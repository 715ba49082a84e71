//! Transaction types for the txpipe pipeline.
//!
//! Covers every shape a transaction takes on its way to the network: the
//! unsigned descriptor produced by the builder, the opaque signed payload
//! returned by the signing delegate, the identifier returned by the network
//! and the tracking state maintained while polling for finality.

use crate::{ClarityVersion, ContractArg, Network, PostConditionMode};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;

/// Block anchoring preference for the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorMode {
	OnChainOnly,
	OffChainOnly,
	#[default]
	Any,
}

/// Payload carried by an unsigned transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionPayload {
	ContractCall {
		contract_address: String,
		contract_name: String,
		function_name: String,
		function_args: Vec<ContractArg>,
	},
	SmartContract {
		contract_name: String,
		code_body: String,
		clarity_version: ClarityVersion,
	},
}

/// Unsigned transaction descriptor ready to be handed to a signing delegate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedDescriptor {
	pub payload: TransactionPayload,
	pub network: Network,
	/// Fee in base network units.
	pub fee: u64,
	pub anchor_mode: AnchorMode,
	pub post_condition_mode: PostConditionMode,
}

impl UnsignedDescriptor {
	/// Deterministic Keccak-256 digest of the descriptor, hex encoded.
	///
	/// Equal descriptors always yield equal fingerprints.
	pub fn fingerprint(&self) -> String {
		// Struct and enum fields serialize in declaration order. Every field is
		// plain data with string keys, so serialization has no failure path.
		let canonical =
			serde_json::to_vec(self).expect("unsigned descriptor always serializes to JSON");
		hex::encode(Keccak256::digest(&canonical))
	}
}

/// Opaque signed transaction bytes produced by a signing delegate.
///
/// Only delegates construct these, from exactly one descriptor.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedPayload {
	bytes: Vec<u8>,
	network: Network,
}

impl SignedPayload {
	/// Wraps the bytes returned by a signing delegate.
	pub fn from_delegate(bytes: Vec<u8>, network: Network) -> Self {
		Self { bytes, network }
	}

	pub fn as_bytes(&self) -> &[u8] {
		&self.bytes
	}

	pub fn network(&self) -> Network {
		self.network
	}

	pub fn len(&self) -> usize {
		self.bytes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.bytes.is_empty()
	}
}

impl fmt::Debug for SignedPayload {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SignedPayload")
			.field("network", &self.network)
			.field("len", &self.bytes.len())
			.finish()
	}
}

/// Network transaction identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
	/// Normalizes the identifier to a `0x`-prefixed lowercase form.
	pub fn new(id: impl AsRef<str>) -> Self {
		Self(crate::with_0x_prefix(id.as_ref()).to_lowercase())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for TransactionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Status record as returned by the network status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawTransactionStatus {
	pub tx_status: String,
	#[serde(default)]
	pub block_height: Option<u64>,
	#[serde(default)]
	pub burn_block_height: Option<u64>,
}

/// Lifecycle state of a tracked transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TxStatus {
	#[default]
	Unknown,
	Pending,
	Confirmed,
	Failed,
}

impl TxStatus {
	/// Maps a raw network status string onto the lifecycle states.
	pub fn from_raw(raw: &str) -> Self {
		match raw {
			"success" => TxStatus::Confirmed,
			"pending" | "submitted" => TxStatus::Pending,
			s if s.starts_with("abort") => TxStatus::Failed,
			_ => TxStatus::Unknown,
		}
	}

	pub fn is_terminal(&self) -> bool {
		matches!(self, TxStatus::Confirmed | TxStatus::Failed)
	}
}

/// One observation made by the status poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusObservation {
	pub status: TxStatus,
	pub block_height: Option<u64>,
	/// Current network tip height, when it could be fetched.
	pub network_height: Option<u64>,
}

/// Confirmation state of one transaction being polled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedTransaction {
	pub txid: TransactionId,
	pub network: Network,
	pub status: TxStatus,
	pub block_height: Option<u64>,
	pub confirmations: u64,
	/// Last error raised while checking, cleared on the next good check.
	pub error: Option<String>,
}

impl TrackedTransaction {
	pub fn new(txid: TransactionId, network: Network) -> Self {
		Self {
			txid,
			network,
			status: TxStatus::Unknown,
			block_height: None,
			confirmations: 0,
			error: None,
		}
	}

	/// Applies an observation, returning true if anything changed.
	///
	/// Terminal states are frozen. An `Unknown` observation never moves a
	/// pending transaction back to `Unknown`.
	pub fn apply(&mut self, observation: StatusObservation) -> bool {
		if self.status.is_terminal() {
			return false;
		}

		let before = self.clone();

		let regresses =
			observation.status == TxStatus::Unknown && self.status == TxStatus::Pending;
		if !regresses {
			self.status = observation.status;
		}

		if observation.block_height.is_some() {
			self.block_height = observation.block_height;
		}

		if let (Some(tip), Some(height)) = (observation.network_height, self.block_height) {
			// The tip query can lag behind the block the transaction landed in.
			self.confirmations = tip.saturating_sub(height);
		}

		self.error = None;
		*self != before
	}

	/// Records a failed check without touching the lifecycle state.
	pub fn record_error(&mut self, error: impl Into<String>) {
		if !self.status.is_terminal() {
			self.error = Some(error.into());
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn call_descriptor(fee: u64) -> UnsignedDescriptor {
		UnsignedDescriptor {
			payload: TransactionPayload::ContractCall {
				contract_address: "ST000000000000000000002AMW42H".to_string(),
				contract_name: "token".to_string(),
				function_name: "mint".to_string(),
				function_args: vec![ContractArg::UInt(1000)],
			},
			network: Network::Testnet,
			fee,
			anchor_mode: AnchorMode::Any,
			post_condition_mode: PostConditionMode::Allow,
		}
	}

	fn observed(status: TxStatus, block_height: Option<u64>, tip: Option<u64>) -> StatusObservation {
		StatusObservation {
			status,
			block_height,
			network_height: tip,
		}
	}

	#[test]
	fn test_fingerprint_is_deterministic() {
		assert_eq!(
			call_descriptor(150000).fingerprint(),
			call_descriptor(150000).fingerprint()
		);
		assert_ne!(
			call_descriptor(150000).fingerprint(),
			call_descriptor(150001).fingerprint()
		);
		assert_eq!(call_descriptor(1).fingerprint().len(), 64);
	}

	#[test]
	fn test_fingerprint_covers_wide_arguments() {
		let with_args = |args: Vec<ContractArg>| {
			let mut descriptor = call_descriptor(150000);
			if let TransactionPayload::ContractCall { function_args, .. } = &mut descriptor.payload {
				*function_args = args;
			}
			descriptor.fingerprint()
		};

		let max = with_args(vec![ContractArg::UInt(u128::MAX)]);
		let below = with_args(vec![ContractArg::UInt(u128::MAX - 1)]);
		let negative = with_args(vec![ContractArg::Int(i128::MIN)]);
		let buffer = with_args(vec![ContractArg::Buffer(vec![0xde, 0xad])]);
		let empty = with_args(vec![]);

		assert_ne!(max, below);
		assert_ne!(negative, buffer);
		assert_ne!(buffer, empty);
		assert_eq!(max, with_args(vec![ContractArg::UInt(u128::MAX)]));
	}

	#[test]
	fn test_status_mapping() {
		assert_eq!(TxStatus::from_raw("success"), TxStatus::Confirmed);
		assert_eq!(TxStatus::from_raw("pending"), TxStatus::Pending);
		assert_eq!(TxStatus::from_raw("submitted"), TxStatus::Pending);
		assert_eq!(TxStatus::from_raw("abort_by_response"), TxStatus::Failed);
		assert_eq!(
			TxStatus::from_raw("abort_by_post_condition"),
			TxStatus::Failed
		);
		assert_eq!(
			TxStatus::from_raw("dropped_replace_by_fee"),
			TxStatus::Unknown
		);
		assert_eq!(TxStatus::from_raw(""), TxStatus::Unknown);
	}

	#[test]
	fn test_terminal_state_is_frozen() {
		let mut tracked = TrackedTransaction::new(TransactionId::new("abc"), Network::Testnet);
		assert!(tracked.apply(observed(TxStatus::Pending, None, None)));
		assert!(tracked.apply(observed(TxStatus::Confirmed, Some(100), Some(103))));
		assert_eq!(tracked.confirmations, 3);

		assert!(!tracked.apply(observed(TxStatus::Failed, Some(100), Some(110))));
		assert_eq!(tracked.status, TxStatus::Confirmed);
		assert_eq!(tracked.confirmations, 3);

		tracked.record_error("boom");
		assert_eq!(tracked.error, None);
	}

	#[test]
	fn test_unknown_does_not_regress_pending() {
		let mut tracked = TrackedTransaction::new(TransactionId::new("abc"), Network::Testnet);
		tracked.apply(observed(TxStatus::Pending, None, None));
		tracked.apply(observed(TxStatus::Unknown, None, None));
		assert_eq!(tracked.status, TxStatus::Pending);
	}

	#[test]
	fn test_confirmation_depth_clamped() {
		let mut tracked = TrackedTransaction::new(TransactionId::new("abc"), Network::Testnet);
		tracked.apply(observed(TxStatus::Pending, Some(120), Some(118)));
		assert_eq!(tracked.confirmations, 0);
	}

	#[test]
	fn test_error_cleared_by_next_check() {
		let mut tracked = TrackedTransaction::new(TransactionId::new("abc"), Network::Testnet);
		tracked.record_error("timeout");
		assert_eq!(tracked.error.as_deref(), Some("timeout"));
		tracked.apply(observed(TxStatus::Pending, None, None));
		assert_eq!(tracked.error, None);
	}

	#[test]
	fn test_transaction_id_normalized() {
		assert_eq!(TransactionId::new("ABC").as_str(), "0xabc");
		assert_eq!(TransactionId::new("0xabc").as_str(), "0xabc");
	}
}
