//! Operation pipeline that drives a request through build, sign and broadcast.
//!
//! Every operation runs the same linear flow: check that an identity is
//! connected, build the unsigned descriptor, hand it to the signing delegate
//! and broadcast the signed bytes. A user decline ends the flow with no
//! transaction id and no error; every other failure ends it with a single
//! classified `OperationError`.

pub mod event_bus;

use crate::monitoring::{PollSubscription, StatusPoller};
use crate::transaction::TransactionBuilder;
use event_bus::EventBus;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::instrument;
use txpipe_delivery::{DeliveryError, DeliveryService};
use txpipe_types::{
	truncate_id, Network, OperationEvent, OperationKind, OperationRequest, PipelineEvent,
	TransactionId,
};
use txpipe_wallet::{SigningOutcome, WalletError, WalletService};

/// Classification of a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
	/// No identity is connected to the signing delegate.
	NotConnected,
	/// The request failed validation before anything was signed.
	InvalidRequest,
	/// The delegate failed for a reason other than a user decline.
	SigningFailed,
	/// The network refused the transaction or could not be reached.
	BroadcastError,
	/// Any other failure while running a contract call.
	ContractCallError,
	/// Any other failure while running a deployment.
	DeploymentError,
}

impl ErrorCode {
	/// Wire form of the code.
	pub fn as_str(&self) -> &'static str {
		match self {
			ErrorCode::NotConnected => "NOT_CONNECTED",
			ErrorCode::InvalidRequest => "InvalidRequest",
			ErrorCode::SigningFailed => "SigningFailed",
			ErrorCode::BroadcastError => "BroadcastError",
			ErrorCode::ContractCallError => "CONTRACT_CALL_ERROR",
			ErrorCode::DeploymentError => "DEPLOYMENT_ERROR",
		}
	}

	/// Catch-all code for an operation kind.
	fn generic_for(kind: &OperationKind) -> Self {
		match kind {
			OperationKind::ContractCall { .. } => ErrorCode::ContractCallError,
			OperationKind::Deploy { .. } => ErrorCode::DeploymentError,
		}
	}
}

impl fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A failed operation: a code plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct OperationError {
	pub code: ErrorCode,
	pub message: String,
}

impl OperationError {
	pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
		Self {
			code,
			message: message.into(),
		}
	}
}

fn wallet_error(error: WalletError) -> OperationError {
	match error {
		WalletError::NotConnected => OperationError::new(ErrorCode::NotConnected, error.to_string()),
		other => OperationError::new(ErrorCode::SigningFailed, other.to_string()),
	}
}

/// Clears the in-flight marker when an operation finishes or is dropped.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl<'a> InFlightGuard<'a> {
	fn enter(counter: &'a AtomicUsize) -> Self {
		counter.fetch_add(1, Ordering::SeqCst);
		Self(counter)
	}
}

impl Drop for InFlightGuard<'_> {
	fn drop(&mut self) {
		self.0.fetch_sub(1, Ordering::SeqCst);
	}
}

/// Runs operation requests through build, sign and broadcast.
pub struct OperationPipeline {
	builder: TransactionBuilder,
	wallet: Arc<WalletService>,
	delivery: Arc<DeliveryService>,
	poller: StatusPoller,
	event_bus: EventBus,
	in_flight: AtomicUsize,
	last_error: RwLock<Option<OperationError>>,
}

impl OperationPipeline {
	pub fn new(
		builder: TransactionBuilder,
		wallet: Arc<WalletService>,
		delivery: Arc<DeliveryService>,
		poller: StatusPoller,
		event_bus: EventBus,
	) -> Self {
		Self {
			builder,
			wallet,
			delivery,
			poller,
			event_bus,
			in_flight: AtomicUsize::new(0),
			last_error: RwLock::new(None),
		}
	}

	/// Calls a public function of a deployed contract.
	///
	/// Returns `Ok(None)` when the user declined to sign.
	pub async fn call_contract(
		&self,
		request: &OperationRequest,
	) -> Result<Option<TransactionId>, OperationError> {
		if !matches!(request.operation(), OperationKind::ContractCall { .. }) {
			return self
				.reject(
					request,
					OperationError::new(
						ErrorCode::InvalidRequest,
						"Expected a contract call request",
					),
				)
				.await;
		}
		self.submit(request).await
	}

	/// Deploys a new contract.
	///
	/// Returns `Ok(None)` when the user declined to sign.
	pub async fn deploy_contract(
		&self,
		request: &OperationRequest,
	) -> Result<Option<TransactionId>, OperationError> {
		if !matches!(request.operation(), OperationKind::Deploy { .. }) {
			return self
				.reject(
					request,
					OperationError::new(ErrorCode::InvalidRequest, "Expected a deployment request"),
				)
				.await;
		}
		self.submit(request).await
	}

	/// Runs a request of either kind.
	#[instrument(skip_all, fields(contract = %request.contract_id(), kind = request.operation().label()))]
	pub async fn submit(
		&self,
		request: &OperationRequest,
	) -> Result<Option<TransactionId>, OperationError> {
		let _in_flight = InFlightGuard::enter(&self.in_flight);
		*self.last_error.write().await = None;

		match self.execute(request).await {
			Ok(Some(txid)) => {
				self.event_bus
					.publish(PipelineEvent::Operation(OperationEvent::Broadcast {
						contract_id: request.contract_id(),
						txid: txid.clone(),
						network: request.network(),
					}))
					.ok();
				Ok(Some(txid))
			}
			Ok(None) => {
				tracing::info!("User declined to sign");
				self.event_bus
					.publish(PipelineEvent::Operation(OperationEvent::Declined {
						contract_id: request.contract_id(),
					}))
					.ok();
				Ok(None)
			}
			Err(error) => self.reject(request, error).await,
		}
	}

	/// Starts finality polling for a broadcast transaction.
	pub fn track(&self, txid: TransactionId, network: Network) -> PollSubscription {
		self.poller.poll(txid, network)
	}

	/// True while at least one operation is between start and outcome.
	pub fn is_in_progress(&self) -> bool {
		self.in_flight.load(Ordering::SeqCst) > 0
	}

	/// Error of the most recent operation, cleared when a new one starts.
	pub async fn last_error(&self) -> Option<OperationError> {
		self.last_error.read().await.clone()
	}

	async fn execute(
		&self,
		request: &OperationRequest,
	) -> Result<Option<TransactionId>, OperationError> {
		let address = self
			.wallet
			.connected_address()
			.await
			.map_err(wallet_error)?;
		if address.is_none() {
			return Err(OperationError::new(
				ErrorCode::NotConnected,
				"No wallet identity is connected",
			));
		}

		let descriptor = self
			.builder
			.build(request)
			.map_err(|e| OperationError::new(ErrorCode::InvalidRequest, e.to_string()))?;

		let fingerprint = descriptor.fingerprint();
		tracing::debug!(fingerprint = %truncate_id(&fingerprint), fee = descriptor.fee, "Requesting signature");
		self.event_bus
			.publish(PipelineEvent::Operation(OperationEvent::SigningRequested {
				contract_id: request.contract_id(),
				kind: request.operation().label().to_string(),
				fingerprint,
			}))
			.ok();

		let payload = match self.wallet.sign(&descriptor).await {
			Ok(SigningOutcome::Signed(payload)) => payload,
			Ok(SigningOutcome::Declined) => return Ok(None),
			Err(e) => return Err(wallet_error(e)),
		};

		let txid = self
			.delivery
			.broadcast(&payload)
			.await
			.map_err(|e| match e {
				DeliveryError::Rejected { .. } | DeliveryError::Network(_) => {
					OperationError::new(ErrorCode::BroadcastError, e.to_string())
				}
				other => OperationError::new(
					ErrorCode::generic_for(request.operation()),
					other.to_string(),
				),
			})?;

		Ok(Some(txid))
	}

	async fn reject(
		&self,
		request: &OperationRequest,
		error: OperationError,
	) -> Result<Option<TransactionId>, OperationError> {
		tracing::warn!(code = %error.code, error = %error.message, "Operation failed");
		*self.last_error.write().await = Some(error.clone());
		self.event_bus
			.publish(PipelineEvent::Operation(OperationEvent::Failed {
				contract_id: request.contract_id(),
				code: error.code.to_string(),
				message: error.message.clone(),
			}))
			.ok();
		Err(error)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use std::collections::HashMap;
	use std::time::Duration;
	use txpipe_delivery::DeliveryInterface;
	use txpipe_types::{ConfigSchema, RawTransactionStatus, SignedPayload};
	use txpipe_wallet::implementations::mock::{MockBehavior, MockWallet};

	const ADDRESS: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM";

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

	fn pipeline(behavior: MockBehavior, provider: MockProvider) -> OperationPipeline {
		let wallet = Arc::new(WalletService::new(Box::new(MockWallet::new(
			Some(ADDRESS.to_string()),
			behavior,
		))));
		let mut providers: HashMap<Network, Box<dyn DeliveryInterface>> = HashMap::new();
		providers.insert(Network::Testnet, Box::new(provider));
		let delivery = Arc::new(DeliveryService::new(providers));
		let event_bus = EventBus::default();
		let poller = StatusPoller::new(delivery.clone(), event_bus.clone(), Duration::from_secs(10));
		OperationPipeline::new(
			TransactionBuilder::new(2000),
			wallet,
			delivery,
			poller,
			event_bus,
		)
	}

	fn call_request() -> OperationRequest {
		OperationRequest::contract_call(Network::Testnet, ADDRESS, "token", "mint", vec![])
	}

	#[tokio::test]
	async fn test_broadcast_success() {
		let mut provider = MockProvider::new();
		provider
			.expect_broadcast()
			.times(1)
			.returning(|_| Ok(TransactionId::new("0xabc123")));

		let pipeline = pipeline(MockBehavior::Approve, provider);
		let txid = pipeline.call_contract(&call_request()).await.unwrap();

		assert_eq!(txid, Some(TransactionId::new("0xabc123")));
		assert!(pipeline.last_error().await.is_none());
		assert!(!pipeline.is_in_progress());
	}

	#[tokio::test]
	async fn test_decline_is_not_an_error() {
		let mut provider = MockProvider::new();
		provider.expect_broadcast().times(0);

		let pipeline = pipeline(MockBehavior::Decline, provider);
		let txid = pipeline.call_contract(&call_request()).await.unwrap();

		assert_eq!(txid, None);
		assert!(pipeline.last_error().await.is_none());
	}

	#[tokio::test]
	async fn test_signing_failure() {
		let mut provider = MockProvider::new();
		provider.expect_broadcast().times(0);

		let pipeline = pipeline(MockBehavior::Fail, provider);
		let err = pipeline.call_contract(&call_request()).await.unwrap_err();

		assert_eq!(err.code, ErrorCode::SigningFailed);
		assert_eq!(pipeline.last_error().await, Some(err));
	}

	#[tokio::test]
	async fn test_rejection_reason_is_verbatim() {
		let mut provider = MockProvider::new();
		provider.expect_broadcast().times(1).returning(|_| {
			Err(DeliveryError::Rejected {
				error: "ConflictingNonceInMempool".to_string(),
				reason: None,
			})
		});

		let pipeline = pipeline(MockBehavior::Approve, provider);
		let err = pipeline.call_contract(&call_request()).await.unwrap_err();

		assert_eq!(err.code, ErrorCode::BroadcastError);
		assert_eq!(err.message, "ConflictingNonceInMempool");
	}

	#[tokio::test]
	async fn test_missing_provider_uses_kind_code() {
		let wallet = Arc::new(WalletService::new(Box::new(MockWallet::new(
			Some("SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7".to_string()),
			MockBehavior::Approve,
		))));
		let delivery = Arc::new(DeliveryService::new(HashMap::new()));
		let event_bus = EventBus::default();
		let poller = StatusPoller::new(delivery.clone(), event_bus.clone(), Duration::from_secs(10));
		let pipeline = OperationPipeline::new(
			TransactionBuilder::new(2000),
			wallet,
			delivery,
			poller,
			event_bus,
		);

		let request = OperationRequest::deploy(
			Network::Mainnet,
			"SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7",
			"counter",
			"(define-data-var count uint u0)",
		);
		let err = pipeline.deploy_contract(&request).await.unwrap_err();
		assert_eq!(err.code, ErrorCode::DeploymentError);
	}

	#[tokio::test]
	async fn test_wrong_kind_rejected() {
		let mut provider = MockProvider::new();
		provider.expect_broadcast().times(0);

		let pipeline = pipeline(MockBehavior::Approve, provider);
		let err = pipeline.deploy_contract(&call_request()).await.unwrap_err();
		assert_eq!(err.code, ErrorCode::InvalidRequest);
	}

	#[tokio::test]
	async fn test_last_error_cleared_by_next_operation() {
		let mut provider = MockProvider::new();
		provider
			.expect_broadcast()
			.times(1)
			.returning(|_| Ok(TransactionId::new("0x01")));

		let pipeline = pipeline(MockBehavior::Approve, provider);

		let bad = call_request().with_fee(0);
		let err = pipeline.call_contract(&bad).await.unwrap_err();
		assert_eq!(err.code, ErrorCode::InvalidRequest);
		assert!(pipeline.last_error().await.is_some());

		pipeline.call_contract(&call_request()).await.unwrap();
		assert!(pipeline.last_error().await.is_none());
	}

	#[tokio::test]
	async fn test_events_published() {
		let mut provider = MockProvider::new();
		provider
			.expect_broadcast()
			.returning(|_| Ok(TransactionId::new("0xfeed")));

		let pipeline = pipeline(MockBehavior::Approve, provider);
		let mut events = pipeline.event_bus.subscribe();

		pipeline.call_contract(&call_request()).await.unwrap();

		assert!(matches!(
			events.recv().await.unwrap(),
			PipelineEvent::Operation(OperationEvent::SigningRequested { .. })
		));
		match events.recv().await.unwrap() {
			PipelineEvent::Operation(OperationEvent::Broadcast { txid, .. }) => {
				assert_eq!(txid, TransactionId::new("0xfeed"));
			}
			other => panic!("unexpected event {:?}", other),
		}
	}

	#[test]
	fn test_error_code_wire_names() {
		assert_eq!(ErrorCode::NotConnected.as_str(), "NOT_CONNECTED");
		assert_eq!(ErrorCode::ContractCallError.as_str(), "CONTRACT_CALL_ERROR");
		assert_eq!(ErrorCode::DeploymentError.as_str(), "DEPLOYMENT_ERROR");
		let err = OperationError::new(ErrorCode::BroadcastError, "rejected");
		assert_eq!(err.to_string(), "BroadcastError: rejected");
	}
}
