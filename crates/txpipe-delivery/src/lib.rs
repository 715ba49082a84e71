//! Transaction delivery for the txpipe pipeline.
//!
//! Submits signed payloads to the network and answers status queries about
//! submitted transactions. One provider serves one network; the
//! `DeliveryService` routes each call to the provider of the payload's or
//! caller's network. Nothing here retries: a failed call is reported as is.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use txpipe_types::{
	truncate_id, ConfigSchema, ImplementationRegistry, Network, NetworkConfig,
	RawTransactionStatus, SignedPayload, TransactionId,
};

/// Re-export implementations
pub mod implementations {
	pub mod http;
}

/// Errors that can occur during transaction delivery operations.
#[derive(Debug, Error)]
pub enum DeliveryError {
	/// Transport-level failure talking to the network API.
	#[error("Network error: {0}")]
	Network(String),
	/// The network answered with a structured error. The message is the
	/// network's own error field, unchanged.
	#[error("{error}")]
	Rejected {
		error: String,
		reason: Option<String>,
	},
	/// The network does not know the transaction (yet).
	#[error("Transaction not found: {0}")]
	NotFound(String),
	/// No provider is configured for the network.
	#[error("No provider available for {0}")]
	NoProviderAvailable(Network),
}

/// Interface every delivery provider implements.
#[async_trait]
pub trait DeliveryInterface: Send + Sync {
	/// Returns the configuration schema for this delivery implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Submits signed transaction bytes and returns the network identifier.
	///
	/// A response carrying an error field is a failure even when the
	/// transport call succeeded.
	async fn broadcast(&self, payload: &SignedPayload) -> Result<TransactionId, DeliveryError>;

	/// Reads the raw status record of a submitted transaction.
	async fn get_transaction_status(
		&self,
		txid: &TransactionId,
	) -> Result<RawTransactionStatus, DeliveryError>;

	/// Reads the current chain tip height.
	async fn get_block_height(&self) -> Result<u64, DeliveryError>;
}

/// Type alias for delivery factory functions.
///
/// Factories receive the implementation's own TOML table and the endpoint
/// configuration of the network the provider will serve.
pub type DeliveryFactory =
	fn(&toml::Value, &NetworkConfig) -> Result<Box<dyn DeliveryInterface>, DeliveryError>;

/// Registry trait for delivery implementations.
pub trait DeliveryRegistry: ImplementationRegistry<Factory = DeliveryFactory> {}

/// Get all registered delivery implementations.
pub fn get_all_implementations() -> Vec<(&'static str, DeliveryFactory)> {
	use implementations::http;

	vec![(http::Registry::NAME, http::Registry::factory())]
}

/// Service routing delivery calls to the provider of each network.
pub struct DeliveryService {
	providers: HashMap<Network, Box<dyn DeliveryInterface>>,
}

impl DeliveryService {
	pub fn new(providers: HashMap<Network, Box<dyn DeliveryInterface>>) -> Self {
		Self { providers }
	}

	fn provider(&self, network: Network) -> Result<&dyn DeliveryInterface, DeliveryError> {
		self.providers
			.get(&network)
			.map(|p| p.as_ref())
			.ok_or(DeliveryError::NoProviderAvailable(network))
	}

	/// Broadcasts a signed payload on the network it was signed for.
	pub async fn broadcast(&self, payload: &SignedPayload) -> Result<TransactionId, DeliveryError> {
		let network = payload.network();
		let provider = self.provider(network)?;

		let txid = provider.broadcast(payload).await?;
		tracing::info!(
			txid = %truncate_id(txid.as_str()),
			network = %network,
			"Broadcast transaction"
		);
		Ok(txid)
	}

	/// Reads the raw status of a transaction on `network`.
	pub async fn get_status(
		&self,
		txid: &TransactionId,
		network: Network,
	) -> Result<RawTransactionStatus, DeliveryError> {
		self.provider(network)?.get_transaction_status(txid).await
	}

	/// Reads the chain tip height of `network`.
	pub async fn get_block_height(&self, network: Network) -> Result<u64, DeliveryError> {
		self.provider(network)?.get_block_height().await
	}

	/// Networks with a configured provider.
	pub fn networks(&self) -> Vec<Network> {
		let mut networks: Vec<Network> = self.providers.keys().copied().collect();
		networks.sort();
		networks
	}
}
