//! Signing delegate interface for the txpipe pipeline.
//!
//! The pipeline never holds keys. Signing is delegated to an external wallet
//! capability that turns an unsigned descriptor into a signed payload once
//! the user approves it. This crate defines that contract and the service
//! that wraps one injected delegate.

use async_trait::async_trait;
use txpipe_types::{
	ConfigSchema, ImplementationRegistry, Network, SignedPayload, UnsignedDescriptor,
};
use thiserror::Error;

pub mod decline;

/// Re-export implementations
pub mod implementations {
	pub mod mock;
}

/// Errors that can occur during wallet operations.
#[derive(Debug, Error)]
pub enum WalletError {
	/// The delegate failed to produce a signature.
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	/// No identity is connected to the delegate.
	#[error("Wallet not connected")]
	NotConnected,
	/// The delegate misbehaved or could not be constructed.
	#[error("Implementation error: {0}")]
	Implementation(String),
}

/// Connection state reported by a delegate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WalletState {
	/// Address of the connected identity, if any.
	pub address: Option<String>,
}

impl WalletState {
	pub fn connected(address: impl Into<String>) -> Self {
		Self {
			address: Some(address.into()),
		}
	}

	pub fn is_connected(&self) -> bool {
		self.address.is_some()
	}
}

/// Contract of an external signing capability.
///
/// The contract carries no structured way of telling a user refusal from a
/// technical failure; both arrive as errors.
#[async_trait]
pub trait SigningDelegate: Send + Sync {
	/// Returns the configuration schema for this delegate implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Returns the identity currently connected to the delegate.
	async fn state(&self) -> Result<WalletState, WalletError>;

	/// Asks the user to sign `descriptor` for `network`.
	///
	/// Resolves only once the user has answered the prompt.
	async fn sign_transaction(
		&self,
		descriptor: &UnsignedDescriptor,
		network: Network,
	) -> Result<SignedPayload, WalletError>;
}

/// Result of a signing request that did not fail technically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningOutcome {
	Signed(SignedPayload),
	/// The user refused to sign.
	Declined,
}

/// Type alias for delegate factory functions.
pub type WalletFactory = fn(&toml::Value) -> Result<Box<dyn SigningDelegate>, WalletError>;

/// Registry trait for delegate implementations.
pub trait WalletRegistry: ImplementationRegistry<Factory = WalletFactory> {}

/// Get all registered delegate implementations.
pub fn get_all_implementations() -> Vec<(&'static str, WalletFactory)> {
	use implementations::mock;

	vec![(mock::Registry::NAME, mock::Registry::factory())]
}

/// Service wrapping the injected signing delegate.
pub struct WalletService {
	delegate: Box<dyn SigningDelegate>,
}

impl WalletService {
	pub fn new(delegate: Box<dyn SigningDelegate>) -> Self {
		Self { delegate }
	}

	/// Address of the connected identity, or `None` when disconnected.
	pub async fn connected_address(&self) -> Result<Option<String>, WalletError> {
		Ok(self.delegate.state().await?.address)
	}

	/// Requests a signature and separates a user decline from a failure.
	pub async fn sign(&self, descriptor: &UnsignedDescriptor) -> Result<SigningOutcome, WalletError> {
		match self
			.delegate
			.sign_transaction(descriptor, descriptor.network)
			.await
		{
			Ok(payload) if payload.network() != descriptor.network => {
				Err(WalletError::Implementation(format!(
					"Delegate signed for {} but {} was requested",
					payload.network(),
					descriptor.network
				)))
			}
			Ok(payload) => Ok(SigningOutcome::Signed(payload)),
			Err(e) if decline::is_decline(&e.to_string()) => {
				tracing::debug!(error = %e, "Signing request declined");
				Ok(SigningOutcome::Declined)
			}
			Err(e) => Err(e),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::mock::{MockBehavior, MockWallet};
	use txpipe_types::{AnchorMode, PostConditionMode, TransactionPayload};

	const ADDRESS: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM";

	fn descriptor() -> UnsignedDescriptor {
		UnsignedDescriptor {
			payload: TransactionPayload::SmartContract {
				contract_name: "counter".to_string(),
				code_body: "(define-data-var count uint u0)".to_string(),
				clarity_version: Default::default(),
			},
			network: Network::Testnet,
			fee: 2000,
			anchor_mode: AnchorMode::Any,
			post_condition_mode: PostConditionMode::Allow,
		}
	}

	#[tokio::test]
	async fn test_signed_outcome() {
		let service = WalletService::new(Box::new(MockWallet::new(
			Some(ADDRESS.to_string()),
			MockBehavior::Approve,
		)));

		assert_eq!(
			service.connected_address().await.unwrap().as_deref(),
			Some(ADDRESS)
		);
		match service.sign(&descriptor()).await.unwrap() {
			SigningOutcome::Signed(payload) => {
				assert_eq!(payload.network(), Network::Testnet);
				assert!(!payload.is_empty());
			}
			SigningOutcome::Declined => panic!("expected a signature"),
		}
	}

	#[tokio::test]
	async fn test_decline_is_not_an_error() {
		let service = WalletService::new(Box::new(MockWallet::new(
			Some(ADDRESS.to_string()),
			MockBehavior::Decline,
		)));
		assert_eq!(
			service.sign(&descriptor()).await.unwrap(),
			SigningOutcome::Declined
		);
	}

	#[tokio::test]
	async fn test_failure_is_surfaced() {
		let service = WalletService::new(Box::new(MockWallet::new(
			Some(ADDRESS.to_string()),
			MockBehavior::Fail,
		)));
		assert!(matches!(
			service.sign(&descriptor()).await,
			Err(WalletError::SigningFailed(_))
		));
	}

	#[tokio::test]
	async fn test_disconnected_wallet() {
		let service = WalletService::new(Box::new(MockWallet::new(None, MockBehavior::Approve)));
		assert_eq!(service.connected_address().await.unwrap(), None);
		assert!(matches!(
			service.sign(&descriptor()).await,
			Err(WalletError::NotConnected)
		));
	}
}
