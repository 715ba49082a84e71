//! Scripted signing delegate for local runs and tests.
//!
//! The mock never touches key material. It answers every signing request the
//! same way, according to its configured behavior, and builds the "signed"
//! bytes from the descriptor fingerprint so that equal descriptors produce
//! equal payloads.

use crate::{SigningDelegate, WalletError, WalletFactory, WalletRegistry, WalletState};
use async_trait::async_trait;
use serde::Deserialize;
use txpipe_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Network, Schema, SignedPayload,
	UnsignedDescriptor, ValidationError,
};

/// How the mock answers signing prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MockBehavior {
	#[default]
	Approve,
	Decline,
	Fail,
}

#[derive(Debug, Deserialize)]
struct MockWalletConfig {
	address: Option<String>,
	#[serde(default)]
	behavior: MockBehavior,
}

pub struct MockWallet {
	address: Option<String>,
	behavior: MockBehavior,
}

impl MockWallet {
	pub fn new(address: Option<String>, behavior: MockBehavior) -> Self {
		Self { address, behavior }
	}
}

/// Configuration schema for the mock delegate.
pub struct MockWalletSchema;

impl ConfigSchema for MockWalletSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("address", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(address) if address.len() > 2 && address.starts_with('S') => Ok(()),
						_ => Err("address must be a network-prefixed principal".to_string()),
					}
				}),
				Field::new("behavior", FieldType::OneOf(&["approve", "decline", "fail"])),
			],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl SigningDelegate for MockWallet {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MockWalletSchema)
	}

	async fn state(&self) -> Result<WalletState, WalletError> {
		Ok(WalletState {
			address: self.address.clone(),
		})
	}

	async fn sign_transaction(
		&self,
		descriptor: &UnsignedDescriptor,
		network: Network,
	) -> Result<SignedPayload, WalletError> {
		let address = self.address.as_ref().ok_or(WalletError::NotConnected)?;

		match self.behavior {
			MockBehavior::Approve => {
				let mut bytes = vec![0x80];
				bytes.extend(
					hex::decode(descriptor.fingerprint())
						.map_err(|e| WalletError::Implementation(e.to_string()))?,
				);
				bytes.extend_from_slice(address.as_bytes());
				Ok(SignedPayload::from_delegate(bytes, network))
			}
			MockBehavior::Decline => Err(WalletError::SigningFailed(
				"User rejected the transaction request".to_string(),
			)),
			MockBehavior::Fail => Err(WalletError::SigningFailed(
				"Wallet extension is unavailable".to_string(),
			)),
		}
	}
}

/// Factory function to create a mock delegate from configuration.
///
/// Configuration parameters:
/// - `address` (optional): connected identity; omit to simulate a disconnected wallet
/// - `behavior` (optional): "approve" (default), "decline" or "fail"
pub fn create_wallet(config: &toml::Value) -> Result<Box<dyn SigningDelegate>, WalletError> {
	MockWalletSchema
		.validate(config)
		.map_err(|e| WalletError::Implementation(format!("Invalid configuration: {}", e)))?;

	let config: MockWalletConfig = config
		.clone()
		.try_into()
		.map_err(|e: toml::de::Error| WalletError::Implementation(e.message().to_string()))?;

	Ok(Box::new(MockWallet::new(config.address, config.behavior)))
}

/// Registry for the mock delegate implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "mock";
	type Factory = WalletFactory;

	fn factory() -> Self::Factory {
		create_wallet
	}
}

impl WalletRegistry for Registry {}
