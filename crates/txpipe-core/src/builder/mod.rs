//! Builder for wiring a pipeline from configuration.
//!
//! Looks up the configured wallet and delivery implementations in the
//! supplied factory maps, creates one delivery provider per configured
//! network and assembles the operation pipeline, status poller and batch
//! executor around a shared event bus.

use crate::batch::BatchExecutor;
use crate::engine::{event_bus::EventBus, OperationPipeline};
use crate::monitoring::StatusPoller;
use crate::transaction::TransactionBuilder;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use txpipe_config::Config;
use txpipe_delivery::{DeliveryError, DeliveryInterface, DeliveryService};
use txpipe_types::{Network, NetworkConfig};
use txpipe_wallet::{SigningDelegate, WalletError, WalletService};

/// Errors raised while assembling a pipeline.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions available to the builder, keyed by implementation name.
pub struct PipelineFactories<WF, DF> {
	pub wallet_factories: HashMap<String, WF>,
	pub delivery_factories: HashMap<String, DF>,
}

/// Fully wired pipeline components.
pub struct Pipeline {
	pub operations: Arc<OperationPipeline>,
	pub batch: Arc<BatchExecutor>,
	pub poller: StatusPoller,
	pub event_bus: EventBus,
	pub wallet: Arc<WalletService>,
	pub delivery: Arc<DeliveryService>,
}

pub struct PipelineBuilder {
	config: Config,
}

impl PipelineBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Creates every component named by the configuration.
	pub fn build<WF, DF>(self, factories: PipelineFactories<WF, DF>) -> Result<Pipeline, BuilderError>
	where
		WF: Fn(&toml::Value) -> Result<Box<dyn SigningDelegate>, WalletError>,
		DF: Fn(&toml::Value, &NetworkConfig) -> Result<Box<dyn DeliveryInterface>, DeliveryError>,
	{
		let wallet = Arc::new(WalletService::new(self.create_wallet(&factories)?));
		let delivery = Arc::new(DeliveryService::new(self.create_providers(&factories)?));

		let event_bus = EventBus::default();
		let poller = StatusPoller::new(
			delivery.clone(),
			event_bus.clone(),
			self.config.monitoring.poll_interval(),
		);

		let operations = Arc::new(OperationPipeline::new(
			TransactionBuilder::new(self.config.transaction.default_fee),
			wallet.clone(),
			delivery.clone(),
			poller.clone(),
			event_bus.clone(),
		));

		let batch = Arc::new(BatchExecutor::new(
			operations.clone(),
			event_bus.clone(),
			self.config.batch.item_delay(),
		));

		tracing::info!(
			service = %self.config.service.id,
			networks = ?delivery.networks(),
			"Pipeline ready"
		);

		Ok(Pipeline {
			operations,
			batch,
			poller,
			event_bus,
			wallet,
			delivery,
		})
	}

	fn create_wallet<WF, DF>(
		&self,
		factories: &PipelineFactories<WF, DF>,
	) -> Result<Box<dyn SigningDelegate>, BuilderError>
	where
		WF: Fn(&toml::Value) -> Result<Box<dyn SigningDelegate>, WalletError>,
	{
		let primary = &self.config.wallet.primary;
		let config = self.config.wallet.implementations.get(primary).ok_or_else(|| {
			BuilderError::Config(format!("Primary wallet '{}' is not configured", primary))
		})?;
		let factory = factories.wallet_factories.get(primary).ok_or_else(|| {
			BuilderError::MissingComponent(format!("wallet implementation '{}'", primary))
		})?;

		match factory(config) {
			Ok(delegate) => {
				tracing::info!(component = "wallet", implementation = %primary, "Loaded");
				Ok(delegate)
			}
			Err(e) => {
				tracing::error!(
					component = "wallet",
					implementation = %primary,
					error = %e,
					"Failed to create wallet implementation"
				);
				Err(BuilderError::Config(format!(
					"Failed to create wallet implementation '{}': {}",
					primary, e
				)))
			}
		}
	}

	fn create_providers<WF, DF>(
		&self,
		factories: &PipelineFactories<WF, DF>,
	) -> Result<HashMap<Network, Box<dyn DeliveryInterface>>, BuilderError>
	where
		DF: Fn(&toml::Value, &NetworkConfig) -> Result<Box<dyn DeliveryInterface>, DeliveryError>,
	{
		let primary = &self.config.delivery.primary;
		let config = self.config.delivery.implementations.get(primary).ok_or_else(|| {
			BuilderError::Config(format!("Primary delivery '{}' is not configured", primary))
		})?;
		let factory = factories.delivery_factories.get(primary).ok_or_else(|| {
			BuilderError::MissingComponent(format!("delivery implementation '{}'", primary))
		})?;

		let mut providers = HashMap::new();
		for (network, network_config) in &self.config.networks {
			match factory(config, network_config) {
				Ok(provider) => {
					tracing::info!(
						component = "delivery",
						implementation = %primary,
						network = %network,
						"Loaded"
					);
					providers.insert(*network, provider);
				}
				Err(e) => {
					tracing::error!(
						component = "delivery",
						implementation = %primary,
						network = %network,
						error = %e,
						"Failed to create delivery implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create delivery implementation '{}' for {}: {}",
						primary, network, e
					)));
				}
			}
		}

		if providers.is_empty() {
			return Err(BuilderError::Config(
				"No delivery providers available".to_string(),
			));
		}

		Ok(providers)
	}
}
