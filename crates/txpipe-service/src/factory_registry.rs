//! Factory registry for pipeline implementations.
//!
//! Collects the factories every implementation crate exports and resolves
//! the names used in the configuration against them.

use std::collections::HashMap;
use std::sync::OnceLock;
use txpipe_config::Config;
use txpipe_core::{Pipeline, PipelineBuilder, PipelineFactories};
use txpipe_delivery::DeliveryFactory;
use txpipe_wallet::WalletFactory;

/// All known implementation factories.
pub struct FactoryRegistry {
	pub wallet: HashMap<String, WalletFactory>,
	pub delivery: HashMap<String, DeliveryFactory>,
}

impl FactoryRegistry {
	pub fn new() -> Self {
		Self {
			wallet: HashMap::new(),
			delivery: HashMap::new(),
		}
	}

	pub fn register_wallet(&mut self, name: impl Into<String>, factory: WalletFactory) {
		self.wallet.insert(name.into(), factory);
	}

	pub fn register_delivery(&mut self, name: impl Into<String>, factory: DeliveryFactory) {
		self.delivery.insert(name.into(), factory);
	}
}

impl Default for FactoryRegistry {
	fn default() -> Self {
		Self::new()
	}
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Returns the registry, populating it on first use.
pub fn get_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		for (name, factory) in txpipe_wallet::get_all_implementations() {
			tracing::debug!("Registering wallet implementation: {}", name);
			registry.register_wallet(name, factory);
		}

		for (name, factory) in txpipe_delivery::get_all_implementations() {
			tracing::debug!("Registering delivery implementation: {}", name);
			registry.register_delivery(name, factory);
		}

		registry
	})
}

/// Picks the factories named in a configuration section out of the registry.
macro_rules! build_factories {
	($registry:expr, $config_impls:expr, $registry_field:ident, $type_name:literal) => {{
		let mut factories = HashMap::new();
		for name in $config_impls.keys() {
			if let Some(factory) = $registry.$registry_field.get(name) {
				factories.insert(name.clone(), *factory);
			} else {
				let mut available: Vec<_> = $registry.$registry_field.keys().cloned().collect();
				available.sort();
				return Err(format!(
					"Unknown {} implementation '{}'. Available: [{}]",
					$type_name,
					name,
					available.join(", ")
				)
				.into());
			}
		}
		factories
	}};
}

/// Wires a pipeline from the configuration and the registered factories.
pub fn build_pipeline_from_config(config: Config) -> Result<Pipeline, Box<dyn std::error::Error>> {
	let registry = get_registry();

	let wallet_factories = build_factories!(registry, config.wallet.implementations, wallet, "wallet");
	let delivery_factories = build_factories!(
		registry,
		config.delivery.implementations,
		delivery,
		"delivery"
	);

	let factories = PipelineFactories {
		wallet_factories,
		delivery_factories,
	};

	Ok(PipelineBuilder::new(config).build(factories)?)
}
