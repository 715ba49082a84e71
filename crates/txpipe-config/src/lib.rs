//! Configuration module for the txpipe transaction pipeline.
//!
//! Configuration is read from a TOML file. `${VAR}` and `${VAR:-default}`
//! references are resolved from the environment before parsing, and the
//! parsed configuration is validated before it is handed out.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use txpipe_types::{deserialize_networks, NetworksConfig};

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message only, not the dump of the input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this pipeline instance.
	pub service: ServiceConfig,
	/// API endpoints per network.
	#[serde(deserialize_with = "deserialize_networks")]
	pub networks: NetworksConfig,
	/// Broadcaster implementations.
	pub delivery: DeliveryConfig,
	/// Signing delegate implementations.
	pub wallet: WalletConfig,
	/// Transaction construction defaults.
	#[serde(default)]
	pub transaction: TransactionConfig,
	/// Finality polling settings.
	#[serde(default)]
	pub monitoring: MonitoringConfig,
	/// Batch run settings.
	#[serde(default)]
	pub batch: BatchConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Identifier used in logs.
	pub id: String,
}

/// Configuration for broadcast providers.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeliveryConfig {
	/// Which implementation to use.
	pub primary: String,
	/// Implementation name to raw TOML table.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the signing delegate.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WalletConfig {
	/// Which implementation to use.
	pub primary: String,
	/// Implementation name to raw TOML table.
	pub implementations: HashMap<String, toml::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransactionConfig {
	/// Relay fee substituted when a request omits its fee, in base units.
	#[serde(default = "default_fee")]
	pub default_fee: u64,
}

impl Default for TransactionConfig {
	fn default() -> Self {
		Self {
			default_fee: default_fee(),
		}
	}
}

/// Standard relay fee in base network units.
fn default_fee() -> u64 {
	2000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitoringConfig {
	/// Seconds between two status checks of the same transaction.
	#[serde(default = "default_poll_interval_seconds")]
	pub poll_interval_seconds: u64,
}

impl MonitoringConfig {
	pub fn poll_interval(&self) -> Duration {
		Duration::from_secs(self.poll_interval_seconds)
	}
}

impl Default for MonitoringConfig {
	fn default() -> Self {
		Self {
			poll_interval_seconds: default_poll_interval_seconds(),
		}
	}
}

fn default_poll_interval_seconds() -> u64 {
	10
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchConfig {
	/// Pause between two consecutive batch items, in milliseconds.
	#[serde(default = "default_item_delay_ms")]
	pub item_delay_ms: u64,
}

impl BatchConfig {
	pub fn item_delay(&self) -> Duration {
		Duration::from_millis(self.item_delay_ms)
	}
}

impl Default for BatchConfig {
	fn default() -> Self {
		Self {
			item_delay_ms: default_item_delay_ms(),
		}
	}
}

fn default_item_delay_ms() -> u64 {
	1000
}

/// Resolves environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of VAR_NAME and supports defaults
/// with `${VAR_NAME:-default_value}`. Input is limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)));
				}
			},
		};

		result.push_str(&input[last_end..full_match.start()]);
		result.push_str(&value);
		last_end = full_match.end();
	}

	result.push_str(&input[last_end..]);
	Ok(result)
}

impl Config {
	/// Loads configuration from a file.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let content = tokio::fs::read_to_string(path).await.map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				e.kind(),
				format!("Cannot read {}: {}", path.display(), e),
			))
		})?;
		content.parse()
	}

	/// Validates cross-field constraints that serde cannot express.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.is_empty() {
			return Err(ConfigError::Validation("Service ID cannot be empty".into()));
		}

		if self.networks.is_empty() {
			return Err(ConfigError::Validation(
				"At least one network must be configured".into(),
			));
		}
		for (network, endpoint) in &self.networks {
			if !(endpoint.api_url.starts_with("http://") || endpoint.api_url.starts_with("https://"))
			{
				return Err(ConfigError::Validation(format!(
					"Network {} api_url must be an http(s) URL, got '{}'",
					network, endpoint.api_url
				)));
			}
		}

		if !self
			.delivery
			.implementations
			.contains_key(&self.delivery.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary delivery '{}' not found in implementations",
				self.delivery.primary
			)));
		}

		if !self.wallet.implementations.contains_key(&self.wallet.primary) {
			return Err(ConfigError::Validation(format!(
				"Primary wallet '{}' not found in implementations",
				self.wallet.primary
			)));
		}

		if self.transaction.default_fee == 0 {
			return Err(ConfigError::Validation(
				"transaction.default_fee must be greater than 0".into(),
			));
		}

		if self.monitoring.poll_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"monitoring.poll_interval_seconds must be at least 1".into(),
			));
		}
		if self.monitoring.poll_interval_seconds > 3600 {
			return Err(ConfigError::Validation(
				"monitoring.poll_interval_seconds cannot exceed 3600".into(),
			));
		}

		if self.batch.item_delay_ms > 60_000 {
			return Err(ConfigError::Validation(
				"batch.item_delay_ms cannot exceed 60000".into(),
			));
		}

		Ok(())
	}
}

/// Parses a TOML string, resolving environment variables and validating.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
