//! Network selector for the target ledger.
//!
//! Addresses on the ledger carry a two-letter prefix that encodes the network
//! they belong to, so the selector also knows which prefixes are acceptable.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The network an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
	/// The primary (production) network.
	Mainnet,
	/// The secondary test network.
	Testnet,
}

impl Network {
	/// Returns the lowercase name used in configuration files and on the CLI.
	pub fn as_str(&self) -> &'static str {
		match self {
			Network::Mainnet => "mainnet",
			Network::Testnet => "testnet",
		}
	}

	/// Address prefixes accepted on this network.
	///
	/// The first entry is the single-signature prefix, the second the
	/// multi-signature prefix.
	pub fn address_prefixes(&self) -> [&'static str; 2] {
		match self {
			Network::Mainnet => ["SP", "SM"],
			Network::Testnet => ["ST", "SN"],
		}
	}

	/// Returns true if `address` carries one of this network's prefixes.
	pub fn accepts_address(&self, address: &str) -> bool {
		self.address_prefixes()
			.iter()
			.any(|prefix| address.starts_with(prefix))
	}
}

impl fmt::Display for Network {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Network {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"mainnet" => Ok(Network::Mainnet),
			"testnet" => Ok(Network::Testnet),
			other => Err(format!("Unknown network '{}'", other)),
		}
	}
}

/// Endpoint configuration for a single network.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NetworkConfig {
	/// Base URL of the network API serving broadcast and status endpoints.
	pub api_url: String,
}

/// Networks configuration keyed by network selector.
///
/// TOML tables are keyed by the lowercase network name, e.g.
/// `[networks.testnet]`.
pub type NetworksConfig = BTreeMap<Network, NetworkConfig>;

/// Deserializes a networks table whose keys are network names.
///
/// Unknown network names are reported as deserialization errors.
pub fn deserialize_networks<'de, D>(deserializer: D) -> Result<NetworksConfig, D::Error>
where
	D: Deserializer<'de>,
{
	let string_map: BTreeMap<String, NetworkConfig> = BTreeMap::deserialize(deserializer)?;
	let mut result = BTreeMap::new();

	for (key, value) in string_map {
		let network = key.parse::<Network>().map_err(serde::de::Error::custom)?;
		result.insert(network, value);
	}

	Ok(result)
}
