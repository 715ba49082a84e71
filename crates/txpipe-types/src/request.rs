//! Operation requests supplied by the caller.
//!
//! An `OperationRequest` describes one ledger-writing operation, either a
//! smart-contract function call or a smart-contract deployment. Requests are
//! assembled once through the constructors and `with_*` methods and are
//! read-only afterwards.

use crate::Network;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A typed contract argument value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum ContractArg {
	#[serde(rename = "uint")]
	UInt(u128),
	#[serde(rename = "int")]
	Int(i128),
	#[serde(rename = "bool")]
	Bool(bool),
	#[serde(rename = "principal")]
	Principal(String),
	#[serde(rename = "string_ascii")]
	StringAscii(String),
	#[serde(rename = "string_utf8")]
	StringUtf8(String),
	#[serde(rename = "buffer")]
	Buffer(Vec<u8>),
}

impl fmt::Display for ContractArg {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ContractArg::UInt(v) => write!(f, "u{}", v),
			ContractArg::Int(v) => write!(f, "{}", v),
			ContractArg::Bool(v) => write!(f, "{}", v),
			ContractArg::Principal(p) => write!(f, "'{}", p),
			ContractArg::StringAscii(s) => write!(f, "{:?}", s),
			ContractArg::StringUtf8(s) => write!(f, "u{:?}", s),
			ContractArg::Buffer(b) => write!(f, "0x{}", hex::encode(b)),
		}
	}
}

/// Contract language version the operation is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClarityVersion {
	Clarity1,
	#[default]
	Clarity2,
	Clarity3,
}

/// Whether the network enforces post-conditions on the transaction.
///
/// `Allow` disables post-condition checking, letting the contract move
/// assets freely. It is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostConditionMode {
	#[default]
	Allow,
	Deny,
}

/// What the operation does once it reaches the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationKind {
	/// Invoke a public function of a deployed contract.
	ContractCall {
		function_name: String,
		#[serde(default)]
		function_args: Vec<ContractArg>,
	},
	/// Publish a new contract from source text.
	Deploy { source: String },
}

impl OperationKind {
	/// Short label used in logs and error messages.
	pub fn label(&self) -> &'static str {
		match self {
			OperationKind::ContractCall { .. } => "contract-call",
			OperationKind::Deploy { .. } => "deploy",
		}
	}
}

/// A caller-supplied description of one ledger-writing operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRequest {
	network: Network,
	/// Contract owner for calls, deployer for deployments.
	contract_address: String,
	contract_name: String,
	operation: OperationKind,
	/// Fee in base network units. `None` means the caller omitted it.
	#[serde(default)]
	fee: Option<u64>,
	#[serde(default)]
	clarity_version: ClarityVersion,
	#[serde(default)]
	post_condition_mode: PostConditionMode,
}

impl OperationRequest {
	/// Creates a request to call `function_name` on `contract_address.contract_name`.
	pub fn contract_call(
		network: Network,
		contract_address: impl Into<String>,
		contract_name: impl Into<String>,
		function_name: impl Into<String>,
		function_args: Vec<ContractArg>,
	) -> Self {
		Self {
			network,
			contract_address: contract_address.into(),
			contract_name: contract_name.into(),
			operation: OperationKind::ContractCall {
				function_name: function_name.into(),
				function_args,
			},
			fee: None,
			clarity_version: ClarityVersion::default(),
			post_condition_mode: PostConditionMode::default(),
		}
	}

	/// Creates a request to deploy `source` as `deployer_address.contract_name`.
	pub fn deploy(
		network: Network,
		deployer_address: impl Into<String>,
		contract_name: impl Into<String>,
		source: impl Into<String>,
	) -> Self {
		Self {
			network,
			contract_address: deployer_address.into(),
			contract_name: contract_name.into(),
			operation: OperationKind::Deploy {
				source: source.into(),
			},
			fee: None,
			clarity_version: ClarityVersion::default(),
			post_condition_mode: PostConditionMode::default(),
		}
	}

	pub fn with_fee(mut self, fee: u64) -> Self {
		self.fee = Some(fee);
		self
	}

	pub fn with_clarity_version(mut self, version: ClarityVersion) -> Self {
		self.clarity_version = version;
		self
	}

	pub fn with_post_condition_mode(mut self, mode: PostConditionMode) -> Self {
		self.post_condition_mode = mode;
		self
	}

	pub fn network(&self) -> Network {
		self.network
	}

	pub fn contract_address(&self) -> &str {
		&self.contract_address
	}

	pub fn contract_name(&self) -> &str {
		&self.contract_name
	}

	pub fn operation(&self) -> &OperationKind {
		&self.operation
	}

	pub fn fee(&self) -> Option<u64> {
		self.fee
	}

	pub fn clarity_version(&self) -> ClarityVersion {
		self.clarity_version
	}

	pub fn post_condition_mode(&self) -> PostConditionMode {
		self.post_condition_mode
	}

	/// Fully qualified contract identifier, `address.name`.
	pub fn contract_id(&self) -> String {
		format!("{}.{}", self.contract_address, self.contract_name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_contract_arg_display() {
		assert_eq!(ContractArg::UInt(1000).to_string(), "u1000");
		assert_eq!(ContractArg::Int(-5).to_string(), "-5");
		assert_eq!(
			ContractArg::Principal("ST111".to_string()).to_string(),
			"'ST111"
		);
		assert_eq!(
			ContractArg::StringAscii("hi".to_string()).to_string(),
			"\"hi\""
		);
		assert_eq!(ContractArg::Buffer(vec![0xde, 0xad]).to_string(), "0xdead");
	}

	#[test]
	fn test_request_from_json() {
		let json = r#"{
			"network": "testnet",
			"contract_address": "ST000000000000000000002AMW42H",
			"contract_name": "token",
			"operation": {
				"type": "contract_call",
				"function_name": "mint",
				"function_args": [
					{ "type": "uint", "value": 1000 },
					{ "type": "principal", "value": "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM" }
				]
			},
			"fee": 150000
		}"#;

		let request: OperationRequest = serde_json::from_str(json).unwrap();
		assert_eq!(request.network(), Network::Testnet);
		assert_eq!(request.fee(), Some(150000));
		assert_eq!(request.post_condition_mode(), PostConditionMode::Allow);
		assert_eq!(request.clarity_version(), ClarityVersion::Clarity2);
		match request.operation() {
			OperationKind::ContractCall {
				function_name,
				function_args,
			} => {
				assert_eq!(function_name, "mint");
				assert_eq!(function_args[0], ContractArg::UInt(1000));
			}
			other => panic!("unexpected operation {:?}", other),
		}
	}

	#[test]
	fn test_deploy_defaults() {
		let request = OperationRequest::deploy(
			Network::Mainnet,
			"SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7",
			"counter",
			"(define-data-var count uint u0)",
		);
		assert_eq!(request.fee(), None);
		assert_eq!(request.operation().label(), "deploy");
		assert_eq!(
			request.contract_id(),
			"SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7.counter"
		);
	}
}
