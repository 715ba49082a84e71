//! Transaction builder.
//!
//! Turns an `OperationRequest` into an `UnsignedDescriptor`. The transform is
//! pure: it validates the request, fills in the default fee when the caller
//! left it out and never talks to the wallet or the network.

use thiserror::Error;
use txpipe_types::{
	AnchorMode, Network, OperationKind, OperationRequest, PostConditionMode, TransactionPayload,
	UnsignedDescriptor,
};

/// Longest contract name the ledger accepts.
pub const MAX_CONTRACT_NAME_LEN: usize = 128;

/// Marker every deployable source must contain at least once.
pub const DECLARATION_MARKER: &str = "(define-";

/// Reasons a request cannot be turned into a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
	#[error("Target address is empty")]
	MissingAddress,
	#[error("Address {address} does not belong to {network}")]
	AddressNetworkMismatch { address: String, network: Network },
	#[error("Contract name is empty")]
	MissingContractName,
	#[error("Invalid contract name '{0}'")]
	InvalidContractName(String),
	#[error("Fee must be greater than zero")]
	ZeroFee,
	#[error("Function name is empty")]
	MissingFunctionName,
	#[error("Contract source is empty")]
	EmptySource,
	#[error("Contract source contains no declarations")]
	MissingDeclaration,
}

/// Builds unsigned descriptors from operation requests.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
	default_fee: u64,
}

impl TransactionBuilder {
	/// `default_fee` is substituted when a request omits its fee.
	pub fn new(default_fee: u64) -> Self {
		Self { default_fee }
	}

	/// Validates `request` and produces its unsigned descriptor.
	pub fn build(&self, request: &OperationRequest) -> Result<UnsignedDescriptor, BuildError> {
		let address = request.contract_address();
		if address.is_empty() {
			return Err(BuildError::MissingAddress);
		}
		if !request.network().accepts_address(address) {
			return Err(BuildError::AddressNetworkMismatch {
				address: address.to_string(),
				network: request.network(),
			});
		}

		validate_contract_name(request.contract_name())?;

		let fee = match request.fee() {
			Some(0) => return Err(BuildError::ZeroFee),
			Some(fee) => fee,
			None => self.default_fee,
		};

		let payload = match request.operation() {
			OperationKind::ContractCall {
				function_name,
				function_args,
			} => {
				if function_name.is_empty() {
					return Err(BuildError::MissingFunctionName);
				}
				TransactionPayload::ContractCall {
					contract_address: address.to_string(),
					contract_name: request.contract_name().to_string(),
					function_name: function_name.clone(),
					function_args: function_args.clone(),
				}
			}
			OperationKind::Deploy { source } => {
				if source.trim().is_empty() {
					return Err(BuildError::EmptySource);
				}
				if !source.contains(DECLARATION_MARKER) {
					return Err(BuildError::MissingDeclaration);
				}
				TransactionPayload::SmartContract {
					contract_name: request.contract_name().to_string(),
					code_body: source.clone(),
					clarity_version: request.clarity_version(),
				}
			}
		};

		if request.post_condition_mode() == PostConditionMode::Allow {
			tracing::warn!(
				contract = %request.contract_id(),
				"Post-condition checking disabled for this transaction"
			);
		}

		Ok(UnsignedDescriptor {
			payload,
			network: request.network(),
			fee,
			anchor_mode: AnchorMode::Any,
			post_condition_mode: request.post_condition_mode(),
		})
	}
}

fn validate_contract_name(name: &str) -> Result<(), BuildError> {
	if name.is_empty() {
		return Err(BuildError::MissingContractName);
	}

	let starts_with_letter = name.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
	let valid_chars = name
		.chars()
		.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

	if name.len() > MAX_CONTRACT_NAME_LEN || !starts_with_letter || !valid_chars {
		return Err(BuildError::InvalidContractName(name.to_string()));
	}

	Ok(())
}
