//! HTTP delivery provider backed by the network's public API.
//!
//! Broadcasts go to `POST {api_url}/v2/transactions` as raw bytes, status
//! reads to `GET {api_url}/extended/v1/tx/{txid}` and the chain tip to
//! `GET {api_url}/v2/info`.

use crate::{DeliveryError, DeliveryFactory, DeliveryInterface, DeliveryRegistry};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;
use txpipe_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, NetworkConfig, RawTransactionStatus,
	Schema, SignedPayload, TransactionId, ValidationError,
};

/// Header carrying the optional API key.
const API_KEY_HEADER: &str = "x-api-key";

/// Body returned by the broadcast endpoint.
///
/// Accepted transactions come back as a bare JSON string or as an object
/// with a `txid` field; rejections carry an `error` field.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BroadcastResponse {
	Txid(String),
	Object {
		#[serde(default)]
		txid: Option<String>,
		#[serde(default)]
		error: Option<String>,
		#[serde(default)]
		reason: Option<String>,
	},
}

#[derive(Debug, Deserialize)]
struct NodeInfo {
	stacks_tip_height: u64,
}

/// Interprets a broadcast response.
///
/// The error field is checked before the HTTP status: an application-level
/// rejection can arrive with a success status.
pub(crate) fn parse_broadcast_response(
	status: StatusCode,
	body: &str,
) -> Result<TransactionId, DeliveryError> {
	match serde_json::from_str::<BroadcastResponse>(body) {
		Ok(BroadcastResponse::Object {
			error: Some(error),
			reason,
			..
		}) => Err(DeliveryError::Rejected { error, reason }),
		Ok(BroadcastResponse::Txid(txid))
		| Ok(BroadcastResponse::Object {
			txid: Some(txid), ..
		}) if status.is_success() => Ok(TransactionId::new(txid)),
		_ => Err(DeliveryError::Network(format!(
			"Unexpected broadcast response ({}): {}",
			status, body
		))),
	}
}

pub struct HttpDelivery {
	client: reqwest::Client,
	api_url: String,
}

impl HttpDelivery {
	pub fn new(api_url: &str, api_key: Option<&str>) -> Result<Self, DeliveryError> {
		let mut headers = HeaderMap::new();
		if let Some(key) = api_key {
			let value = HeaderValue::from_str(key)
				.map_err(|e| DeliveryError::Network(format!("Invalid API key: {}", e)))?;
			headers.insert(API_KEY_HEADER, value);
		}

		let client = reqwest::Client::builder()
			.default_headers(headers)
			.build()
			.map_err(|e| DeliveryError::Network(format!("Failed to build HTTP client: {}", e)))?;

		Ok(Self {
			client,
			api_url: api_url.trim_end_matches('/').to_string(),
		})
	}

	fn url(&self, path: &str) -> String {
		format!("{}{}", self.api_url, path)
	}
}

/// Configuration schema for the HTTP provider.
pub struct HttpDeliverySchema;

impl ConfigSchema for HttpDeliverySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new("api_key", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(key) if !key.trim().is_empty() => Ok(()),
					_ => Err("api_key cannot be empty".to_string()),
				}
			})],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl DeliveryInterface for HttpDelivery {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(HttpDeliverySchema)
	}

	async fn broadcast(&self, payload: &SignedPayload) -> Result<TransactionId, DeliveryError> {
		let response = self
			.client
			.post(self.url("/v2/transactions"))
			.header(CONTENT_TYPE, "application/octet-stream")
			.body(payload.as_bytes().to_vec())
			.send()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to send transaction: {}", e)))?;

		let status = response.status();
		let body = response
			.text()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to read response: {}", e)))?;

		parse_broadcast_response(status, &body)
	}

	async fn get_transaction_status(
		&self,
		txid: &TransactionId,
	) -> Result<RawTransactionStatus, DeliveryError> {
		let response = self
			.client
			.get(self.url(&format!("/extended/v1/tx/{}", txid)))
			.send()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to query status: {}", e)))?;

		if response.status() == StatusCode::NOT_FOUND {
			return Err(DeliveryError::NotFound(txid.to_string()));
		}

		let response = response
			.error_for_status()
			.map_err(|e| DeliveryError::Network(e.to_string()))?;

		response
			.json::<RawTransactionStatus>()
			.await
			.map_err(|e| DeliveryError::Network(format!("Invalid status response: {}", e)))
	}

	async fn get_block_height(&self) -> Result<u64, DeliveryError> {
		let info = self
			.client
			.get(self.url("/v2/info"))
			.send()
			.await
			.and_then(|r| r.error_for_status())
			.map_err(|e| DeliveryError::Network(format!("Failed to get chain tip: {}", e)))?
			.json::<NodeInfo>()
			.await
			.map_err(|e| DeliveryError::Network(format!("Invalid info response: {}", e)))?;

		Ok(info.stacks_tip_height)
	}
}

/// Factory function to create an HTTP delivery provider for one network.
///
/// Configuration parameters:
/// - `api_key` (optional): sent as the `x-api-key` header
pub fn create_http_delivery(
	config: &toml::Value,
	network: &NetworkConfig,
) -> Result<Box<dyn DeliveryInterface>, DeliveryError> {
	HttpDeliverySchema
		.validate(config)
		.map_err(|e| DeliveryError::Network(format!("Invalid configuration: {}", e)))?;

	let api_key = config.get("api_key").and_then(|v| v.as_str());
	Ok(Box::new(HttpDelivery::new(&network.api_url, api_key)?))
}

/// Registry for the HTTP delivery implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "http";
	type Factory = DeliveryFactory;

	fn factory() -> Self::Factory {
		create_http_delivery
	}
}

impl DeliveryRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_bare_txid_accepted() {
		let txid = parse_broadcast_response(StatusCode::OK, "\"0xABC\"").unwrap();
		assert_eq!(txid.as_str(), "0xabc");
	}

	#[test]
	fn test_txid_object_accepted() {
		let txid = parse_broadcast_response(StatusCode::OK, r#"{"txid":"0xabc"}"#).unwrap();
		assert_eq!(txid, TransactionId::new("0xabc"));
	}

	#[test]
	fn test_error_field_wins_over_success_status() {
		let err = parse_broadcast_response(
			StatusCode::OK,
			r#"{"error":"transaction rejected","reason":"FeeTooLow","txid":"0xabc"}"#,
		)
		.unwrap_err();
		match err {
			DeliveryError::Rejected { error, reason } => {
				assert_eq!(error, "transaction rejected");
				assert_eq!(reason.as_deref(), Some("FeeTooLow"));
			}
			other => panic!("unexpected error {:?}", other),
		}
	}

	#[test]
	fn test_http_failure_without_error_field() {
		let err = parse_broadcast_response(StatusCode::BAD_GATEWAY, "upstream down").unwrap_err();
		assert!(matches!(err, DeliveryError::Network(msg) if msg.contains("502")));
	}

	#[test]
	fn test_factory_trims_trailing_slash() {
		let network = NetworkConfig {
			api_url: "https://api.testnet.example/".to_string(),
		};
		let config: toml::Value = toml::from_str("api_key = \"secret\"").unwrap();
		assert!(create_http_delivery(&config, &network).is_ok());

		let delivery = HttpDelivery::new(&network.api_url, None).unwrap();
		assert_eq!(
			delivery.url("/v2/info"),
			"https://api.testnet.example/v2/info"
		);
	}

	#[test]
	fn test_factory_rejects_blank_api_key() {
		let network = NetworkConfig {
			api_url: "https://api.testnet.example".to_string(),
		};
		let config: toml::Value = toml::from_str("api_key = \"  \"").unwrap();
		assert!(create_http_delivery(&config, &network).is_err());
	}
}
