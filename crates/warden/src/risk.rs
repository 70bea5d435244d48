//! Risk scanning against the Blockaid JSON-RPC scanner.

use crate::config::BlockaidConfig;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use warden_core::scan::RiskScanRequest;

/// Path of the EVM JSON-RPC scan endpoint.
const JSON_RPC_SCAN_PATH: &str = "v0/evm/json-rpc/scan";

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("scanner responded with {0}")]
    Status(StatusCode),
    #[error("invalid scanner url: {0}")]
    Url(#[from] url::ParseError),
}

/// Classification of a scanned request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "camelCase")]
pub enum ScanVerdict {
    Benign,
    Warning { reason: String },
    Malicious { reason: String },
    /// The scanner could not classify the request.
    Error,
    /// The scanner was not reachable or not configured, nothing is known about the request.
    Unavailable,
}

impl ScanVerdict {
    pub fn is_malicious(&self) -> bool {
        matches!(self, Self::Malicious { .. })
    }
}

#[async_trait::async_trait]
pub trait RiskScanner: Send + Sync {
    async fn scan(&self, request: &RiskScanRequest) -> Result<ScanVerdict, ScanError>;
}

#[derive(Debug, Deserialize)]
struct ScanResponse {
    validation: Option<Validation>,
}

#[derive(Debug, Deserialize)]
struct Validation {
    result_type: String,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl From<ScanResponse> for ScanVerdict {
    fn from(response: ScanResponse) -> Self {
        let Some(validation) = response.validation else { return Self::Error };
        let reason = validation
            .description
            .filter(|d| !d.is_empty())
            .or(validation.reason)
            .unwrap_or_default();
        match validation.result_type.as_str() {
            "Benign" => Self::Benign,
            "Warning" => Self::Warning { reason },
            "Malicious" => Self::Malicious { reason },
            _ => Self::Error,
        }
    }
}

/// HTTP client of the Blockaid scanner.
#[derive(Clone, Debug)]
pub struct BlockaidClient {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl BlockaidClient {
    pub fn new(config: &BlockaidConfig) -> Result<Self, ScanError> {
        let mut base = Url::parse(&config.base_url)?;
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        let client = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { client, endpoint: base.join(JSON_RPC_SCAN_PATH)?, api_key: config.api_key.clone() })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl RiskScanner for BlockaidClient {
    async fn scan(&self, request: &RiskScanRequest) -> Result<ScanVerdict, ScanError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header("X-API-KEY", &self.api_key)
            .json(request)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Status(status));
        }
        let verdict = ScanVerdict::from(response.json::<ScanResponse>().await?);
        trace!(target: "risk", ?verdict, method = %request.data.method, "scanned request");
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use axum::{Json, Router, http::HeaderMap, routing::post};
    use serde_json::{Value, json};
    use warden_core::scan::{ScanParams, build_blockaid_scan_json_rpc_request};

    fn verdict(value: Value) -> ScanVerdict {
        serde_json::from_value::<ScanResponse>(value).unwrap().into()
    }

    #[test]
    fn maps_result_types() {
        assert_eq!(verdict(json!({ "validation": { "result_type": "Benign" } })), ScanVerdict::Benign);
        assert_eq!(
            verdict(json!({
                "validation": { "result_type": "Malicious", "reason": "raw_ether_transfer", "description": "" }
            })),
            ScanVerdict::Malicious { reason: "raw_ether_transfer".to_string() }
        );
        assert_eq!(
            verdict(json!({ "validation": { "result_type": "Warning", "description": "new address" } })),
            ScanVerdict::Warning { reason: "new address".to_string() }
        );
        assert_eq!(verdict(json!({ "validation": { "result_type": "Error" } })), ScanVerdict::Error);
        assert_eq!(verdict(json!({})), ScanVerdict::Error);
    }

    #[test]
    fn joins_endpoint() {
        let config = BlockaidConfig {
            api_key: "key".to_string(),
            base_url: "https://api.blockaid.io".to_string(),
        };
        let client = BlockaidClient::new(&config).unwrap();
        assert_eq!(client.endpoint().as_str(), "https://api.blockaid.io/v0/evm/json-rpc/scan");
    }

    #[tokio::test]
    async fn posts_scan_with_api_key() {
        async fn scan(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
            assert_eq!(headers.get("X-API-KEY").unwrap(), "secret");
            assert_eq!(body["options"], json!(["validation", "simulation"]));
            Json(json!({ "validation": { "result_type": "Malicious", "description": "drainer" } }))
        }

        let app = Router::new().route("/v0/evm/json-rpc/scan", post(scan));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });

        let client = BlockaidClient::new(&BlockaidConfig {
            api_key: "secret".to_string(),
            base_url: format!("http://{addr}"),
        })
        .unwrap();
        let params = json!(["0x68656c6c6f"]);
        let request = build_blockaid_scan_json_rpc_request(ScanParams {
            chain_id: 1,
            account: address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"),
            method: "personal_sign",
            params: &params,
            dapp_url: "https://evil.example",
        });
        let verdict = client.scan(&request).await.unwrap();
        assert!(verdict.is_malicious());
    }
}
