//! Request payloads for the external Blockaid JSON-RPC scanner.

use alloy_primitives::{Address, ChainId};
use serde::{Deserialize, Serialize};

/// What the scanner is asked to do with a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanOption {
    Validation,
    Simulation,
}

/// Options attached to every scan. Simulation can't be turned off from here.
pub const SCAN_OPTIONS: [ScanOption; 2] = [ScanOption::Validation, ScanOption::Simulation];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanMetadata {
    pub domain: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanData {
    pub method: String,
    pub params: serde_json::Value,
}

/// Body of a JSON-RPC scan request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskScanRequest {
    pub chain: String,
    pub account_address: Address,
    pub metadata: ScanMetadata,
    pub data: ScanData,
    pub options: Vec<ScanOption>,
}

/// Inputs of [`build_blockaid_scan_json_rpc_request`].
#[derive(Clone, Debug)]
pub struct ScanParams<'a> {
    pub chain_id: ChainId,
    pub account: Address,
    pub method: &'a str,
    pub params: &'a serde_json::Value,
    pub dapp_url: &'a str,
}

/// Assembles the scan payload for a pending signature, transaction or call batch.
///
/// Pure data assembly, no I/O happens here.
pub fn build_blockaid_scan_json_rpc_request(params: ScanParams<'_>) -> RiskScanRequest {
    let ScanParams { chain_id, account, method, params, dapp_url } = params;
    RiskScanRequest {
        chain: chain_id.to_string(),
        account_address: account,
        metadata: ScanMetadata { domain: dapp_url.to_string() },
        data: ScanData { method: method.to_string(), params: params.clone() },
        options: SCAN_OPTIONS.to_vec(),
    }
}
