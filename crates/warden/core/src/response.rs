//! Typed responses sent back to the requesting page.

use crate::calls::{CallsStatus, WalletCapabilities};
use alloy_primitives::{Address, Bytes, TxHash};
use serde::{Deserialize, Serialize};
use warden_rpc::{error::RpcError, request::RequestId};

/// Name of the EIP-2255 permission that grants access to accounts.
pub const ETH_ACCOUNTS_PERMISSION: &str = "eth_accounts";

/// Caveat type restricting the accounts a permission reveals.
pub const RESTRICT_RETURNED_ACCOUNTS: &str = "restrictReturnedAccounts";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caveat {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: serde_json::Value,
}

/// A permission as described by [EIP-2255](https://eips.ethereum.org/EIPS/eip-2255).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    /// Origin the permission was granted to.
    pub invoker: String,
    pub parent_capability: String,
    pub caveats: Vec<Caveat>,
    /// Unix time in milliseconds.
    pub date: u64,
}

impl Permission {
    /// The `eth_accounts` permission of a dapp connected to `account`.
    pub fn eth_accounts(invoker: impl Into<String>, account: Address, date: u64) -> Self {
        Self {
            invoker: invoker.into(),
            parent_capability: ETH_ACCOUNTS_PERMISSION.to_string(),
            caveats: vec![Caveat {
                kind: RESTRICT_RETURNED_ACCOUNTS.to_string(),
                value: serde_json::json!([account]),
            }],
            date,
        }
    }
}

/// Payload of a [`DappResponse`], one variant per request kind plus the error variant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum DappResponseKind {
    ChainChangeResponse {
        provider_url: String,
        /// Hex encoded, dapps compare this string against their own hex ids.
        chain_id: String,
    },
    SendTransactionResponse {
        transaction_hash: TxHash,
    },
    SignTransactionResponse {
        signed_transaction: Bytes,
    },
    SignMessageResponse {
        signature: Bytes,
    },
    SignTypedDataResponse {
        signature: Bytes,
    },
    SendCallsResponse {
        id: String,
    },
    GetCallsStatusResponse {
        status: CallsStatus,
    },
    AccountResponse {
        connected_address: Address,
        chain_id: String,
        provider_url: String,
    },
    GetPermissionsResponse {
        permissions: Vec<Permission>,
    },
    RevokePermissionsResponse,
    UniswapOpenSidebarResponse,
    GetCapabilitiesResponse {
        capabilities: WalletCapabilities,
    },
    GetAccountsResponse {
        accounts: Vec<Address>,
    },
    GetChainIdResponse {
        chain_id: String,
    },
    ErrorResponse {
        error: RpcError,
    },
}

/// The single response emitted for a dapp request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DappResponse {
    pub request_id: RequestId,
    #[serde(flatten)]
    pub kind: DappResponseKind,
}

impl DappResponse {
    pub fn new(request_id: RequestId, kind: DappResponseKind) -> Self {
        Self { request_id, kind }
    }

    pub fn error(request_id: RequestId, error: RpcError) -> Self {
        Self::new(request_id, DappResponseKind::ErrorResponse { error })
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, DappResponseKind::ErrorResponse { .. })
    }

    /// The error carried by an `ErrorResponse`.
    pub fn as_error(&self) -> Option<&RpcError> {
        match &self.kind {
            DappResponseKind::ErrorResponse { error } => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use serde_json::json;

    #[test]
    fn chain_change_wire_format() {
        let resp = DappResponse::new(
            "req-1".into(),
            DappResponseKind::ChainChangeResponse {
                provider_url: "https://rpc.example".to_string(),
                chain_id: "0x89".to_string(),
            },
        );
        similar_asserts::assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({
                "type": "ChainChangeResponse",
                "requestId": "req-1",
                "providerUrl": "https://rpc.example",
                "chainId": "0x89",
            })
        );
    }

    #[test]
    fn error_wire_format() {
        let resp = DappResponse::error("7".into(), RpcError::unrecognized_chain());
        assert!(resp.is_error());
        similar_asserts::assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({
                "type": "ErrorResponse",
                "requestId": "7",
                "error": { "code": 4902, "message": "Unrecognized chain ID" },
            })
        );
        let back: DappResponse = serde_json::from_value(serde_json::to_value(&resp).unwrap()).unwrap();
        assert_eq!(back, resp);
    }

    #[test]
    fn unit_responses_only_carry_type() {
        let resp = DappResponse::new("a".into(), DappResponseKind::RevokePermissionsResponse);
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({ "type": "RevokePermissionsResponse", "requestId": "a" })
        );
    }

    #[test]
    fn eth_accounts_permission() {
        let account = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        let permission = Permission::eth_accounts("https://app.example.com", account, 1_700_000_000_000);
        let value = serde_json::to_value(&permission).unwrap();
        assert_eq!(value["parentCapability"], "eth_accounts");
        assert_eq!(value["caveats"][0]["type"], "restrictReturnedAccounts");
        assert_eq!(value["caveats"][0]["value"], json!([account]));
    }
}
