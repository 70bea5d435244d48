//! Typed dapp requests.

use crate::{
    calls::{GetCapabilitiesParams, SendCallsParams},
    chain::{is_supported, parse_hex_chain_id},
    serde_helpers::{lenient_params, message_payload, optional_sequence, sequence, typed_data},
};
use alloy_dyn_abi::TypedData;
use alloy_primitives::{Address, Bytes, ChainId};
use alloy_rpc_types::TransactionRequest;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use warden_rpc::{
    error::RpcError,
    request::{RequestId, RpcCall},
};

/// Params of `wallet_switchEthereumChain` and `wallet_addEthereumChain`.
///
/// Only the chain id is read, the metadata `wallet_addEthereumChain` carries is ignored since
/// only registry chains can be selected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainChangeParams {
    pub chain_id: String,
}

impl ChainChangeParams {
    /// The requested chain, if it parses and is part of the registry.
    pub fn updated_chain_id(&self) -> Option<ChainId> {
        parse_hex_chain_id(&self.chain_id).filter(|id| is_supported(*id))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenSidebarParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab: Option<String>,
}

/// Method-specific payload of a dapp request, keyed by the RPC method name.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum DappRequestKind {
    #[serde(
        rename = "wallet_switchEthereumChain",
        alias = "wallet_addEthereumChain",
        with = "sequence"
    )]
    ChangeChain(ChainChangeParams),

    #[serde(rename = "eth_sendTransaction", with = "sequence")]
    SendTransaction(Box<TransactionRequest>),

    #[serde(rename = "eth_signTransaction", with = "sequence")]
    SignTransaction(Box<TransactionRequest>),

    /// `personal_sign`: message first, then the signing account.
    #[serde(rename = "personal_sign")]
    SignMessage(#[serde(with = "message_payload")] Bytes, Address),

    #[serde(rename = "eth_signTypedData_v4", alias = "eth_signTypedData")]
    SignTypedData(Address, #[serde(with = "typed_data")] Box<TypedData>),

    #[serde(rename = "wallet_sendCalls", with = "sequence")]
    SendCalls(Box<SendCallsParams>),

    #[serde(rename = "wallet_getCallsStatus", with = "sequence")]
    GetCallsStatus(String),

    #[serde(
        rename = "eth_requestAccounts",
        alias = "wallet_requestPermissions",
        with = "lenient_params"
    )]
    RequestAccount(()),

    #[serde(rename = "wallet_getPermissions", with = "lenient_params")]
    GetPermissions(()),

    #[serde(rename = "wallet_revokePermissions", with = "lenient_params")]
    RevokePermissions(()),

    #[serde(rename = "uniswap_openSidebar", with = "optional_sequence")]
    UniswapOpenSidebar(Option<OpenSidebarParams>),

    #[serde(rename = "wallet_getCapabilities")]
    GetCapabilities(GetCapabilitiesParams),

    #[serde(rename = "eth_accounts", with = "lenient_params")]
    GetAccounts(()),

    #[serde(rename = "eth_chainId", with = "lenient_params")]
    GetChainId(()),
}

impl DappRequestKind {
    pub const fn request_type(&self) -> DappRequestType {
        match self {
            Self::ChangeChain(_) => DappRequestType::ChangeChain,
            Self::SendTransaction(_) => DappRequestType::SendTransaction,
            Self::SignTransaction(_) => DappRequestType::SignTransaction,
            Self::SignMessage(..) => DappRequestType::SignMessage,
            Self::SignTypedData(..) => DappRequestType::SignTypedData,
            Self::SendCalls(_) => DappRequestType::SendCalls,
            Self::GetCallsStatus(_) => DappRequestType::GetCallsStatus,
            Self::RequestAccount(_) => DappRequestType::RequestAccount,
            Self::GetPermissions(_) => DappRequestType::GetPermissions,
            Self::RevokePermissions(_) => DappRequestType::RevokePermissions,
            Self::UniswapOpenSidebar(_) => DappRequestType::UniswapOpenSidebar,
            Self::GetCapabilities(_) => DappRequestType::GetCapabilities,
            Self::GetAccounts(_) => DappRequestType::GetAccounts,
            Self::GetChainId(_) => DappRequestType::GetChainId,
        }
    }
}

/// Discriminant of [`DappRequestKind`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DappRequestType {
    ChangeChain,
    SendTransaction,
    SignTransaction,
    SignMessage,
    SignTypedData,
    SendCalls,
    GetCallsStatus,
    RequestAccount,
    GetPermissions,
    RevokePermissions,
    UniswapOpenSidebar,
    GetCapabilities,
    GetAccounts,
    GetChainId,
}

impl DappRequestType {
    /// Resolves an RPC method name, `None` for methods the wallet doesn't serve.
    pub fn from_method(method: &str) -> Option<Self> {
        Some(match method {
            "wallet_switchEthereumChain" | "wallet_addEthereumChain" => Self::ChangeChain,
            "eth_sendTransaction" => Self::SendTransaction,
            "eth_signTransaction" => Self::SignTransaction,
            "personal_sign" => Self::SignMessage,
            "eth_signTypedData_v4" | "eth_signTypedData" => Self::SignTypedData,
            "wallet_sendCalls" => Self::SendCalls,
            "wallet_getCallsStatus" => Self::GetCallsStatus,
            "eth_requestAccounts" | "wallet_requestPermissions" => Self::RequestAccount,
            "wallet_getPermissions" => Self::GetPermissions,
            "wallet_revokePermissions" => Self::RevokePermissions,
            "uniswap_openSidebar" => Self::UniswapOpenSidebar,
            "wallet_getCapabilities" => Self::GetCapabilities,
            "eth_accounts" => Self::GetAccounts,
            "eth_chainId" => Self::GetChainId,
            _ => return None,
        })
    }
}

impl fmt::Display for DappRequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A call forwarded by a dapp's injected provider that failed to parse.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid dapp request {request_id}: {error}")]
pub struct InvalidDappRequest {
    pub request_id: RequestId,
    pub error: RpcError,
}

/// A dapp request after classification.
#[derive(Clone, Debug)]
pub struct DappRequest {
    pub request_id: RequestId,
    /// Origin of the requesting page, absent when it could not be determined.
    pub dapp_url: Option<String>,
    /// The method as sent, kept for risk scanning.
    pub method: String,
    /// The params as sent, kept for risk scanning.
    pub params: serde_json::Value,
    pub kind: DappRequestKind,
}

impl DappRequest {
    /// Classifies an untyped call.
    ///
    /// Unknown methods fail with `4200`, params that don't fit the method with `-32602`.
    pub fn from_call(call: RpcCall, dapp_url: Option<String>) -> Result<Self, InvalidDappRequest> {
        let params = call.params_or_empty();
        let RpcCall { request_id, method, .. } = call;

        if DappRequestType::from_method(&method).is_none() {
            let error = RpcError::unsupported_method(&method);
            return Err(InvalidDappRequest { request_id, error });
        }

        let raw = json!({ "method": method, "params": params });
        match serde_json::from_value::<DappRequestKind>(raw) {
            Ok(kind) => Ok(Self { request_id, dapp_url, method, params, kind }),
            Err(err) => {
                let error = RpcError::invalid_params(err.to_string());
                Err(InvalidDappRequest { request_id, error })
            }
        }
    }

    pub const fn request_type(&self) -> DappRequestType {
        self.kind.request_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use warden_rpc::error::ErrorCode;

    fn parse(method: &str, params: serde_json::Value) -> Result<DappRequest, InvalidDappRequest> {
        let call = RpcCall::new("req-1", method).with_params(params);
        DappRequest::from_call(call, Some("https://app.example.com".to_string()))
    }

    #[test]
    fn parses_switch_chain() {
        let req = parse("wallet_switchEthereumChain", json!([{ "chainId": "0x89" }])).unwrap();
        let DappRequestKind::ChangeChain(params) = &req.kind else { panic!("{:?}", req.kind) };
        assert_eq!(params.updated_chain_id(), Some(137));
        assert_eq!(req.request_id.as_str(), "req-1");

        // add chain carries extra metadata
        let req = parse(
            "wallet_addEthereumChain",
            json!([{ "chainId": "0x2105", "chainName": "Base", "rpcUrls": ["https://mainnet.base.org"] }]),
        )
        .unwrap();
        assert_eq!(req.request_type(), DappRequestType::ChangeChain);
    }

    #[test]
    fn unsupported_chain_has_no_updated_id() {
        let params = ChainChangeParams { chain_id: "0x7a69".to_string() };
        assert_eq!(params.updated_chain_id(), None);
        let params = ChainChangeParams { chain_id: "137".to_string() };
        assert_eq!(params.updated_chain_id(), None);
    }

    #[test]
    fn parses_signing_requests() {
        let account = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

        let req = parse("personal_sign", json!(["0x68656c6c6f", account])).unwrap();
        let DappRequestKind::SignMessage(message, from) = req.kind else { panic!() };
        assert_eq!(message.as_ref(), b"hello");
        assert_eq!(from, account);

        let req = parse(
            "eth_sendTransaction",
            json!([{ "from": account, "to": account, "value": "0x1" }]),
        )
        .unwrap();
        let DappRequestKind::SendTransaction(tx) = req.kind else { panic!() };
        assert_eq!(tx.from, Some(account));

        let typed = json!({
            "types": {
                "EIP712Domain": [{ "name": "chainId", "type": "uint256" }],
                "Mail": [{ "name": "contents", "type": "string" }]
            },
            "primaryType": "Mail",
            "domain": { "chainId": 1 },
            "message": { "contents": "hi" }
        });
        let req = parse("eth_signTypedData_v4", json!([account, typed.to_string()])).unwrap();
        assert_eq!(req.request_type(), DappRequestType::SignTypedData);
        let req = parse("eth_signTypedData", json!([account, typed])).unwrap();
        assert_eq!(req.request_type(), DappRequestType::SignTypedData);
    }

    #[test]
    fn parses_parameterless_requests() {
        for method in ["eth_requestAccounts", "eth_accounts", "eth_chainId", "wallet_getPermissions"]
        {
            assert!(parse(method, json!([])).is_ok(), "{method}");
            assert!(parse(method, serde_json::Value::Null).is_ok(), "{method}");
        }
        let req = parse("wallet_requestPermissions", json!([{ "eth_accounts": {} }])).unwrap();
        assert_eq!(req.request_type(), DappRequestType::RequestAccount);

        let req = parse("uniswap_openSidebar", json!([{ "tab": "swap" }])).unwrap();
        let DappRequestKind::UniswapOpenSidebar(Some(params)) = req.kind else { panic!() };
        assert_eq!(params.tab.as_deref(), Some("swap"));
    }

    #[test]
    fn unknown_method_is_unsupported() {
        let err = parse("eth_mining", json!([])).unwrap_err();
        assert_eq!(err.error.code, ErrorCode::UnsupportedMethod);
        assert_eq!(err.request_id.as_str(), "req-1");
    }

    #[test]
    fn malformed_params_are_invalid() {
        let err = parse("wallet_switchEthereumChain", json!([])).unwrap_err();
        assert_eq!(err.error.code, ErrorCode::InvalidParams);

        let err = parse("personal_sign", json!(["0x00"])).unwrap_err();
        assert_eq!(err.error.code, ErrorCode::InvalidParams);
    }

    #[test]
    fn method_table_matches_serde_names() {
        assert_eq!(DappRequestType::from_method("wallet_sendCalls"), Some(DappRequestType::SendCalls));
        assert_eq!(DappRequestType::from_method("eth_sign"), None);
    }
}
