//! JSON-RPC and provider error bindings
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{borrow::Cow, fmt};

/// Represents an error returned to the requesting page.
///
/// This is the only error shape that ever crosses the dapp boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RpcError {
    pub code: ErrorCode,
    /// error message
    pub message: Cow<'static, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcError {
    /// New [`RpcError`] with the given [`ErrorCode`].
    pub const fn new(code: ErrorCode) -> Self {
        Self { message: Cow::Borrowed(code.message()), code, data: None }
    }

    /// New [`RpcError`] with the given [`ErrorCode`] and a custom message.
    pub fn with_message<M>(code: ErrorCode, message: M) -> Self
    where
        M: Into<String>,
    {
        Self { code, message: message.into().into(), data: None }
    }

    /// Creates a new `ParseError` error.
    pub const fn parse_error() -> Self {
        Self::new(ErrorCode::ParseError)
    }

    /// Creates a new `InvalidRequest` error.
    pub const fn invalid_request() -> Self {
        Self::new(ErrorCode::InvalidRequest)
    }

    /// Creates a new `InternalError` error.
    pub const fn internal_error() -> Self {
        Self::new(ErrorCode::InternalError)
    }

    /// Creates a new `InvalidParams` error.
    pub fn invalid_params<M>(message: M) -> Self
    where
        M: Into<String>,
    {
        Self::with_message(ErrorCode::InvalidParams, message)
    }

    /// Creates a new `InternalError` error with a message.
    pub fn internal_error_with<M>(message: M) -> Self
    where
        M: Into<String>,
    {
        Self::with_message(ErrorCode::InternalError, message)
    }

    /// The user rejected the request.
    pub fn user_rejected<M>(message: M) -> Self
    where
        M: Into<String>,
    {
        Self::with_message(ErrorCode::UserRejectedRequest, message)
    }

    /// The requested method and/or account has not been authorized by the user.
    pub const fn unauthorized() -> Self {
        Self::new(ErrorCode::Unauthorized)
    }

    /// The provider does not support the requested method.
    pub fn unsupported_method(method: &str) -> Self {
        Self::with_message(
            ErrorCode::UnsupportedMethod,
            format!("The provider does not support the requested method: {method}"),
        )
    }

    /// The requested chain has not been added or is not supported by the wallet.
    pub const fn unrecognized_chain() -> Self {
        Self::new(ErrorCode::UnrecognizedChain)
    }

    /// Returns `true` if this error reports a user rejection.
    pub const fn is_user_rejection(&self) -> bool {
        matches!(self.code, ErrorCode::UserRejectedRequest)
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.message(), self.message)
    }
}

impl std::error::Error for RpcError {}

/// List of JSON-RPC, EIP-1193, EIP-3085 and EIP-5792 error codes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Server received Invalid JSON.
    /// server side error while parsing JSON
    ParseError,
    /// send invalid request object.
    InvalidRequest,
    /// method does not exist or valid
    MethodNotFound,
    /// invalid method parameter.
    InvalidParams,
    /// internal call error
    InternalError,
    /// The user rejected the request, see [EIP-1193](https://eips.ethereum.org/EIPS/eip-1193#provider-errors)
    UserRejectedRequest,
    /// The requested method and/or account has not been authorized by the user.
    Unauthorized,
    /// The provider does not support the requested method.
    UnsupportedMethod,
    /// The provider is disconnected from all chains.
    Disconnected,
    /// The provider is not connected to the requested chain.
    ChainDisconnected,
    /// Unrecognized chain id, see [EIP-3085](https://eips.ethereum.org/EIPS/eip-3085)
    UnrecognizedChain,
    /// EIP-5792: the wallet does not support a capability that was not marked optional.
    UnsupportedNonOptionalCapability,
    /// EIP-5792: the wallet does not support the requested chain id.
    UnsupportedChainId,
    /// EIP-5792: a batch with the same id already exists.
    DuplicateId,
    /// EIP-5792: the batch id is unknown or has not been submitted.
    UnknownBundleId,
    /// EIP-5792: the batch is too large for the wallet to process.
    BundleTooLarge,
    /// EIP-5792: the wallet rejected the upgrade to an atomic-capable account.
    AtomicReadyWalletRejectedUpgrade,
    /// EIP-5792: the wallet cannot execute the batch atomically.
    AtomicityNotSupported,
    /// Used for server specific errors.
    ServerError(i64),
}

impl ErrorCode {
    /// Returns the error code as `i64`
    pub const fn code(&self) -> i64 {
        match *self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::UserRejectedRequest => 4001,
            Self::Unauthorized => 4100,
            Self::UnsupportedMethod => 4200,
            Self::Disconnected => 4900,
            Self::ChainDisconnected => 4901,
            Self::UnrecognizedChain => 4902,
            Self::UnsupportedNonOptionalCapability => 5700,
            Self::UnsupportedChainId => 5710,
            Self::DuplicateId => 5720,
            Self::UnknownBundleId => 5730,
            Self::BundleTooLarge => 5740,
            Self::AtomicReadyWalletRejectedUpgrade => 5750,
            Self::AtomicityNotSupported => 5760,
            Self::ServerError(c) => c,
        }
    }

    /// Returns the message associated with the error
    pub const fn message(&self) -> &'static str {
        match *self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
            Self::UserRejectedRequest => "User rejected the request",
            Self::Unauthorized => "The requested account and/or method has not been authorized",
            Self::UnsupportedMethod => "The provider does not support the requested method",
            Self::Disconnected => "The provider is disconnected from all chains",
            Self::ChainDisconnected => "The provider is not connected to the requested chain",
            Self::UnrecognizedChain => "Unrecognized chain ID",
            Self::UnsupportedNonOptionalCapability => "Unsupported non-optional capability",
            Self::UnsupportedChainId => "Unsupported chain ID",
            Self::DuplicateId => "Duplicate batch ID",
            Self::UnknownBundleId => "Unknown bundle ID",
            Self::BundleTooLarge => "Batch too large",
            Self::AtomicReadyWalletRejectedUpgrade => "Atomic-ready wallet rejected upgrade",
            Self::AtomicityNotSupported => "Atomicity not supported",
            Self::ServerError(_) => "Server error",
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(self.code())
    }
}

impl<'a> Deserialize<'a> for ErrorCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'a>,
    {
        i64::deserialize(deserializer).map(Into::into)
    }
}

impl From<i64> for ErrorCode {
    fn from(code: i64) -> Self {
        match code {
            -32700 => Self::ParseError,
            -32600 => Self::InvalidRequest,
            -32601 => Self::MethodNotFound,
            -32602 => Self::InvalidParams,
            -32603 => Self::InternalError,
            4001 => Self::UserRejectedRequest,
            4100 => Self::Unauthorized,
            4200 => Self::UnsupportedMethod,
            4900 => Self::Disconnected,
            4901 => Self::ChainDisconnected,
            4902 => Self::UnrecognizedChain,
            5700 => Self::UnsupportedNonOptionalCapability,
            5710 => Self::UnsupportedChainId,
            5720 => Self::DuplicateId,
            5730 => Self::UnknownBundleId,
            5740 => Self::BundleTooLarge,
            5750 => Self::AtomicReadyWalletRejectedUpgrade,
            5760 => Self::AtomicityNotSupported,
            _ => Self::ServerError(code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_code_as_integer() {
        let err = RpcError::unrecognized_chain();
        let value = serde_json::to_value(&err).unwrap();
        similar_asserts::assert_eq!(
            value,
            json!({ "code": 4902, "message": "Unrecognized chain ID" })
        );
    }

    #[test]
    fn unknown_codes_are_server_errors() {
        let err: RpcError =
            serde_json::from_value(json!({ "code": -32000, "message": "nonce too low" })).unwrap();
        assert_eq!(err.code, ErrorCode::ServerError(-32000));
        assert_eq!(err.code.code(), -32000);
    }

    #[test]
    fn provider_codes_parse_back() {
        for code in [4001, 4100, 4200, 4900, 4901, 4902, 5700, 5710, 5720, 5730, 5740, 5750, 5760]
        {
            let parsed = ErrorCode::from(code);
            assert!(!matches!(parsed, ErrorCode::ServerError(_)), "{code} should be known");
            assert_eq!(parsed.code(), code);
        }
    }

    #[test]
    fn detects_user_rejection() {
        assert!(RpcError::user_rejected("denied").is_user_rejection());
        assert!(!RpcError::unauthorized().is_user_rejection());
    }
}
