//! Errors of the gateway services and their mapping to provider errors.

use alloy_primitives::{Address, ChainId};
use alloy_transport::TransportError;
use warden_rpc::error::{ErrorCode, RpcError};

pub(crate) type Result<T, E = WardenError> = std::result::Result<T, E>;

/// Errors raised while serving a dapp request.
#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    /// An error that already has its provider shape.
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("unsupported chain id {0}")]
    UnsupportedChain(ChainId),
    #[error("no rpc client configured for chain {0}")]
    MissingClient(ChainId),
    #[error("dapp {0} is not connected")]
    NotConnected(String),
    #[error("request has no dapp origin")]
    MissingOrigin,
    #[error("wallet is locked")]
    Locked,
    #[error("account {0} is not held by the keyring")]
    UnknownAccount(Address),
    #[error("sender {from} does not match the connected account {account}")]
    SenderMismatch { from: Address, account: Address },
    #[error("chain id mismatch: expected {expected}, got {got}")]
    ChainMismatch { expected: ChainId, got: ChainId },
    #[error("user rejected the request")]
    Rejected,
    #[error("request blocked after risk scan: {0}")]
    Blocked(String),
    #[error("transaction request is incomplete: {0}")]
    IncompleteTransaction(String),
    #[error(transparent)]
    Signer(#[from] alloy_signer::Error),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Flow(#[from] TransactionFlowError),
}

impl WardenError {
    /// Converts the error into the minimal shape a dapp may observe.
    ///
    /// Internal failures collapse into a generic `-32603`, the details stay in the logs.
    pub fn to_rpc_error(&self) -> RpcError {
        match self {
            Self::Rpc(err) => err.clone(),
            Self::UnsupportedChain(_) => RpcError::unrecognized_chain(),
            Self::NotConnected(_)
            | Self::MissingOrigin
            | Self::Locked
            | Self::UnknownAccount(_)
            | Self::SenderMismatch { .. } => RpcError::unauthorized(),
            Self::ChainMismatch { .. } => RpcError::invalid_params(self.to_string()),
            Self::Rejected => RpcError::new(ErrorCode::UserRejectedRequest),
            Self::Blocked(_) => {
                RpcError::user_rejected("Request blocked: flagged as malicious by risk scan")
            }
            Self::Flow(err) => err.source.to_rpc_error(),
            Self::MissingClient(_)
            | Self::IncompleteTransaction(_)
            | Self::Signer(_)
            | Self::Transport(_) => RpcError::internal_error(),
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        match self {
            Self::Rejected | Self::Blocked(_) => true,
            Self::Rpc(err) => err.is_user_rejection(),
            Self::Flow(err) => err.source.is_user_rejection(),
            _ => false,
        }
    }
}

/// A preparation or signing failure tagged with where it happened.
///
/// Fatal for the request it belongs to, a retry needs a new request and a fresh nonce.
#[derive(Debug, thiserror::Error)]
#[error("{function} failed on chain {chain_id}: {source}")]
pub struct TransactionFlowError {
    pub function: &'static str,
    pub chain_id: ChainId,
    #[source]
    pub source: Box<WardenError>,
}

impl TransactionFlowError {
    pub fn new(function: &'static str, chain_id: ChainId, source: WardenError) -> Self {
        Self { function, chain_id, source: Box::new(source) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn maps_to_provider_errors() {
        assert_eq!(WardenError::UnsupportedChain(5).to_rpc_error().code, ErrorCode::UnrecognizedChain);
        assert_eq!(WardenError::Locked.to_rpc_error().code, ErrorCode::Unauthorized);
        assert_eq!(WardenError::Rejected.to_rpc_error().code, ErrorCode::UserRejectedRequest);

        let internal = WardenError::IncompleteTransaction("missing gas".into()).to_rpc_error();
        assert_eq!(internal, RpcError::internal_error());
    }

    #[test]
    fn flow_errors_keep_context_and_inner_code() {
        let account = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        let err = TransactionFlowError::new(
            "prepare_and_sign_dapp_transaction",
            137,
            WardenError::UnknownAccount(account),
        );
        assert!(err.to_string().starts_with("prepare_and_sign_dapp_transaction failed on chain 137"));

        let err = WardenError::from(err);
        assert_eq!(err.to_rpc_error().code, ErrorCode::Unauthorized);
        assert!(!err.is_user_rejection());
    }
}
