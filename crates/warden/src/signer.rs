//! Key material of the wallet.

use crate::error::{Result, WardenError};
use alloy_consensus::TxEnvelope;
use alloy_dyn_abi::TypedData;
use alloy_network::{Ethereum, EthereumWallet, NetworkWallet};
use alloy_primitives::{Address, B256, Signature, hex::FromHex};
use alloy_rpc_types::TransactionRequest;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum PrivateKeyError {
    #[error("Failed to create wallet from private key. Private key is invalid hex")]
    InvalidHex,
    #[error(
        "Failed to create wallet from private key. Invalid private key. But env var {0} exists. Is the `$` anchor missing?"
    )]
    ExistsAsEnvVar(String),
    #[error("Failed to create wallet from private key: {0}")]
    InvalidKey(String),
}

fn ensure_pk_not_env(pk: &str) -> Result<(), PrivateKeyError> {
    if !pk.starts_with("0x") && std::env::var(pk).is_ok() {
        return Err(PrivateKeyError::ExistsAsEnvVar(pk.to_string()));
    }
    Ok(())
}

/// Parses a hex private key, with or without `0x` prefix.
pub fn parse_private_key(private_key_str: &str) -> Result<PrivateKeySigner, PrivateKeyError> {
    let Ok(private_key) = B256::from_hex(private_key_str.trim()) else {
        ensure_pk_not_env(private_key_str)?;
        return Err(PrivateKeyError::InvalidHex);
    };
    PrivateKeySigner::from_bytes(&private_key).map_err(|err| {
        if let Err(env_err) = ensure_pk_not_env(private_key_str) {
            return env_err;
        }
        PrivateKeyError::InvalidKey(err.to_string())
    })
}

/// Signing operations the pipeline needs from the wallet's key material.
///
/// Signatures are only ever produced for accounts returned by [`Keyring::accounts`].
#[async_trait::async_trait]
pub trait Keyring: Send + Sync {
    fn accounts(&self) -> Vec<Address>;

    fn has_account(&self, account: Address) -> bool {
        self.accounts().contains(&account)
    }

    /// EIP-191 personal message signature.
    async fn sign_message(&self, account: Address, message: &[u8]) -> Result<Signature>;

    /// EIP-712 signature.
    async fn sign_typed_data(&self, account: Address, data: &TypedData) -> Result<Signature>;

    /// Signs a fully populated request.
    async fn sign_transaction(&self, account: Address, tx: TransactionRequest) -> Result<TxEnvelope>;
}

/// [`Keyring`] backed by in-memory private keys.
#[derive(Clone, Debug, Default)]
pub struct LocalKeyring {
    signers: BTreeMap<Address, PrivateKeySigner>,
}

impl LocalKeyring {
    pub fn new(signers: impl IntoIterator<Item = PrivateKeySigner>) -> Self {
        Self { signers: signers.into_iter().map(|s| (s.address(), s)).collect() }
    }

    pub fn from_private_key(private_key: &str) -> Result<Self, PrivateKeyError> {
        Ok(Self::new([parse_private_key(private_key)?]))
    }

    fn signer(&self, account: Address) -> Result<&PrivateKeySigner> {
        self.signers.get(&account).ok_or(WardenError::UnknownAccount(account))
    }
}

#[async_trait::async_trait]
impl Keyring for LocalKeyring {
    fn accounts(&self) -> Vec<Address> {
        self.signers.keys().copied().collect()
    }

    fn has_account(&self, account: Address) -> bool {
        self.signers.contains_key(&account)
    }

    async fn sign_message(&self, account: Address, message: &[u8]) -> Result<Signature> {
        Ok(self.signer(account)?.sign_message(message).await?)
    }

    async fn sign_typed_data(&self, account: Address, data: &TypedData) -> Result<Signature> {
        Ok(self.signer(account)?.sign_dynamic_typed_data(data).await?)
    }

    async fn sign_transaction(&self, account: Address, tx: TransactionRequest) -> Result<TxEnvelope> {
        let wallet = EthereumWallet::new(self.signer(account)?.clone());
        let typed = tx.build_typed_tx().map_err(|tx| {
            WardenError::IncompleteTransaction(format!(
                "missing fields (nonce: {:?}, gas: {:?}, chain: {:?})",
                tx.nonce, tx.gas, tx.chain_id
            ))
        })?;
        Ok(NetworkWallet::<Ethereum>::sign_transaction_from(&wallet, account, typed).await?)
    }
}
