//! Transaction preparation, signing and submission.

use crate::{
    delegation::DelegationChecker,
    error::{Result, TransactionFlowError, WardenError},
    provider::ChainClients,
    signer::Keyring,
};
use alloy_eips::Encodable2718;
use alloy_primitives::{Address, Bytes, ChainId, TxHash};
use alloy_rpc_types::TransactionRequest;
use std::{fmt, sync::Arc};
use warden_core::{
    chain::is_supported,
    delegation::{DelegationMode, DelegationResult},
};

/// Where a signed transaction is broadcast.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SubmitRoute {
    /// The chain's public RPC endpoint.
    #[default]
    Public,
    /// A private relay.
    Private,
}

/// Input of [`TransactionService::prepare`].
#[derive(Clone, Debug)]
pub struct PrepareRequest {
    pub account: Address,
    pub chain_id: ChainId,
    pub request: TransactionRequest,
    pub submit_via_private_rpc: bool,
    pub delegation_mode: DelegationMode,
}

impl PrepareRequest {
    /// A request as issued by a dapp, always public and with delegation lookup.
    pub fn dapp(account: Address, chain_id: ChainId, request: TransactionRequest) -> Self {
        Self {
            account,
            chain_id,
            request,
            submit_via_private_rpc: false,
            delegation_mode: DelegationMode::Auto,
        }
    }
}

/// A transaction with every field resolved, ready to sign.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedTransaction {
    pub chain_id: ChainId,
    pub account: Address,
    /// Resolved once during preparation and never read again.
    pub nonce: u64,
    pub request: TransactionRequest,
    pub route: SubmitRoute,
    pub delegation: DelegationResult,
}

/// A signed transaction. Owned by the caller, the service keeps no copy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    pub prepared: PreparedTransaction,
    /// EIP-2718 encoded transaction.
    pub raw: Bytes,
    pub hash: TxHash,
}

/// Prepares, signs and broadcasts transactions for the wallet's accounts.
#[derive(Clone)]
pub struct TransactionService {
    clients: ChainClients,
    keyring: Arc<dyn Keyring>,
    delegation: DelegationChecker,
}

impl fmt::Debug for TransactionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionService")
            .field("clients", &self.clients)
            .field("accounts", &self.keyring.accounts())
            .finish_non_exhaustive()
    }
}

impl TransactionService {
    pub fn new(clients: ChainClients, keyring: Arc<dyn Keyring>, delegation: DelegationChecker) -> Self {
        Self { clients, keyring, delegation }
    }

    pub fn keyring(&self) -> &Arc<dyn Keyring> {
        &self.keyring
    }

    pub fn clients(&self) -> &ChainClients {
        &self.clients
    }

    /// Reads the pending nonce of `account`. Never cached, concurrent requests would collide.
    pub async fn resolve_nonce(&self, account: Address, chain_id: ChainId) -> Result<u64> {
        self.clients.require(chain_id)?.pending_nonce(account).await
    }

    /// Fills every field the signer needs. Fails without returning a partial transaction.
    pub async fn prepare(&self, prepare: PrepareRequest) -> Result<PreparedTransaction> {
        let PrepareRequest { account, chain_id, mut request, submit_via_private_rpc, delegation_mode } =
            prepare;

        if !is_supported(chain_id) {
            return Err(WardenError::UnsupportedChain(chain_id));
        }
        if !self.keyring.has_account(account) {
            return Err(WardenError::UnknownAccount(account));
        }
        if let Some(from) = request.from
            && from != account
        {
            return Err(WardenError::SenderMismatch { from, account });
        }
        if let Some(got) = request.chain_id
            && got != chain_id
        {
            return Err(WardenError::ChainMismatch { expected: chain_id, got });
        }
        let client = self.clients.require(chain_id)?;

        let delegation = match delegation_mode {
            DelegationMode::Auto => self.delegation.get_is_address_delegated(account, chain_id).await?,
            DelegationMode::Disabled => DelegationResult::not_delegated(),
        };

        request.from = Some(account);
        request.chain_id = Some(chain_id);
        let nonce = match request.nonce {
            Some(nonce) => nonce,
            None => client.pending_nonce(account).await?,
        };
        request.nonce = Some(nonce);

        if request.gas_price.is_none()
            && (request.max_fee_per_gas.is_none() || request.max_priority_fee_per_gas.is_none())
        {
            let estimate = client.estimate_fees().await?;
            request.max_fee_per_gas.get_or_insert(estimate.max_fee_per_gas);
            request.max_priority_fee_per_gas.get_or_insert(estimate.max_priority_fee_per_gas);
        }
        if request.gas.is_none() {
            request.gas = Some(client.estimate_gas(&request).await?);
        }

        let route = if submit_via_private_rpc && self.clients.private(chain_id).is_some() {
            SubmitRoute::Private
        } else {
            SubmitRoute::Public
        };

        trace!(
            target: "tx",
            %account,
            chain_id,
            nonce,
            ?route,
            delegated = delegation.is_delegated(),
            "prepared transaction"
        );
        Ok(PreparedTransaction { chain_id, account, nonce, request, route, delegation })
    }

    /// Prepares several transactions that must land in order.
    ///
    /// The base nonce is read once and call `i` gets `base + i`.
    pub async fn prepare_batch(
        &self,
        account: Address,
        chain_id: ChainId,
        requests: Vec<TransactionRequest>,
        delegation_mode: DelegationMode,
    ) -> Result<Vec<PreparedTransaction>> {
        let base = self.resolve_nonce(account, chain_id).await?;
        let mut prepared = Vec::with_capacity(requests.len());
        for (i, mut request) in requests.into_iter().enumerate() {
            request.nonce = Some(base + i as u64);
            prepared.push(
                self.prepare(PrepareRequest {
                    account,
                    chain_id,
                    request,
                    submit_via_private_rpc: false,
                    delegation_mode,
                })
                .await?,
            );
        }
        Ok(prepared)
    }

    /// Signs a prepared transaction with the nonce it already carries.
    pub async fn sign(&self, prepared: PreparedTransaction) -> Result<SignedTransaction> {
        let envelope = self.keyring.sign_transaction(prepared.account, prepared.request.clone()).await?;
        let raw = Bytes::from(envelope.encoded_2718());
        let hash = *envelope.tx_hash();
        debug!(target: "tx", %hash, chain_id = prepared.chain_id, nonce = prepared.nonce, "signed");
        Ok(SignedTransaction { prepared, raw, hash })
    }

    /// Broadcasts a signed transaction on its route.
    pub async fn submit(&self, signed: &SignedTransaction) -> Result<TxHash> {
        let chain_id = signed.prepared.chain_id;
        let client = match signed.prepared.route {
            SubmitRoute::Public => self.clients.require(chain_id)?,
            SubmitRoute::Private => {
                self.clients.private(chain_id).ok_or(WardenError::MissingClient(chain_id))?
            }
        };
        let hash = client.send_raw_transaction(&signed.raw).await?;
        debug!(target: "tx", %hash, chain_id, route = ?signed.prepared.route, "submitted transaction");
        Ok(hash)
    }
}

/// Prepares and signs a transaction a dapp asked for.
///
/// Dapp transactions never go through a private relay and always consult the delegation state.
/// Failures carry the function name and chain, and are final for this request.
pub async fn prepare_and_sign_dapp_transaction(
    service: &TransactionService,
    account: Address,
    chain_id: ChainId,
    request: TransactionRequest,
    on_success: Option<&(dyn Fn(&SignedTransaction) + Send + Sync)>,
) -> Result<SignedTransaction, TransactionFlowError> {
    const FUNCTION: &str = "prepare_and_sign_dapp_transaction";

    let result = async {
        let prepared = service.prepare(PrepareRequest::dapp(account, chain_id, request)).await?;
        service.sign(prepared).await
    }
    .await;

    match result {
        Ok(signed) => {
            if let Some(on_success) = on_success {
                on_success(&signed);
            }
            Ok(signed)
        }
        Err(err) => {
            let err = TransactionFlowError::new(FUNCTION, chain_id, err);
            error!(target: "tx", %err, "dapp transaction failed");
            Err(err)
        }
    }
}
