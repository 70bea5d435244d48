//! Chain RPC access.

use crate::{
    config::{ConfigError, RpcEndpoint, WardenConfig},
    error::{Result, WardenError},
};
use alloy_eips::eip1559::Eip1559Estimation;
use alloy_network::ReceiptResponse;
use alloy_primitives::{Address, ChainId, TxHash, U64, hex};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types::{TransactionReceipt, TransactionRequest};
use std::{collections::HashMap, fmt, sync::Arc};
use warden_core::{
    calls::{CallReceipt, CallReceiptLog},
    chain::SupportedChain,
};

/// The calls the pipeline makes against a single chain.
#[async_trait::async_trait]
pub trait ChainClient: Send + Sync + fmt::Debug {
    fn chain_id(&self) -> ChainId;

    /// Endpoint reported to dapps as the provider url.
    fn url(&self) -> &str;

    /// `eth_getCode` at the latest block, hex encoded.
    async fn get_code(&self, address: Address) -> Result<String>;

    /// Transaction count including pending transactions.
    async fn pending_nonce(&self, address: Address) -> Result<u64>;

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64>;

    async fn estimate_fees(&self) -> Result<Eip1559Estimation>;

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TxHash>;

    async fn receipt(&self, hash: TxHash) -> Result<Option<CallReceipt>>;
}

/// Source of account bytecode for delegation checks.
#[async_trait::async_trait]
pub trait DelegationRepository: Send + Sync {
    async fn get_wallet_bytecode(&self, address: Address, chain_id: ChainId) -> Result<String>;
}

/// [`ChainClient`] over an alloy HTTP provider.
#[derive(Clone)]
pub struct RpcChainClient {
    chain_id: ChainId,
    url: String,
    provider: DynProvider,
}

impl RpcChainClient {
    /// Connects to `endpoint`, reporting its url exactly as configured.
    pub fn new(chain_id: ChainId, endpoint: RpcEndpoint) -> Self {
        let provider = ProviderBuilder::new().connect_http(endpoint.url).erased();
        Self { chain_id, url: endpoint.raw, provider }
    }
}

impl fmt::Debug for RpcChainClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcChainClient")
            .field("chain_id", &self.chain_id)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl ChainClient for RpcChainClient {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    fn url(&self) -> &str {
        &self.url
    }

    async fn get_code(&self, address: Address) -> Result<String> {
        let code = self.provider.get_code_at(address).await?;
        Ok(hex::encode_prefixed(code))
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64> {
        Ok(self.provider.get_transaction_count(address).pending().await?)
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64> {
        Ok(self.provider.estimate_gas(tx.clone()).await?)
    }

    async fn estimate_fees(&self) -> Result<Eip1559Estimation> {
        Ok(self.provider.estimate_eip1559_fees().await?)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TxHash> {
        let pending = self.provider.send_raw_transaction(raw).await?;
        Ok(*pending.tx_hash())
    }

    async fn receipt(&self, hash: TxHash) -> Result<Option<CallReceipt>> {
        let receipt = self.provider.get_transaction_receipt(hash).await?;
        Ok(receipt.map(|receipt| to_call_receipt(&receipt)))
    }
}

/// Converts an RPC receipt into the EIP-5792 receipt shape.
pub fn to_call_receipt(receipt: &TransactionReceipt) -> CallReceipt {
    let logs = receipt
        .inner
        .logs()
        .iter()
        .map(|log| CallReceiptLog {
            address: log.address(),
            data: log.data().data.clone(),
            topics: log.topics().to_vec(),
        })
        .collect();
    CallReceipt {
        logs,
        status: U64::from(receipt.status() as u8),
        block_hash: receipt.block_hash().unwrap_or_default(),
        block_number: U64::from(receipt.block_number().unwrap_or_default()),
        gas_used: U64::from(receipt.gas_used()),
        transaction_hash: receipt.transaction_hash(),
    }
}

/// Chain clients keyed by chain id, with optional private relay clients.
#[derive(Clone, Debug, Default)]
pub struct ChainClients {
    public: HashMap<ChainId, Arc<dyn ChainClient>>,
    private: HashMap<ChainId, Arc<dyn ChainClient>>,
}

impl ChainClients {
    /// Builds a client for every supported chain.
    pub fn from_config(config: &WardenConfig) -> std::result::Result<Self, ConfigError> {
        let mut clients = Self::default();
        for chain in SupportedChain::ALL {
            let id = chain.id();
            if let Some(endpoint) = config.rpc_url(id)? {
                clients = clients.with_client(Arc::new(RpcChainClient::new(id, endpoint)));
            }
            if let Some(endpoint) = config.private_rpc_url(id)? {
                clients =
                    clients.with_private_client(Arc::new(RpcChainClient::new(id, endpoint)));
            }
        }
        debug!(
            target: "provider",
            public = clients.public.len(),
            private = clients.private.len(),
            "configured chain clients"
        );
        Ok(clients)
    }

    pub fn with_client(mut self, client: Arc<dyn ChainClient>) -> Self {
        self.public.insert(client.chain_id(), client);
        self
    }

    pub fn with_private_client(mut self, client: Arc<dyn ChainClient>) -> Self {
        self.private.insert(client.chain_id(), client);
        self
    }

    pub fn get(&self, chain_id: ChainId) -> Option<&Arc<dyn ChainClient>> {
        self.public.get(&chain_id)
    }

    /// Like [`Self::get`] but fails with [`WardenError::MissingClient`].
    pub fn require(&self, chain_id: ChainId) -> Result<&Arc<dyn ChainClient>> {
        self.get(chain_id).ok_or(WardenError::MissingClient(chain_id))
    }

    pub fn private(&self, chain_id: ChainId) -> Option<&Arc<dyn ChainClient>> {
        self.private.get(&chain_id)
    }
}

#[async_trait::async_trait]
impl DelegationRepository for ChainClients {
    async fn get_wallet_bytecode(&self, address: Address, chain_id: ChainId) -> Result<String> {
        self.require(chain_id)?.get_code(address).await
    }
}
