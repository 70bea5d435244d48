use alloy_eips::eip1559::Eip1559Estimation;
use alloy_primitives::{Address, ChainId, TxHash, U64, address, keccak256};
use alloy_rpc_types::TransactionRequest;
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use warden::{
    DappApi, Session, TransactionService, WardenConfig, WardenServer,
    approval::ApprovalQueue,
    delegation::DelegationChecker,
    error::WardenError,
    provider::{ChainClient, ChainClients, DelegationRepository},
    signer::LocalKeyring,
};
use warden_core::calls::CallReceipt;

pub const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const ALICE: Address = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
pub const APP: &str = "https://app.example.com";
pub const SESSION_TOKEN: &str = "test-token";

/// A chain that accepts everything and mines instantly.
#[derive(Debug)]
pub struct MockChain {
    pub chain_id: ChainId,
    pub url: String,
    pub sent: Mutex<Vec<TxHash>>,
}

impl MockChain {
    pub fn new(chain_id: ChainId, url: &str) -> Arc<Self> {
        Arc::new(Self { chain_id, url: url.to_string(), sent: Default::default() })
    }
}

#[async_trait::async_trait]
impl ChainClient for MockChain {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    fn url(&self) -> &str {
        &self.url
    }

    async fn get_code(&self, _: Address) -> Result<String, WardenError> {
        Ok("0x".to_string())
    }

    async fn pending_nonce(&self, _: Address) -> Result<u64, WardenError> {
        Ok(self.sent.lock().len() as u64)
    }

    async fn estimate_gas(&self, _: &TransactionRequest) -> Result<u64, WardenError> {
        Ok(21_000)
    }

    async fn estimate_fees(&self) -> Result<Eip1559Estimation, WardenError> {
        Ok(Eip1559Estimation { max_fee_per_gas: 3_000_000_000, max_priority_fee_per_gas: 1_000_000 })
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TxHash, WardenError> {
        let hash = keccak256(raw);
        self.sent.lock().push(hash);
        Ok(hash)
    }

    async fn receipt(&self, hash: TxHash) -> Result<Option<CallReceipt>, WardenError> {
        Ok(self.sent.lock().contains(&hash).then(|| CallReceipt {
            logs: vec![],
            status: U64::from(1),
            block_hash: Default::default(),
            block_number: U64::from(1),
            gas_used: U64::from(21_000),
            transaction_hash: hash,
        }))
    }
}

pub struct TestServer {
    pub server: WardenServer,
    pub client: reqwest::Client,
    pub mainnet: Arc<MockChain>,
    pub polygon: Arc<MockChain>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{path}", self.server.port())
    }

    pub fn api(&self) -> &DappApi {
        self.server.api()
    }

    /// Sends a dapp call from [`APP`].
    pub async fn dapp_call(&self, body: serde_json::Value) -> serde_json::Value {
        self.client
            .post(self.url("/"))
            .header("Origin", APP)
            .json(&body)
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    pub fn operator_get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path)).header("X-Session-Token", SESSION_TOKEN)
    }

    pub fn operator_post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path)).header("X-Session-Token", SESSION_TOKEN)
    }

    pub async fn stop(mut self) {
        self.server.stop().await.unwrap();
    }
}

/// Starts a server on a random port, serving mainnet and polygon mocks.
pub async fn spawn(unlocked: bool) -> TestServer {
    crate::init_tracing();

    let mainnet = MockChain::new(1, "https://eth.example");
    let polygon = MockChain::new(137, "https://rpc.example");
    let clients = ChainClients::default().with_client(mainnet.clone()).with_client(polygon.clone());
    let repository: Arc<dyn DelegationRepository> = Arc::new(clients.clone());
    let tx = TransactionService::new(
        clients,
        Arc::new(LocalKeyring::from_private_key(DEV_KEY).unwrap()),
        DelegationChecker::new(repository),
    );

    let approvals = ApprovalQueue::new(Duration::from_secs(5));
    let api = DappApi::new(tx, Arc::new(approvals.clone()), Session::new(unlocked));
    let config = WardenConfig {
        port: 0,
        session_token: Some(SESSION_TOKEN.to_string()),
        ..Default::default()
    };
    let mut server = WardenServer::new(api, approvals, &config);
    server.start().await.unwrap();

    TestServer { server, client: reqwest::Client::new(), mainnet, polygon }
}
