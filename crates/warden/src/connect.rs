//! Multi-platform wallet connection.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, sync::Arc, time::Duration};
use warden_core::connector::{Platform, WalletConnectorMeta};

/// Result of a single connector attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "camelCase")]
pub enum ConnectOutcome {
    Connected,
    /// The user or the vendor declined.
    Rejected,
    Failed(String),
}

impl ConnectOutcome {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected)
    }
}

/// Performs one connection attempt with a vendor connector.
#[async_trait::async_trait]
pub trait PlatformConnector: Send + Sync {
    async fn connect(&self, platform: Platform, connector_id: &str) -> ConnectOutcome;
}

/// Inputs of [`ConnectionService::connect`].
#[derive(Clone, Copy)]
pub struct ConnectParams<'a> {
    pub wallet: &'a WalletConnectorMeta,
    /// Called before the EVM retry of a dual-VM quirk wallet.
    pub on_svm_rejected: Option<&'a (dyn Fn() + Send + Sync)>,
}

impl fmt::Debug for ConnectParams<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("wallet", &self.wallet)
            .field("on_svm_rejected", &self.on_svm_rejected.is_some())
            .finish()
    }
}

/// Outcome of [`ConnectionService::connect`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectResult {
    /// `true` if at least one platform connected.
    pub connected: bool,
    /// Final outcome per attempted platform, skipped platforms are absent.
    pub outcomes: BTreeMap<Platform, ConnectOutcome>,
}

/// A live connection of one platform.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveConnection {
    pub platform: Platform,
    pub connector_id: String,
    pub wallet_name: String,
}

/// Connects wallets on every platform they support.
///
/// At most one connection per platform is kept, a successful attempt replaces the previous one.
#[derive(Clone)]
pub struct ConnectionService {
    connector: Arc<dyn PlatformConnector>,
    settle_delay: Duration,
    active: Arc<Mutex<BTreeMap<Platform, ActiveConnection>>>,
}

impl fmt::Debug for ConnectionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionService")
            .field("settle_delay", &self.settle_delay)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl ConnectionService {
    pub fn new(connector: Arc<dyn PlatformConnector>, settle_delay: Duration) -> Self {
        Self { connector, settle_delay, active: Default::default() }
    }

    pub async fn connect(&self, params: ConnectParams<'_>) -> ConnectResult {
        let wallet = params.wallet;
        let mut outcomes = BTreeMap::new();

        for platform in Platform::CONNECT_ORDER {
            let Some(connector_id) = wallet.connector_id(platform) else {
                trace!(target: "connect", %platform, wallet = %wallet.wallet_name, "no connector, skipping");
                continue;
            };
            let outcome = self.attempt(wallet, platform, connector_id).await;
            outcomes.insert(platform, outcome);
        }

        let evm_rejected = outcomes.get(&Platform::Evm).map(ConnectOutcome::is_rejected);
        let svm_rejected = outcomes.get(&Platform::Svm).is_some_and(ConnectOutcome::is_rejected);
        if wallet.has_dual_vm_quirk()
            && svm_rejected
            && evm_rejected == Some(false)
            && let Some(connector_id) = wallet.connector_id(Platform::Evm)
        {
            debug!(target: "connect", wallet = %wallet.wallet_name, "SVM rejected, retrying EVM once");
            if let Some(on_svm_rejected) = params.on_svm_rejected {
                on_svm_rejected();
            }
            tokio::time::sleep(self.settle_delay).await;
            let outcome = self.attempt(wallet, Platform::Evm, connector_id).await;
            outcomes.insert(Platform::Evm, outcome);
        }

        let connected = outcomes.values().any(ConnectOutcome::is_connected);
        ConnectResult { connected, outcomes }
    }

    async fn attempt(
        &self,
        wallet: &WalletConnectorMeta,
        platform: Platform,
        connector_id: &str,
    ) -> ConnectOutcome {
        let outcome = self.connector.connect(platform, connector_id).await;
        let mut active = self.active.lock();
        match &outcome {
            ConnectOutcome::Connected => {
                active.insert(
                    platform,
                    ActiveConnection {
                        platform,
                        connector_id: connector_id.to_string(),
                        wallet_name: wallet.wallet_name.clone(),
                    },
                );
            }
            ConnectOutcome::Rejected => {
                trace!(target: "connect", %platform, connector_id, "connection rejected");
            }
            ConnectOutcome::Failed(reason) => {
                warn!(target: "connect", %platform, connector_id, %reason, "connection failed");
            }
        }
        // a failed attempt leaves a connection of this wallet in an unknown state
        if !outcome.is_connected()
            && active.get(&platform).is_some_and(|conn| conn.connector_id == connector_id)
        {
            active.remove(&platform);
        }
        outcome
    }

    pub fn active(&self) -> Vec<ActiveConnection> {
        self.active.lock().values().cloned().collect()
    }

    pub fn active_connection(&self, platform: Platform) -> Option<ActiveConnection> {
        self.active.lock().get(&platform).cloned()
    }

    /// Drops the connection of `platform`, returns whether there was one.
    pub fn disconnect(&self, platform: Platform) -> bool {
        self.active.lock().remove(&platform).is_some()
    }
}
