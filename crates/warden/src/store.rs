//! In-memory stores of dapp connections and call batches.

use alloy_primitives::{Address, ChainId, TxHash};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

/// Milliseconds since the unix epoch.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or_default()
}

/// What the wallet knows about a dapp.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DappInfo {
    pub url: String,
    /// Chain the dapp last switched to.
    pub last_chain_id: Option<ChainId>,
    pub connected_account: Option<Address>,
    /// Unix time in milliseconds of the connection.
    pub connected_at: Option<u64>,
}

impl DappInfo {
    fn new(url: &str) -> Self {
        Self { url: url.to_string(), last_chain_id: None, connected_account: None, connected_at: None }
    }
}

/// Per-dapp chain and connection state, keyed by dapp url.
#[derive(Clone, Debug, Default)]
pub struct DappStore {
    dapps: Arc<RwLock<HashMap<String, DappInfo>>>,
}

impl DappStore {
    pub fn get(&self, url: &str) -> Option<DappInfo> {
        self.dapps.read().get(url).cloned()
    }

    pub fn connected_account(&self, url: &str) -> Option<Address> {
        self.dapps.read().get(url).and_then(|info| info.connected_account)
    }

    /// Records the chain a dapp switched to.
    pub fn save_dapp_chain(&self, url: &str, chain_id: ChainId) {
        let mut dapps = self.dapps.write();
        dapps.entry(url.to_string()).or_insert_with(|| DappInfo::new(url)).last_chain_id =
            Some(chain_id);
    }

    /// Records that the dapp may see `account`. Keeps the earlier chain if one was chosen.
    pub fn save_dapp_connection(&self, url: &str, account: Address, chain_id: ChainId) {
        let mut dapps = self.dapps.write();
        let info = dapps.entry(url.to_string()).or_insert_with(|| DappInfo::new(url));
        info.connected_account = Some(account);
        info.connected_at = Some(now_millis());
        info.last_chain_id.get_or_insert(chain_id);
    }

    /// Removes the connection, returns `true` if the dapp was connected.
    pub fn remove_dapp_connection(&self, url: &str) -> bool {
        let mut dapps = self.dapps.write();
        let Some(info) = dapps.get_mut(url) else { return false };
        info.connected_at = None;
        info.connected_account.take().is_some()
    }
}

/// Where a batch is in its submission.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BatchState {
    /// Calls are still being signed and broadcast.
    #[default]
    Submitting,
    /// Every call was broadcast.
    Submitted,
    /// Broadcasting stopped at a failed call, later calls were never sent.
    Failed,
}

/// A `wallet_sendCalls` batch as submitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchRecord {
    pub id: String,
    pub chain_id: ChainId,
    pub account: Address,
    pub dapp_url: String,
    /// Hashes of the calls that were broadcast, in call order.
    pub transaction_hashes: Vec<TxHash>,
    /// Number of calls in the batch.
    pub call_count: usize,
    pub state: BatchState,
}

impl BatchRecord {
    /// Number of calls that will never be broadcast.
    pub fn dropped_calls(&self) -> usize {
        match self.state {
            BatchState::Failed => self.call_count.saturating_sub(self.transaction_hashes.len()),
            _ => 0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("batch {0} already exists")]
pub struct DuplicateBatch(pub String);

/// Submitted call batches keyed by id.
#[derive(Clone, Debug, Default)]
pub struct BatchStore {
    batches: Arc<RwLock<HashMap<String, BatchRecord>>>,
}

impl BatchStore {
    /// Generates a fresh batch id.
    pub fn new_batch_id() -> String {
        format!("0x{}", uuid::Uuid::new_v4().simple())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.batches.read().contains_key(id)
    }

    /// Reserves `id` so a concurrent batch with the same id is rejected.
    pub fn reserve(&self, record: BatchRecord) -> Result<(), DuplicateBatch> {
        let mut batches = self.batches.write();
        if batches.contains_key(&record.id) {
            return Err(DuplicateBatch(record.id));
        }
        batches.insert(record.id.clone(), record);
        Ok(())
    }

    pub fn push_transaction(&self, id: &str, hash: TxHash) {
        if let Some(record) = self.batches.write().get_mut(id) {
            record.transaction_hashes.push(hash);
        }
    }

    pub fn set_state(&self, id: &str, state: BatchState) {
        if let Some(record) = self.batches.write().get_mut(id) {
            record.state = state;
        }
    }

    pub fn get(&self, id: &str) -> Option<BatchRecord> {
        self.batches.read().get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const APP: &str = "https://app.example.com";
    const ACCOUNT: Address = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

    #[test]
    fn chain_and_connection_state() {
        let store = DappStore::default();
        assert!(store.get(APP).is_none());

        store.save_dapp_chain(APP, 137);
        store.save_dapp_chain(APP, 137);
        let info = store.get(APP).unwrap();
        assert_eq!(info.last_chain_id, Some(137));
        assert_eq!(info.connected_account, None);

        store.save_dapp_connection(APP, ACCOUNT, 1);
        assert_eq!(store.connected_account(APP), Some(ACCOUNT));
        // the switched chain survives the connection
        assert_eq!(store.get(APP).unwrap().last_chain_id, Some(137));

        assert!(store.remove_dapp_connection(APP));
        assert!(!store.remove_dapp_connection(APP));
        assert_eq!(store.connected_account(APP), None);
    }

    #[test]
    fn batch_ids_are_unique() {
        let store = BatchStore::default();
        let record = BatchRecord {
            id: BatchStore::new_batch_id(),
            chain_id: 1,
            account: ACCOUNT,
            dapp_url: APP.to_string(),
            transaction_hashes: vec![],
            call_count: 2,
            state: BatchState::Submitting,
        };
        store.reserve(record.clone()).unwrap();
        assert!(store.reserve(record.clone()).is_err());

        store.push_transaction(&record.id, TxHash::ZERO);
        let stored = store.get(&record.id).unwrap();
        assert_eq!(stored.transaction_hashes, vec![TxHash::ZERO]);
        // still sending, nothing is dropped yet
        assert_eq!(stored.dropped_calls(), 0);

        store.set_state(&record.id, BatchState::Failed);
        assert_eq!(store.get(&record.id).unwrap().dropped_calls(), 1);
        assert_ne!(BatchStore::new_batch_id(), record.id);
    }
}
