//! Account delegation lookups.

use crate::{error::Result, provider::DelegationRepository};
use alloy_primitives::{Address, ChainId};
use std::{fmt, sync::Arc};
use warden_core::delegation::{DelegationResult, classify_bytecode};

/// Invoked with the delegate and chain whenever a delegated account is found.
pub type DelegationCallback = Arc<dyn Fn(Address, ChainId) + Send + Sync>;

/// Reports whether an account delegates its code to a contract.
///
/// Stateless, every call fetches the bytecode again. Callers that need caching do it themselves.
#[derive(Clone)]
pub struct DelegationChecker {
    repository: Arc<dyn DelegationRepository>,
    on_delegation_detected: Option<DelegationCallback>,
}

impl DelegationChecker {
    pub fn new(repository: Arc<dyn DelegationRepository>) -> Self {
        Self { repository, on_delegation_detected: None }
    }

    pub fn with_callback(mut self, callback: DelegationCallback) -> Self {
        self.on_delegation_detected = Some(callback);
        self
    }

    pub async fn get_is_address_delegated(
        &self,
        address: Address,
        chain_id: ChainId,
    ) -> Result<DelegationResult> {
        let code = self.repository.get_wallet_bytecode(address, chain_id).await?;
        let result = classify_bytecode(&code);
        if let Some(delegate) = result.delegated_address() {
            debug!(target: "delegation", %address, %delegate, chain_id, "account is delegated");
            if let Some(callback) = &self.on_delegation_detected {
                callback(delegate, chain_id);
            }
        }
        Ok(result)
    }
}

impl fmt::Debug for DelegationChecker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegationChecker")
            .field("on_delegation_detected", &self.on_delegation_detected.is_some())
            .finish_non_exhaustive()
    }
}
