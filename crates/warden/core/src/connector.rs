//! Metadata of connectable wallets.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Virtual machine family a connector speaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Evm,
    Svm,
}

impl Platform {
    /// Order in which platforms are connected. Some vendors only behave when EVM goes first.
    pub const CONNECT_ORDER: [Self; 2] = [Self::Evm, Self::Svm];
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Evm => f.write_str("EVM"),
            Self::Svm => f.write_str("SVM"),
        }
    }
}

/// Connector ids of wallets whose injected provider mixes up EVM and SVM state when one leg is
/// rejected.
pub const DUAL_VM_QUIRK_CONNECTORS: &[&str] = &["app.phantom", "phantom"];

/// Identifies a wallet and the connectors it exposes per platform.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletConnectorMeta {
    pub wallet_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_connector_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evm_connector_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub svm_connector_id: Option<String>,
}

impl WalletConnectorMeta {
    pub fn new(wallet_name: impl Into<String>) -> Self {
        Self { wallet_name: wallet_name.into(), ..Default::default() }
    }

    pub fn with_evm(mut self, id: impl Into<String>) -> Self {
        self.evm_connector_id = Some(id.into());
        self
    }

    pub fn with_svm(mut self, id: impl Into<String>) -> Self {
        self.svm_connector_id = Some(id.into());
        self
    }

    pub fn connector_id(&self, platform: Platform) -> Option<&str> {
        match platform {
            Platform::Evm => self.evm_connector_id.as_deref(),
            Platform::Svm => self.svm_connector_id.as_deref(),
        }
    }

    /// Returns `true` if any of the wallet's connector ids is a known dual-VM quirk wallet.
    pub fn has_dual_vm_quirk(&self) -> bool {
        [&self.custom_connector_id, &self.evm_connector_id, &self.svm_connector_id]
            .into_iter()
            .filter_map(Option::as_deref)
            .any(|id| DUAL_VM_QUIRK_CONNECTORS.contains(&id.to_ascii_lowercase().as_str()))
    }
}
