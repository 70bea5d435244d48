//! [EIP-5792](https://eips.ethereum.org/EIPS/eip-5792) call batch types.

use alloy_primitives::{Address, B256, Bytes, ChainId, U64, U256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Version string this wallet reports and accepts.
pub const CALLS_API_VERSION: &str = "2.0.0";

/// Largest batch the wallet executes in one `wallet_sendCalls`.
pub const MAX_CALLS_PER_BATCH: usize = 10;

/// One call of a batch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Call {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<serde_json::Value>,
}

/// Params of `wallet_sendCalls`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendCallsParams {
    pub version: String,
    /// Batch id chosen by the dapp, the wallet generates one otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    pub chain_id: U64,
    #[serde(default)]
    pub atomic_required: bool,
    pub calls: Vec<Call>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<BTreeMap<String, serde_json::Value>>,
}

impl SendCallsParams {
    pub fn chain_id(&self) -> ChainId {
        self.chain_id.to()
    }

    /// Capabilities the dapp requires, optional ones are skipped.
    pub fn required_capabilities(&self) -> impl Iterator<Item = &str> {
        self.capabilities.iter().flatten().filter_map(|(name, value)| {
            let optional = value.get("optional").and_then(serde_json::Value::as_bool);
            (optional != Some(true)).then_some(name.as_str())
        })
    }
}

/// Result of `wallet_sendCalls`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendCallsResult {
    pub id: String,
}

/// Status of a batch as reported by `wallet_getCallsStatus`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallBatchStatus {
    /// Received, not yet completed onchain.
    Pending,
    /// Included onchain without reverts.
    Confirmed,
    /// Not included onchain, the wallet will not retry.
    OffchainFailure,
    /// Reverted completely, only changes like gas fees were included.
    Reverted,
    /// Some calls reverted, changes were included onchain.
    PartiallyReverted,
}

impl CallBatchStatus {
    pub const fn code(self) -> u16 {
        match self {
            Self::Pending => 100,
            Self::Confirmed => 200,
            Self::OffchainFailure => 400,
            Self::Reverted => 500,
            Self::PartiallyReverted => 600,
        }
    }

    pub const fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            100 => Self::Pending,
            200 => Self::Confirmed,
            400 => Self::OffchainFailure,
            500 => Self::Reverted,
            600 => Self::PartiallyReverted,
            _ => return None,
        })
    }

    pub const fn is_final(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Derives the batch status from per-call outcomes, `None` marks a call without receipt yet.
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = Option<bool>>) -> Self {
        let (mut succeeded, mut reverted, mut pending) = (0usize, 0usize, 0usize);
        for outcome in outcomes {
            match outcome {
                Some(true) => succeeded += 1,
                Some(false) => reverted += 1,
                None => pending += 1,
            }
        }
        match (succeeded, reverted, pending) {
            (_, _, 1..) => Self::Pending,
            (_, 0, _) => Self::Confirmed,
            (0, _, _) => Self::Reverted,
            _ => Self::PartiallyReverted,
        }
    }
}

impl Serialize for CallBatchStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u16(self.code())
    }
}

impl<'de> Deserialize<'de> for CallBatchStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let code = u16::deserialize(deserializer)?;
        Self::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown calls status {code}")))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallReceiptLog {
    pub address: Address,
    pub data: Bytes,
    pub topics: Vec<B256>,
}

/// Receipt of one executed call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallReceipt {
    pub logs: Vec<CallReceiptLog>,
    /// `0x1` on success, `0x0` on revert.
    pub status: U64,
    pub block_hash: B256,
    pub block_number: U64,
    pub gas_used: U64,
    pub transaction_hash: B256,
}

impl CallReceipt {
    pub fn succeeded(&self) -> bool {
        self.status == U64::from(1)
    }
}

/// Result of `wallet_getCallsStatus`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallsStatus {
    pub version: String,
    pub id: String,
    pub chain_id: U64,
    pub status: CallBatchStatus,
    pub atomic: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipts: Option<Vec<CallReceipt>>,
}

/// Params of `wallet_getCapabilities`: the account and optionally the chains of interest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GetCapabilitiesParams {
    pub address: Address,
    pub chain_ids: Option<Vec<U64>>,
}

impl Serialize for GetCapabilitiesParams {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match &self.chain_ids {
            Some(ids) => (self.address, ids).serialize(serializer),
            None => (self.address,).serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for GetCapabilitiesParams {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            WithChains((Address, Vec<U64>)),
            AddressOnly((Address,)),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::WithChains((address, chain_ids)) => Self { address, chain_ids: Some(chain_ids) },
            Raw::AddressOnly((address,)) => Self { address, chain_ids: None },
        })
    }
}

/// Support level of atomic batch execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AtomicStatus {
    Supported,
    Ready,
    Unsupported,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomicCapability {
    pub status: AtomicStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainCapabilities {
    pub atomic: AtomicCapability,
}

/// Capabilities keyed by hex chain id.
pub type WalletCapabilities = BTreeMap<String, ChainCapabilities>;
