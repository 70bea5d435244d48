//! Registry of the networks the wallet accepts requests for.

use alloy_primitives::{Address, ChainId, TxHash};
use std::fmt;

/// Native currency metadata of a chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NativeCurrency {
    pub name: &'static str,
    pub symbol: &'static str,
    pub decimals: u8,
}

const ETHER: NativeCurrency = NativeCurrency { name: "Ether", symbol: "ETH", decimals: 18 };

/// Static metadata of a supported chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainInfo {
    pub id: ChainId,
    pub name: &'static str,
    pub native_currency: NativeCurrency,
    /// Block explorer base url, without trailing slash.
    pub explorer_url: &'static str,
    /// Default public RPC endpoint.
    pub rpc_url: &'static str,
    pub testnet: bool,
}

/// Every chain the wallet serves.
///
/// Anything not listed here is unsupported and must be rejected by callers, never mapped to a
/// default chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u64)]
pub enum SupportedChain {
    Mainnet = 1,
    Optimism = 10,
    Bnb = 56,
    Unichain = 130,
    Polygon = 137,
    ZkSync = 324,
    WorldChain = 480,
    UnichainSepolia = 1301,
    Base = 8453,
    Arbitrum = 42161,
    Celo = 42220,
    Avalanche = 43114,
    Blast = 81457,
    Zora = 7777777,
    Sepolia = 11155111,
}

impl SupportedChain {
    /// All supported chains, ordered by chain id.
    pub const ALL: [Self; 15] = [
        Self::Mainnet,
        Self::Optimism,
        Self::Bnb,
        Self::Unichain,
        Self::Polygon,
        Self::ZkSync,
        Self::WorldChain,
        Self::UnichainSepolia,
        Self::Base,
        Self::Arbitrum,
        Self::Celo,
        Self::Avalanche,
        Self::Blast,
        Self::Zora,
        Self::Sepolia,
    ];

    pub const fn id(self) -> ChainId {
        self as ChainId
    }

    pub fn info(self) -> &'static ChainInfo {
        match self {
            Self::Mainnet => &MAINNET,
            Self::Optimism => &OPTIMISM,
            Self::Bnb => &BNB,
            Self::Unichain => &UNICHAIN,
            Self::Polygon => &POLYGON,
            Self::ZkSync => &ZKSYNC,
            Self::WorldChain => &WORLD_CHAIN,
            Self::UnichainSepolia => &UNICHAIN_SEPOLIA,
            Self::Base => &BASE,
            Self::Arbitrum => &ARBITRUM,
            Self::Celo => &CELO,
            Self::Avalanche => &AVALANCHE,
            Self::Blast => &BLAST,
            Self::Zora => &ZORA,
            Self::Sepolia => &SEPOLIA,
        }
    }
}

impl fmt::Display for SupportedChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.info().name)
    }
}

/// Returned when a chain id is not part of the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unsupported chain id {0}")]
pub struct UnsupportedChainError(pub ChainId);

impl TryFrom<ChainId> for SupportedChain {
    type Error = UnsupportedChainError;

    fn try_from(id: ChainId) -> Result<Self, Self::Error> {
        Self::ALL.into_iter().find(|chain| chain.id() == id).ok_or(UnsupportedChainError(id))
    }
}

impl From<SupportedChain> for ChainId {
    fn from(chain: SupportedChain) -> Self {
        chain.id()
    }
}

/// Returns the metadata of the given chain, if supported.
pub fn chain_info(id: ChainId) -> Option<&'static ChainInfo> {
    SupportedChain::try_from(id).ok().map(SupportedChain::info)
}

/// Returns `true` if the chain id is part of the registry.
pub fn is_supported(id: ChainId) -> bool {
    SupportedChain::try_from(id).is_ok()
}

/// Encodes a chain id the way EIP-1193 providers report it: `0x`-prefixed lower-case hex.
pub fn to_hex_chain_id(id: ChainId) -> String {
    format!("{id:#x}")
}

/// Parses a `0x`-prefixed hex chain id.
///
/// Decimal strings are rejected, providers must send hex quantities.
pub fn parse_hex_chain_id(s: &str) -> Option<ChainId> {
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))?;
    if digits.is_empty() || digits.len() > 16 {
        return None;
    }
    ChainId::from_str_radix(digits, 16).ok()
}

/// Explorer link for a transaction.
pub fn explorer_tx_url(id: ChainId, hash: TxHash) -> Option<String> {
    chain_info(id).map(|info| format!("{}/tx/{hash}", info.explorer_url))
}

/// Explorer link for an address.
pub fn explorer_address_url(id: ChainId, address: Address) -> Option<String> {
    chain_info(id).map(|info| format!("{}/address/{address}", info.explorer_url))
}

static MAINNET: ChainInfo = ChainInfo {
    id: 1,
    name: "Ethereum",
    native_currency: ETHER,
    explorer_url: "https://etherscan.io",
    rpc_url: "https://ethereum-rpc.publicnode.com",
    testnet: false,
};

static OPTIMISM: ChainInfo = ChainInfo {
    id: 10,
    name: "OP Mainnet",
    native_currency: ETHER,
    explorer_url: "https://optimistic.etherscan.io",
    rpc_url: "https://mainnet.optimism.io",
    testnet: false,
};

static BNB: ChainInfo = ChainInfo {
    id: 56,
    name: "BNB Smart Chain",
    native_currency: NativeCurrency { name: "BNB", symbol: "BNB", decimals: 18 },
    explorer_url: "https://bscscan.com",
    rpc_url: "https://bsc-dataseed1.bnbchain.org",
    testnet: false,
};

static UNICHAIN: ChainInfo = ChainInfo {
    id: 130,
    name: "Unichain",
    native_currency: ETHER,
    explorer_url: "https://uniscan.xyz",
    rpc_url: "https://mainnet.unichain.org",
    testnet: false,
};

static POLYGON: ChainInfo = ChainInfo {
    id: 137,
    name: "Polygon",
    native_currency: NativeCurrency { name: "Polygon Ecosystem Token", symbol: "POL", decimals: 18 },
    explorer_url: "https://polygonscan.com",
    rpc_url: "https://polygon-rpc.com",
    testnet: false,
};

static ZKSYNC: ChainInfo = ChainInfo {
    id: 324,
    name: "ZKsync Era",
    native_currency: ETHER,
    explorer_url: "https://era.zksync.network",
    rpc_url: "https://mainnet.era.zksync.io",
    testnet: false,
};

static WORLD_CHAIN: ChainInfo = ChainInfo {
    id: 480,
    name: "World Chain",
    native_currency: ETHER,
    explorer_url: "https://worldscan.org",
    rpc_url: "https://worldchain-mainnet.g.alchemy.com/public",
    testnet: false,
};

static UNICHAIN_SEPOLIA: ChainInfo = ChainInfo {
    id: 1301,
    name: "Unichain Sepolia",
    native_currency: ETHER,
    explorer_url: "https://sepolia.uniscan.xyz",
    rpc_url: "https://sepolia.unichain.org",
    testnet: true,
};

static BASE: ChainInfo = ChainInfo {
    id: 8453,
    name: "Base",
    native_currency: ETHER,
    explorer_url: "https://basescan.org",
    rpc_url: "https://mainnet.base.org",
    testnet: false,
};

static ARBITRUM: ChainInfo = ChainInfo {
    id: 42161,
    name: "Arbitrum One",
    native_currency: ETHER,
    explorer_url: "https://arbiscan.io",
    rpc_url: "https://arb1.arbitrum.io/rpc",
    testnet: false,
};

static CELO: ChainInfo = ChainInfo {
    id: 42220,
    name: "Celo",
    native_currency: NativeCurrency { name: "Celo", symbol: "CELO", decimals: 18 },
    explorer_url: "https://celoscan.io",
    rpc_url: "https://forno.celo.org",
    testnet: false,
};

static AVALANCHE: ChainInfo = ChainInfo {
    id: 43114,
    name: "Avalanche C-Chain",
    native_currency: NativeCurrency { name: "Avalanche", symbol: "AVAX", decimals: 18 },
    explorer_url: "https://snowtrace.io",
    rpc_url: "https://api.avax.network/ext/bc/C/rpc",
    testnet: false,
};

static BLAST: ChainInfo = ChainInfo {
    id: 81457,
    name: "Blast",
    native_currency: ETHER,
    explorer_url: "https://blastscan.io",
    rpc_url: "https://rpc.blast.io",
    testnet: false,
};

static ZORA: ChainInfo = ChainInfo {
    id: 7777777,
    name: "Zora",
    native_currency: ETHER,
    explorer_url: "https://explorer.zora.energy",
    rpc_url: "https://rpc.zora.energy",
    testnet: false,
};

static SEPOLIA: ChainInfo = ChainInfo {
    id: 11155111,
    name: "Sepolia",
    native_currency: ETHER,
    explorer_url: "https://sepolia.etherscan.io",
    rpc_url: "https://ethereum-sepolia-rpc.publicnode.com",
    testnet: true,
};
