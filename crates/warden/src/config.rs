//! Gateway configuration.

use alloy_primitives::ChainId;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    net::{IpAddr, Ipv4Addr},
    path::Path,
    time::Duration,
};
use url::Url;
use warden_core::chain::chain_info;

/// Default port of the dapp endpoint.
pub const DEFAULT_PORT: u16 = 8720;

/// Default Blockaid API base url.
pub const BLOCKAID_BASE_URL: &str = "https://api.blockaid.io";

/// Represents a failed attempt to extract [`WardenConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to extract warden config: {0}")]
    Extract(#[from] Box<figment::Error>),
    #[error("invalid rpc url for chain {chain_id}: {source}")]
    InvalidRpcUrl {
        chain_id: ChainId,
        #[source]
        source: url::ParseError,
    },
}

/// An RPC endpoint as written in the config, next to its parsed url.
///
/// `raw` is what dapps are told, `url` is what the transport connects to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RpcEndpoint {
    pub raw: String,
    pub url: Url,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockaidConfig {
    pub api_key: String,
    #[serde(default = "default_blockaid_url")]
    pub base_url: String,
}

fn default_blockaid_url() -> String {
    BLOCKAID_BASE_URL.to_string()
}

/// Configuration of the gateway.
///
/// Values are merged from [`WardenConfig::default`], then `warden.toml`, then `WARDEN_*`
/// environment variables. Nested keys use a double underscore, `WARDEN_BLOCKAID__API_KEY` sets
/// `blockaid.api_key`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub host: IpAddr,
    pub port: u16,
    /// RPC endpoint overrides keyed by decimal chain id, registry endpoints are used otherwise.
    pub rpc_endpoints: BTreeMap<String, String>,
    /// Private relay endpoints keyed by decimal chain id.
    pub private_rpc_endpoints: BTreeMap<String, String>,
    pub blockaid: Option<BlockaidConfig>,
    /// Reject requests the scanner classifies as malicious before prompting.
    pub block_malicious: bool,
    /// Seconds a prompt waits for an answer before it counts as rejected.
    pub approval_timeout: u64,
    /// Milliseconds to wait before retrying EVM for wallets with the dual-VM quirk.
    pub connect_settle_delay_ms: u64,
    /// Token the operator endpoints require, generated at startup when absent.
    pub session_token: Option<String>,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            rpc_endpoints: Default::default(),
            private_rpc_endpoints: Default::default(),
            blockaid: None,
            block_malicious: true,
            approval_timeout: 300,
            connect_settle_delay_ms: 400,
            session_token: None,
        }
    }
}

impl WardenConfig {
    /// The default config file name.
    pub const FILE_NAME: &'static str = "warden.toml";

    /// Returns the [`Figment`] the config is extracted from.
    pub fn figment(file: Option<&Path>) -> Figment {
        let file = file.unwrap_or_else(|| Path::new(Self::FILE_NAME));
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed("WARDEN_").ignore(&["PRIVATE_KEY", "CONFIG"]).split("__"))
    }

    /// Loads the config from the given file, or `warden.toml`, and the environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let config = Self::figment(file).extract::<Self>().map_err(Box::new)?;
        trace!(
            target: "config",
            port = ?config.port,
            chains = config.rpc_endpoints.len(),
            "loaded config"
        );
        Ok(config)
    }

    /// Resolves the public RPC endpoint of a supported chain.
    pub fn rpc_url(&self, chain_id: ChainId) -> Result<Option<RpcEndpoint>, ConfigError> {
        let raw = match self.rpc_endpoints.get(&chain_id.to_string()) {
            Some(url) => url.as_str(),
            None => match chain_info(chain_id) {
                Some(info) => info.rpc_url,
                None => return Ok(None),
            },
        };
        parse_url(chain_id, raw).map(Some)
    }

    /// Resolves the private relay endpoint of a chain, if one is configured.
    pub fn private_rpc_url(&self, chain_id: ChainId) -> Result<Option<RpcEndpoint>, ConfigError> {
        self.private_rpc_endpoints
            .get(&chain_id.to_string())
            .map(|raw| parse_url(chain_id, raw))
            .transpose()
    }

    pub fn approval_timeout(&self) -> Duration {
        Duration::from_secs(self.approval_timeout)
    }

    pub fn connect_settle_delay(&self) -> Duration {
        Duration::from_millis(self.connect_settle_delay_ms)
    }
}

fn parse_url(chain_id: ChainId, raw: &str) -> Result<RpcEndpoint, ConfigError> {
    let raw = raw.trim();
    let url = Url::parse(raw).map_err(|source| ConfigError::InvalidRpcUrl { chain_id, source })?;
    Ok(RpcEndpoint { raw: raw.to_string(), url })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn figment_is_default() {
        figment::Jail::expect_with(|_| {
            let config = WardenConfig::load(None).unwrap();
            assert_eq!(config, WardenConfig::default());
            assert_eq!(config.connect_settle_delay(), Duration::from_millis(400));
            assert!(config.block_malicious);
            Ok(())
        });
    }

    #[test]
    fn merges_toml_then_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "warden.toml",
                r#"
                port = 9000
                block_malicious = false

                [rpc_endpoints]
                137 = "https://rpc.example"

                [blockaid]
                api_key = "from-file"
            "#,
            )?;
            jail.set_env("WARDEN_PORT", "9100");
            jail.set_env("WARDEN_BLOCKAID__API_KEY", "from-env");

            let config = WardenConfig::load(None).unwrap();
            assert_eq!(config.port, 9100);
            assert!(!config.block_malicious);
            let blockaid = config.blockaid.clone().unwrap();
            assert_eq!(blockaid.api_key, "from-env");
            assert_eq!(blockaid.base_url, BLOCKAID_BASE_URL);

            let polygon = config.rpc_url(137).unwrap().unwrap();
            assert_eq!(polygon.raw, "https://rpc.example");
            assert_eq!(polygon.url.as_str(), "https://rpc.example/");
            assert_eq!(config.rpc_url(8453).unwrap().unwrap().raw, "https://mainnet.base.org");
            assert!(config.rpc_url(31337).unwrap().is_none());
            Ok(())
        });
    }

    #[test]
    fn rejects_bad_rpc_url() {
        let mut config = WardenConfig::default();
        config.rpc_endpoints.insert("1".to_string(), "not a url".to_string());
        assert!(matches!(config.rpc_url(1), Err(ConfigError::InvalidRpcUrl { chain_id: 1, .. })));
        assert!(config.private_rpc_url(1).unwrap().is_none());
    }
}
