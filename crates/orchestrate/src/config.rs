//! Network configuration shared by every step.
//!
//! Values are layered: built-in defaults, then an optional `Lynx.toml`, then
//! `LYNX_`-prefixed environment variables. Command-line flags are applied on top
//! by the caller.

use std::path::{Path, PathBuf};

use alloy_core::primitives::U256;
use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::record::DEFAULT_RECORD_PATH;

/// The configuration file looked up in the working directory.
pub const CONFIG_FILENAME: &str = "Lynx.toml";

/// Public JSON-RPC relay for Hedera testnet.
pub const DEFAULT_RPC_URL: &str = "https://testnet.hashio.io/api";

/// The network's minimum gas price, in weibars.
pub const DEFAULT_MIN_GAS_PRICE: u64 = 530_000_000_000;

/// Default Hardhat artifacts directory.
pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// JSON-RPC relay endpoint.
    pub rpc_url: String,
    /// Expected chain id. Resolved from the relay when unset.
    pub chain_id: Option<u64>,
    /// Gas price floor, in weibars. Individual calls may override it upwards.
    pub min_gas_price: u64,
    pub record_path: PathBuf,
    pub artifacts: PathBuf,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            chain_id: None,
            min_gas_price: DEFAULT_MIN_GAS_PRICE,
            record_path: PathBuf::from(DEFAULT_RECORD_PATH),
            artifacts: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
        }
    }
}

impl NetworkConfig {
    /// The layered configuration sources, with `config_file` between defaults and env.
    pub fn figment(config_file: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed("LYNX_").only(&[
                "rpc_url",
                "chain_id",
                "min_gas_price",
                "record_path",
                "artifacts",
            ]))
    }

    /// Load the configuration, reading `config_file` if it exists.
    pub fn load(config_file: &Path) -> Result<Self, anyhow::Error> {
        let config: Self = Self::figment(config_file)
            .extract()
            .with_context(|| format!("Invalid configuration (file: {})", config_file.display()))?;
        config.rpc_url()?;

        tracing::debug!(
            rpc_url = %config.rpc_url,
            chain_id = ?config.chain_id,
            min_gas_price = config.min_gas_price,
            record_path = %config.record_path.display(),
            "Configuration loaded"
        );

        Ok(config)
    }

    pub fn rpc_url(&self) -> Result<Url, anyhow::Error> {
        Url::parse(&self.rpc_url).with_context(|| format!("Invalid RPC URL '{}'", self.rpc_url))
    }

    pub fn min_gas_price(&self) -> U256 {
        U256::from(self.min_gas_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_defaults_without_file() {
        let dir = TempDir::new("lynx-config").unwrap();
        let config: NetworkConfig = Figment::from(Serialized::defaults(NetworkConfig::default()))
            .merge(Toml::file(dir.path().join(CONFIG_FILENAME)))
            .extract()
            .unwrap();

        assert_eq!(config, NetworkConfig::default());
        assert_eq!(config.min_gas_price(), U256::from(530_000_000_000u64));
        assert_eq!(config.record_path, PathBuf::from("deployments/lynx.json"));
    }

    #[test]
    fn test_load_without_file() {
        let dir = TempDir::new("lynx-config").unwrap();
        let config = NetworkConfig::load(&dir.path().join(CONFIG_FILENAME)).unwrap();

        assert_eq!(config.min_gas_price, DEFAULT_MIN_GAS_PRICE);
        assert_eq!(config.rpc_url().unwrap().as_str(), "https://testnet.hashio.io/api");
    }

    #[test]
    fn test_load_reads_file() {
        let dir = TempDir::new("lynx-config").unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "min_gas_price = 600000000000\nrecord_path = \"out/lynx.json\"\n")
            .unwrap();

        let config = NetworkConfig::load(&path).unwrap();

        assert_eq!(config.min_gas_price, 600_000_000_000);
        assert_eq!(config.record_path, PathBuf::from("out/lynx.json"));
        assert_eq!(config.chain_id, None);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = TempDir::new("lynx-config").unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(
            &path,
            r#"
rpc_url = "http://localhost:7546"
chain_id = 298
min_gas_price = 600000000000
"#,
        )
        .unwrap();

        let config: NetworkConfig = Figment::from(Serialized::defaults(NetworkConfig::default()))
            .merge(Toml::file(&path))
            .extract()
            .unwrap();

        assert_eq!(config.rpc_url().unwrap().as_str(), "http://localhost:7546/");
        assert_eq!(config.chain_id, Some(298));
        assert_eq!(config.min_gas_price, 600_000_000_000);
        assert_eq!(config.artifacts, PathBuf::from("artifacts"));
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = TempDir::new("lynx-config").unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "chain_id = \"testnet\"").unwrap();
        assert!(NetworkConfig::load(&path).is_err());

        std::fs::write(&path, "rpc_url = \"not a url\"").unwrap();
        assert!(NetworkConfig::load(&path).is_err());
    }
}
