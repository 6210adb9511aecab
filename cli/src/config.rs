//! Relay configuration (YAML) and catalog snapshots (JSON).
//!
//! ```yaml
//! log:
//!   level: info
//!   components:
//!     ringrelay-evm: debug
//! bus_concurrent: false
//! protocols:
//!   - version: v1.5
//!     protocol: "0xa0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0"
//!     token_registry: "0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1"
//!     delegate: "0xa2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2"
//! ```

use alloy_primitives::Address;
use ringrelay_core::chain::TransactionBundle;
use ringrelay_core::config::{contract_versions, ProtocolDeployment};
use ringrelay_core::error::ConfigError;
use ringrelay_core::source::{StoredOrder, TokenRecord};
use ringrelay_observability::LogConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub protocols: Vec<ProtocolDeployment>,
    /// Run inbound decoders concurrently instead of one at a time per
    /// signature.
    #[serde(default)]
    pub bus_concurrent: bool,
}

impl RelayConfig {
    pub fn from_yaml(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(s)?;
        config.contract_versions()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }

    /// Version → exchange address. Fails on empty or duplicate versions.
    pub fn contract_versions(&self) -> Result<BTreeMap<String, Address>, ConfigError> {
        if self.protocols.is_empty() {
            return Err(ConfigError::Invalid("no protocol deployments configured".into()));
        }
        contract_versions(&self.protocols)
    }
}

/// Point-in-time copy of the external stores the relay reads from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub tokens: Vec<TokenRecord>,
    pub markets: Vec<TokenRecord>,
    #[serde(default)]
    pub orders: Vec<StoredOrder>,
    /// Accounts with an unlocked wallet session.
    #[serde(default)]
    pub unlocked: Vec<Address>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
    }
}

/// A JSON array of transaction bundles.
pub fn load_bundles(path: &Path) -> Result<Vec<TransactionBundle>, ConfigError> {
    Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
}
