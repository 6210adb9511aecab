//! Protocol deployment configuration.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ConfigError;

/// Addresses of one deployed protocol version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProtocolDeployment {
    /// Version label, e.g. `"v1.5"`.
    pub version: String,
    /// Exchange contract.
    pub protocol: Address,
    pub token_registry: Address,
    /// Transfer delegate; approvals to it are protocol-relevant.
    pub delegate: Address,
}

impl ProtocolDeployment {
    /// All three contract addresses of this deployment.
    pub fn addresses(&self) -> [Address; 3] {
        [self.protocol, self.token_registry, self.delegate]
    }
}

/// Build the version → exchange address table used by
/// `MarketRegistry::is_supported_contract`.
pub fn contract_versions(
    deployments: &[ProtocolDeployment],
) -> Result<BTreeMap<String, Address>, ConfigError> {
    let mut out = BTreeMap::new();
    for d in deployments {
        if d.version.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "deployment {} has an empty version",
                d.protocol
            )));
        }
        if out.insert(d.version.clone(), d.protocol).is_some() {
            return Err(ConfigError::Invalid(format!(
                "duplicate protocol version '{}'",
                d.version
            )));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(version: &str, b: u8) -> ProtocolDeployment {
        ProtocolDeployment {
            version: version.into(),
            protocol: Address::repeat_byte(b),
            token_registry: Address::repeat_byte(b + 1),
            delegate: Address::repeat_byte(b + 2),
        }
    }

    #[test]
    fn builds_version_table() {
        let t = contract_versions(&[dep("v1.0", 1), dep("v1.5", 10)]).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t["v1.5"], Address::repeat_byte(10));
    }

    #[test]
    fn rejects_duplicate_versions() {
        assert!(contract_versions(&[dep("v1", 1), dep("v1", 2)]).is_err());
    }

    #[test]
    fn parses_from_yaml() {
        let yaml = r#"
version: v1.5
protocol: "0x8d8812b72d1e4ffcec158d25f56748b7d67c1e78"
token_registry: "0xa21c1f2ae7f721ae77b1204a4f0811c642638da9"
delegate: "0xb258f5c190fadab30b5ff0d6ab7e32a646a4baae"
"#;
        let d: ProtocolDeployment = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(d.version, "v1.5");
        assert_eq!(d.addresses().len(), 3);
    }
}
