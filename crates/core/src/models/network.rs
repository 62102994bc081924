//! Network registry: where the marketplace and the NFT factory live on
//! each supported chain.
//!
//! A chain without an entry, or an entry without an address, is the
//! "unsupported network" state. It is never an error: every consumer
//! answers with empty results instead.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{Address, ChainId};
use crate::error::{DomainError, DomainResult};

/// Symbol of the native currency on a chain.
pub fn native_currency_symbol(chain_id: ChainId) -> &'static str {
    match chain_id {
        133717 => "tMETIS",
        133718 => "LAZAI",
        1328 => "SEI",
        _ => "ETH",
    }
}

/// Contract deployments on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDeployment {
    pub chain_id: ChainId,
    /// Human-readable network name.
    #[serde(default)]
    pub name: String,
    /// Marketplace contract (listings, auctions, market events).
    #[serde(default)]
    pub marketplace: Option<Address>,
    /// NFT factory contract (collection registry, mint events).
    #[serde(default)]
    pub factory: Option<Address>,
    /// Native currency symbol; defaults to the built-in table.
    #[serde(default)]
    pub native_currency: Option<String>,
}

impl NetworkDeployment {
    pub fn new(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            name: String::new(),
            marketplace: None,
            factory: None,
            native_currency: None,
        }
    }

    /// Native currency symbol, falling back to the built-in table.
    pub fn currency(&self) -> &str {
        self.native_currency
            .as_deref()
            .unwrap_or_else(|| native_currency_symbol(self.chain_id))
    }
}

/// On-disk format of the registry.
#[derive(Debug, Deserialize)]
struct RegistryFile {
    networks: Vec<NetworkDeployment>,
}

/// Chain id → deployment mapping.
#[derive(Debug, Clone, Default)]
pub struct NetworkRegistry {
    networks: HashMap<ChainId, NetworkDeployment>,
}

impl NetworkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON document of the form `{ "networks": [ ... ] }`.
    pub fn from_json_str(json: &str) -> DomainResult<Self> {
        let file: RegistryFile = serde_json::from_str(json)
            .map_err(|e| DomainError::RegistryError(format!("Invalid network file: {}", e)))?;

        let mut registry = Self::new();
        for deployment in file.networks {
            if registry.networks.contains_key(&deployment.chain_id) {
                return Err(DomainError::RegistryError(format!(
                    "Duplicate entry for chain {}",
                    deployment.chain_id
                )));
            }
            registry.insert(deployment);
        }
        Ok(registry)
    }

    /// Add or replace a deployment.
    pub fn insert(&mut self, deployment: NetworkDeployment) {
        self.networks.insert(deployment.chain_id, deployment);
    }

    /// Deployment on `chain_id`, if the chain is known at all.
    pub fn resolve(&self, chain_id: ChainId) -> Option<&NetworkDeployment> {
        self.networks.get(&chain_id)
    }

    /// Marketplace address on `chain_id`.
    pub fn marketplace(&self, chain_id: ChainId) -> Option<&Address> {
        self.resolve(chain_id)?.marketplace.as_ref()
    }

    /// Factory address on `chain_id`.
    pub fn factory(&self, chain_id: ChainId) -> Option<&Address> {
        self.resolve(chain_id)?.factory.as_ref()
    }

    /// Chains with at least one deployed contract.
    pub fn supported_chains(&self) -> Vec<ChainId> {
        let mut chains: Vec<_> = self
            .networks
            .values()
            .filter(|d| d.marketplace.is_some() || d.factory.is_some())
            .map(|d| d.chain_id)
            .collect();
        chains.sort_unstable();
        chains
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTRY: &str = r#"{
        "networks": [
            {
                "chain_id": 133717,
                "name": "Hyperion Testnet",
                "marketplace": "0x5FBDB2315678AFECB367F032D93F642F64180AA3",
                "factory": "0xe7f1725e7734ce288f8367e1bb143e90bb3f0512"
            },
            { "chain_id": 1328, "name": "SeiEVM Testnet", "factory": "0x9fe46736679d2d9a65f0992f2272de9f3c7fa6e0" }
        ]
    }"#;

    #[test]
    fn test_load_and_resolve() {
        let registry = NetworkRegistry::from_json_str(REGISTRY).unwrap();

        let hyperion = registry.resolve(133717).unwrap();
        assert_eq!(hyperion.currency(), "tMETIS");
        assert!(registry.marketplace(133717).is_some());

        // Factory only: marketplace unsupported, not an error
        assert!(registry.marketplace(1328).is_none());
        assert!(registry.factory(1328).is_some());

        // Unknown chain
        assert!(registry.resolve(1).is_none());
        assert!(registry.marketplace(1).is_none());

        assert_eq!(registry.supported_chains(), vec![1328, 133717]);
    }

    #[test]
    fn test_rejects_duplicates_and_bad_addresses() {
        let dup = r#"{"networks":[{"chain_id":1},{"chain_id":1}]}"#;
        assert!(NetworkRegistry::from_json_str(dup).is_err());

        let bad = r#"{"networks":[{"chain_id":1,"marketplace":"0x1234"}]}"#;
        assert!(NetworkRegistry::from_json_str(bad).is_err());
    }

    #[test]
    fn test_currency_override_and_fallback() {
        let mut deployment = NetworkDeployment::new(42);
        assert_eq!(deployment.currency(), "ETH");
        deployment.native_currency = Some("GLMR".into());
        assert_eq!(deployment.currency(), "GLMR");
        assert_eq!(native_currency_symbol(133718), "LAZAI");
    }
}
