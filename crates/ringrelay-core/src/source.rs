//! Collaborator traits: token/market catalog sources, the order store and
//! the account-unlock check.
//!
//! The relay never talks to a database or wallet service directly; it reaches
//! them through these traits. In-memory implementations back the tests and
//! the CLI replay command.

use alloy_primitives::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::error::StoreError;

/// A non-denied token (or market) as listed by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Display symbol. The registry lower-cases it on load.
    pub symbol: String,
    /// ERC20 contract address.
    pub protocol: Address,
}

impl TokenRecord {
    pub fn new(symbol: impl Into<String>, protocol: Address) -> Self {
        Self {
            symbol: symbol.into(),
            protocol,
        }
    }
}

/// Source of the current non-denied token list.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn find_undenied_tokens(&self) -> Result<Vec<TokenRecord>, StoreError>;
}

/// Source of the current non-denied market (quote token) list.
#[async_trait]
pub trait MarketSource: Send + Sync {
    async fn find_undenied_markets(&self) -> Result<Vec<TokenRecord>, StoreError>;
}

/// The token/owner fields of a previously stored order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredOrder {
    /// `0x`-prefixed lower-case hex.
    pub order_hash: String,
    pub token_s: Address,
    pub token_b: Address,
    pub owner: Address,
}

/// Persistent order store, queried while matching ring fills.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Look up orders by hash. Hashes not present are simply absent from the
    /// returned map.
    async fn orders_by_hash(
        &self,
        hashes: &[String],
    ) -> Result<HashMap<String, StoredOrder>, StoreError>;
}

/// Wallet-unlock status, used only by the native-transfer heuristic.
pub trait AccountUnlocker: Send + Sync {
    fn has_unlocked(&self, address: &Address) -> bool;
}

// ─── In-memory implementations ────────────────────────────────────────────────

/// A fixed token list serving as both a `TokenSource` and a `MarketSource`.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    records: RwLock<Vec<TokenRecord>>,
}

impl StaticCatalog {
    pub fn new(records: Vec<TokenRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Replace the listed records.
    pub fn set(&self, records: Vec<TokenRecord>) {
        if let Ok(mut guard) = self.records.write() {
            *guard = records;
        }
    }

    fn snapshot(&self) -> Result<Vec<TokenRecord>, StoreError> {
        self.records
            .read()
            .map(|r| r.clone())
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl TokenSource for StaticCatalog {
    async fn find_undenied_tokens(&self) -> Result<Vec<TokenRecord>, StoreError> {
        self.snapshot()
    }
}

#[async_trait]
impl MarketSource for StaticCatalog {
    async fn find_undenied_markets(&self) -> Result<Vec<TokenRecord>, StoreError> {
        self.snapshot()
    }
}

/// In-memory order store keyed by lower-case order hash.
#[derive(Debug, Default)]
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<String, StoredOrder>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, order: StoredOrder) {
        if let Ok(mut guard) = self.orders.write() {
            guard.insert(order.order_hash.to_lowercase(), order);
        }
    }

    pub fn len(&self) -> usize {
        self.orders.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<StoredOrder> for MemoryOrderStore {
    fn from_iter<I: IntoIterator<Item = StoredOrder>>(iter: I) -> Self {
        let store = Self::new();
        for order in iter {
            store.insert(order);
        }
        store
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn orders_by_hash(
        &self,
        hashes: &[String],
    ) -> Result<HashMap<String, StoredOrder>, StoreError> {
        let guard = self
            .orders
            .read()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(hashes
            .iter()
            .filter_map(|h| {
                guard
                    .get(&h.to_lowercase())
                    .map(|o| (h.clone(), o.clone()))
            })
            .collect())
    }
}

/// Fixed set of unlocked accounts.
#[derive(Debug, Default, Clone)]
pub struct StaticUnlocker {
    unlocked: HashSet<Address>,
}

impl StaticUnlocker {
    pub fn new(unlocked: impl IntoIterator<Item = Address>) -> Self {
        Self {
            unlocked: unlocked.into_iter().collect(),
        }
    }
}

impl AccountUnlocker for StaticUnlocker {
    fn has_unlocked(&self, address: &Address) -> bool {
        self.unlocked.contains(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(hash: &str) -> StoredOrder {
        StoredOrder {
            order_hash: hash.to_string(),
            token_s: Address::repeat_byte(1),
            token_b: Address::repeat_byte(2),
            owner: Address::repeat_byte(3),
        }
    }

    #[tokio::test]
    async fn order_store_returns_only_known_hashes() {
        let store: MemoryOrderStore = vec![order("0xAA"), order("0xbb")].into_iter().collect();
        let found = store
            .orders_by_hash(&["0xaa".to_string(), "0xcc".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(found.contains_key("0xaa"));
    }

    #[tokio::test]
    async fn static_catalog_serves_both_roles() {
        let cat = StaticCatalog::new(vec![TokenRecord::new("LRC", Address::repeat_byte(9))]);
        assert_eq!(cat.find_undenied_tokens().await.unwrap().len(), 1);
        cat.set(vec![]);
        assert!(cat.find_undenied_markets().await.unwrap().is_empty());
    }

    #[test]
    fn unlocker_membership() {
        let u = StaticUnlocker::new([Address::repeat_byte(5)]);
        assert!(u.has_unlocked(&Address::repeat_byte(5)));
        assert!(!u.has_unlocked(&Address::repeat_byte(6)));
    }
}
