//! Token/market registry.
//!
//! The registry holds an immutable [`MarketSnapshot`] behind an
//! `RwLock<Arc<_>>`. `initialize` builds a complete new snapshot off to the
//! side and swaps it in; readers clone the `Arc` and never see a partially
//! built table.

use alloy_primitives::Address;
use indexmap::{IndexMap, IndexSet};
use ringrelay_core::{
    error::MarketError,
    source::{MarketSource, TokenRecord, TokenSource},
};
use serde::Serialize;
use std::{
    collections::BTreeMap,
    sync::{Arc, PoisonError, RwLock},
};
use tracing::{info, warn};

use crate::price::{bytes_to_float, is_address, parse_address};

/// Ordered (sell token, buy token) address pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub token_s: Address,
    pub token_b: Address,
}

/// One consistent view of the token and market tables plus everything
/// derived from them.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    /// Incremented on every successful `initialize`. 0 means never loaded.
    pub version: u64,
    supported_tokens: IndexMap<String, Address>,
    supported_markets: IndexMap<String, Address>,
    all_tokens: IndexMap<String, Address>,
    all_markets: Vec<String>,
    all_token_pairs: IndexSet<TokenPair>,
}

impl MarketSnapshot {
    /// Build a snapshot from catalog records. Symbols are lower-cased.
    pub fn build(
        version: u64,
        tokens: Vec<TokenRecord>,
        markets: Vec<TokenRecord>,
    ) -> Result<Self, MarketError> {
        if tokens.is_empty() {
            return Err(MarketError::NoTokens);
        }
        if markets.is_empty() {
            return Err(MarketError::NoMarkets);
        }

        let supported_tokens = into_table(tokens, "token");
        let supported_markets = into_table(markets, "market");

        let mut all_tokens = supported_tokens.clone();
        for (symbol, addr) in &supported_markets {
            all_tokens.entry(symbol.clone()).or_insert(*addr);
        }

        let mut all_markets = Vec::new();
        let mut all_token_pairs = IndexSet::new();
        for (market, market_addr) in &supported_markets {
            for (token, token_addr) in &supported_tokens {
                if market == token {
                    continue;
                }
                let id = format!("{market}-{token}");
                info!(market = %id, "supported market");
                all_markets.push(id);
                all_token_pairs.insert(TokenPair {
                    token_s: *market_addr,
                    token_b: *token_addr,
                });
                all_token_pairs.insert(TokenPair {
                    token_s: *token_addr,
                    token_b: *market_addr,
                });
            }
        }

        Ok(Self {
            version,
            supported_tokens,
            supported_markets,
            all_tokens,
            all_markets,
            all_token_pairs,
        })
    }

    pub fn supported_tokens(&self) -> &IndexMap<String, Address> {
        &self.supported_tokens
    }

    pub fn supported_markets(&self) -> &IndexMap<String, Address> {
        &self.supported_markets
    }

    pub fn all_tokens(&self) -> &IndexMap<String, Address> {
        &self.all_tokens
    }

    pub fn all_markets(&self) -> &[String] {
        &self.all_markets
    }

    pub fn all_token_pairs(&self) -> &IndexSet<TokenPair> {
        &self.all_token_pairs
    }

    pub fn is_supported_market(&self, symbol: &str) -> bool {
        self.supported_markets.contains_key(symbol)
    }

    pub fn is_supported_token(&self, symbol: &str) -> bool {
        self.supported_tokens.contains_key(symbol)
    }

    /// Canonical `"<market>-<token>"` id for a pair given in either order.
    pub fn wrap_market(&self, a: &str, b: &str) -> Result<String, MarketError> {
        let (a, b) = (a.to_lowercase(), b.to_lowercase());
        if a != b {
            if self.is_supported_market(&a) && self.is_supported_token(&b) {
                return Ok(format!("{a}-{b}"));
            }
            if self.is_supported_market(&b) && self.is_supported_token(&a) {
                return Ok(format!("{b}-{a}"));
            }
        }
        Err(MarketError::UnsupportedMarket { s: a, b })
    }

    /// `wrap_market` over contract addresses. Unknown addresses resolve to
    /// empty symbols and fail in `wrap_market`.
    pub fn wrap_market_by_address(&self, a: &Address, b: &Address) -> Result<String, MarketError> {
        self.wrap_market(&self.address_to_alias(a), &self.address_to_alias(b))
    }

    pub fn alias_to_address(&self, symbol: &str) -> Option<Address> {
        self.all_tokens.get(symbol).copied()
    }

    /// `true` if `address` is a token or market contract in this snapshot.
    pub fn is_token_address(&self, address: &Address) -> bool {
        self.all_tokens.values().any(|a| a == address)
    }

    /// Reverse lookup by linear scan. Empty string on miss.
    pub fn address_to_alias(&self, address: &Address) -> String {
        self.all_tokens
            .iter()
            .find(|(_, a)| *a == address)
            .map(|(symbol, _)| symbol.clone())
            .unwrap_or_default()
    }

    /// Split a market id into its two halves and resolve both to addresses.
    pub fn unwrap_to_address(&self, market: &str) -> Option<(Address, Address)> {
        let (m, t) = unwrap(market);
        Some((self.alias_to_address(&m)?, self.alias_to_address(&t)?))
    }

    /// `true` when `symbol_or_address` names a supported token, meaning an
    /// order selling it is a buy of the market currency.
    pub fn is_buy(&self, symbol_or_address: &str) -> bool {
        let symbol = if is_address(symbol_or_address) {
            match parse_address(symbol_or_address) {
                Some(addr) => self.address_to_alias(&addr),
                None => return false,
            }
        } else {
            symbol_or_address.to_lowercase()
        };
        self.is_supported_token(&symbol)
    }

    /// Price of an order in market units. Zero if either amount is zero.
    pub fn calculate_price(&self, amount_s: &[u8], amount_b: &[u8], s: &str, _b: &str) -> f64 {
        let sell = bytes_to_float(amount_s);
        let buy = bytes_to_float(amount_b);
        if sell == 0.0 || buy == 0.0 {
            return 0.0;
        }
        if self.is_buy(s) {
            buy / sell
        } else {
            sell / buy
        }
    }
}

/// Split `"<a>-<b>"` into two lower-cased halves. Anything without exactly
/// one hyphen yields two empty strings.
pub fn unwrap(market: &str) -> (String, String) {
    let parts: Vec<&str> = market.trim().split('-').collect();
    match parts.as_slice() {
        [a, b] => (a.to_lowercase(), b.to_lowercase()),
        _ => (String::new(), String::new()),
    }
}

fn into_table(records: Vec<TokenRecord>, kind: &str) -> IndexMap<String, Address> {
    let mut table = IndexMap::with_capacity(records.len());
    for rec in records {
        let symbol = rec.symbol.trim().to_lowercase();
        info!(kind, symbol = %symbol, address = %rec.protocol, "catalog entry loaded");
        if let Some(prev) = table.insert(symbol.clone(), rec.protocol) {
            warn!(kind, symbol = %symbol, previous = %prev, "duplicate symbol, keeping last");
        }
    }
    table
}

/// Shared token/market registry.
pub struct MarketRegistry {
    snapshot: RwLock<Arc<MarketSnapshot>>,
    contract_versions: BTreeMap<String, Address>,
}

impl MarketRegistry {
    /// An empty registry. `contract_versions` maps protocol version labels
    /// to exchange addresses.
    pub fn new(contract_versions: BTreeMap<String, Address>) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(MarketSnapshot::default())),
            contract_versions,
        }
    }

    /// Reload both tables from their sources and swap in the new snapshot.
    /// On error the current snapshot is left untouched. Returns the new
    /// snapshot version.
    pub async fn initialize(
        &self,
        tokens: &dyn TokenSource,
        markets: &dyn MarketSource,
    ) -> Result<u64, MarketError> {
        let token_records = tokens.find_undenied_tokens().await?;
        let market_records = markets.find_undenied_markets().await?;

        let next = self.snapshot().version + 1;
        let snapshot = MarketSnapshot::build(next, token_records, market_records)?;
        info!(
            version = next,
            tokens = snapshot.supported_tokens.len(),
            markets = snapshot.supported_markets.len(),
            pairs = snapshot.all_token_pairs.len(),
            "market registry loaded"
        );

        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(snapshot);
        Ok(next)
    }

    /// The current snapshot. Hold on to it for a consistent multi-step read.
    pub fn snapshot(&self) -> Arc<MarketSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn supported_tokens(&self) -> IndexMap<String, Address> {
        self.snapshot().supported_tokens.clone()
    }

    pub fn supported_markets(&self) -> IndexMap<String, Address> {
        self.snapshot().supported_markets.clone()
    }

    pub fn all_tokens(&self) -> IndexMap<String, Address> {
        self.snapshot().all_tokens.clone()
    }

    pub fn all_markets(&self) -> Vec<String> {
        self.snapshot().all_markets.clone()
    }

    pub fn all_token_pairs(&self) -> Vec<TokenPair> {
        self.snapshot().all_token_pairs.iter().copied().collect()
    }

    pub fn wrap_market(&self, a: &str, b: &str) -> Result<String, MarketError> {
        self.snapshot().wrap_market(a, b)
    }

    pub fn wrap_market_by_address(&self, a: &Address, b: &Address) -> Result<String, MarketError> {
        self.snapshot().wrap_market_by_address(a, b)
    }

    pub fn unwrap(&self, market: &str) -> (String, String) {
        unwrap(market)
    }

    pub fn unwrap_to_address(&self, market: &str) -> Option<(Address, Address)> {
        self.snapshot().unwrap_to_address(market)
    }

    pub fn is_supported_market(&self, symbol: &str) -> bool {
        self.snapshot().is_supported_market(symbol)
    }

    pub fn is_supported_token(&self, symbol: &str) -> bool {
        self.snapshot().is_supported_token(symbol)
    }

    pub fn alias_to_address(&self, symbol: &str) -> Option<Address> {
        self.snapshot().alias_to_address(symbol)
    }

    pub fn address_to_alias(&self, address: &Address) -> String {
        self.snapshot().address_to_alias(address)
    }

    pub fn is_token_address(&self, address: &Address) -> bool {
        self.snapshot().is_token_address(address)
    }

    pub fn is_buy(&self, symbol_or_address: &str) -> bool {
        self.snapshot().is_buy(symbol_or_address)
    }

    pub fn calculate_price(&self, amount_s: &[u8], amount_b: &[u8], s: &str, b: &str) -> f64 {
        self.snapshot().calculate_price(amount_s, amount_b, s, b)
    }

    /// `true` if `address` is a configured protocol deployment.
    pub fn is_supported_contract(&self, address: &Address) -> bool {
        self.contract_version(address).is_some()
    }

    /// Version label of the deployment at `address`.
    pub fn contract_version(&self, address: &Address) -> Option<&str> {
        self.contract_versions
            .iter()
            .find(|(_, a)| *a == address)
            .map(|(v, _)| v.as_str())
    }
}

impl Default for MarketRegistry {
    fn default() -> Self {
        Self::new(BTreeMap::new())
    }
}
