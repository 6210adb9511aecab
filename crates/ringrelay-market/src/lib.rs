//! # ringrelay-market
//!
//! Token/market registry: which tokens and quote markets the relay supports,
//! symbol ↔ address resolution, canonical market ids, and order price
//! calculation.
//!
//! ```text
//! TokenSource ─┐
//!              ├─► MarketRegistry::initialize ─► Arc<MarketSnapshot> (swapped)
//! MarketSource ┘
//! ```

pub mod price;
pub mod registry;

pub use price::{bytes_to_float, float_to_bytes, is_address, WEI_PER_UNIT};
pub use registry::{unwrap, MarketRegistry, MarketSnapshot, TokenPair};
