//! `ringrelay market`: market id and price lookups against a catalog.

use alloy_primitives::Address;
use anyhow::{Context, Result};
use ringrelay_core::source::StaticCatalog;
use ringrelay_market::{float_to_bytes, MarketRegistry};
use std::path::Path;

async fn registry(catalog_path: &Path) -> Result<MarketRegistry> {
    let catalog = crate::config::Catalog::load(catalog_path)
        .with_context(|| format!("loading catalog {}", catalog_path.display()))?;
    let registry = MarketRegistry::default();
    registry
        .initialize(
            &StaticCatalog::new(catalog.tokens),
            &StaticCatalog::new(catalog.markets),
        )
        .await
        .context("initializing market registry")?;
    Ok(registry)
}

pub async fn list(catalog_path: &Path) -> Result<()> {
    let registry = registry(catalog_path).await?;
    for market in registry.all_markets() {
        let (m, t) = registry.unwrap(&market);
        match registry.unwrap_to_address(&market) {
            Some((ma, ta)) => println!("{market:<16} {m}={ma:#x} {t}={ta:#x}"),
            None => println!("{market}"),
        }
    }
    Ok(())
}

pub async fn wrap(catalog_path: &Path, a: &str, b: &str) -> Result<()> {
    let registry = registry(catalog_path).await?;
    let market = match (a.parse::<Address>(), b.parse::<Address>()) {
        (Ok(a), Ok(b)) => registry.wrap_market_by_address(&a, &b)?,
        _ => registry.wrap_market(a, b)?,
    };
    println!("{market}");
    Ok(())
}

pub fn unwrap(market: &str) -> Result<()> {
    let (m, t) = ringrelay_market::unwrap(market);
    if m.is_empty() {
        anyhow::bail!("'{market}' is not a <market>-<token> id");
    }
    println!("{m} {t}");
    Ok(())
}

/// Amounts are decimal token units, converted to 18-decimal integers.
pub async fn price(catalog_path: &Path, amount_s: f64, amount_b: f64, token_s: &str, token_b: &str) -> Result<()> {
    let registry = registry(catalog_path).await?;
    let price = registry.calculate_price(
        &float_to_bytes(amount_s),
        &float_to_bytes(amount_b),
        &token_s.to_lowercase(),
        &token_b.to_lowercase(),
    );
    let side = if registry.is_buy(&token_s.to_lowercase()) { "buy" } else { "sell" };
    println!("{price} ({side})");
    Ok(())
}
