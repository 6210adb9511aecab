//! `ringrelay replay`: push captured transactions through the full pipeline
//! and print the domain events in `(block, log index)` order.
//!
//! With `--reorg <file>`, a second capture of the same block range is
//! replayed through a fresh pipeline and reconciled against the first.

use anyhow::{Context, Result};
use ringrelay_bus::{Dispatcher, Recorder, Watcher};
use ringrelay_core::chain::TransactionBundle;
use ringrelay_core::event::RelayEvent;
use ringrelay_core::fork::{reconcile, ForkEvent, ForkEventList};
use ringrelay_core::source::{MemoryOrderStore, StaticCatalog, StaticUnlocker};
use ringrelay_core::topic::Topic;
use ringrelay_evm::{AbiProcessor, Extractor, ProcessorDeps};
use ringrelay_market::MarketRegistry;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config::{load_bundles, Catalog, RelayConfig};

type Published = (Topic, RelayEvent);

#[derive(Serialize)]
struct Line<'a> {
    block: u64,
    log_index: i64,
    topic: Topic,
    #[serde(flatten)]
    event: &'a RelayEvent,
}

pub async fn run(
    config_path: &Path,
    catalog_path: &Path,
    blocks_path: &Path,
    reorg_path: Option<&Path>,
    as_json: bool,
) -> Result<()> {
    let config = RelayConfig::load(config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    let catalog = Catalog::load(catalog_path)
        .with_context(|| format!("loading catalog {}", catalog_path.display()))?;
    let bundles = load_bundles(blocks_path)
        .with_context(|| format!("loading transactions {}", blocks_path.display()))?;

    let recorded = replay(&config, &catalog, &bundles).await?;
    print_events(&recorded, as_json)?;

    if let Some(path) = reorg_path {
        let reorged = load_bundles(path)
            .with_context(|| format!("loading transactions {}", path.display()))?;
        let observed = replay(&config, &catalog, &reorged).await?;
        match reconcile(&recorded, &observed) {
            None => println!("no divergence"),
            Some(r) => {
                let fork = r
                    .fork_point
                    .map_or_else(|| "none".to_string(), |k| k.to_string());
                println!(
                    "fork point {fork}: roll back {}, apply {}",
                    r.rolled_back.len(),
                    r.applied.len()
                );
                for e in &r.rolled_back {
                    println!("  - {} {:?} {}", e.key, e.event.0, e.event.1.kind());
                }
                for e in &r.applied {
                    println!("  + {} {:?} {}", e.key, e.event.0, e.event.1.kind());
                }
            }
        }
    }
    Ok(())
}

/// Build a fresh pipeline, run every bundle through it and return what was
/// published, ordered by fork key then topic.
pub async fn replay(
    config: &RelayConfig,
    catalog: &Catalog,
    bundles: &[TransactionBundle],
) -> Result<ForkEventList<Published>> {
    let market = Arc::new(MarketRegistry::new(config.contract_versions()?));
    market
        .initialize(
            &StaticCatalog::new(catalog.tokens.clone()),
            &StaticCatalog::new(catalog.markets.clone()),
        )
        .await
        .context("initializing market registry")?;

    let outbound = Arc::new(Dispatcher::new("outbound"));
    let seen: Recorder<Published> = Recorder::new();
    for topic in Topic::ALL {
        outbound.on(topic, Watcher::serial(Arc::new(seen.tagged(topic))));
    }

    let processor = AbiProcessor::new(
        &config.protocols,
        ProcessorDeps {
            market,
            orders: Arc::new(catalog.orders.iter().cloned().collect::<MemoryOrderStore>()),
            accounts: Arc::new(StaticUnlocker::new(catalog.unlocked.iter().copied())),
            outbound,
        },
    )
    .context("building abi processor")?;
    let extractor = Extractor::new(Arc::new(processor), config.bus_concurrent);

    for bundle in bundles {
        extractor.process_bundle(bundle);
    }
    extractor.flush().await;

    let metrics = extractor.processor().metrics_snapshot();
    info!(
        transactions = bundles.len(),
        decoded = metrics.decoded,
        decode_errors = metrics.decode_errors,
        unmatched_fills = metrics.unmatched_fills,
        published = metrics.published,
        "replay finished"
    );

    let mut published = seen.messages();
    published.sort_by_key(|(topic, event)| (event.fork_key(), *topic));
    let mut list: ForkEventList<Published> = published
        .into_iter()
        .map(|p| ForkEvent::new(p.1.fork_key(), p))
        .collect();
    list.sort();
    Ok(list)
}

fn print_events(events: &ForkEventList<Published>, as_json: bool) -> Result<()> {
    for e in events {
        let (topic, event) = &e.event;
        if as_json {
            let line = Line {
                block: e.key.block_number,
                log_index: e.key.log_index,
                topic: *topic,
                event,
            };
            println!("{}", serde_json::to_string(&line)?);
        } else {
            println!(
                "{:>10} {:>4}  {:<32} {:<20} tx {:#x}",
                e.key.block_number,
                e.key.log_index,
                format!("{topic:?}"),
                event.kind(),
                event.tx().tx_hash
            );
        }
    }
    Ok(())
}
