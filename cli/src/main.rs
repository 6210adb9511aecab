//! RingRelay CLI.
//!
//! # Commands
//! ```text
//! ringrelay replay     --config <relay.yaml> --catalog <catalog.json> --blocks <txs.json> [--reorg <txs.json>] [--json]
//! ringrelay signatures [--json]
//! ringrelay market     list   --catalog <catalog.json>
//! ringrelay market     wrap   --catalog <catalog.json> <a> <b>
//! ringrelay market     unwrap <market>
//! ringrelay market     price  --catalog <catalog.json> <amount_s> <amount_b> <token_s> <token_b>
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ringrelay_evm::ContractFamily;
use ringrelay_observability::{init_tracing, LogConfig};
use serde::Serialize;
use std::path::PathBuf;

mod cmd_market;
mod cmd_replay;
mod config;

#[derive(Parser)]
#[command(
    name = "ringrelay",
    about = "Decode ring-settlement exchange activity into domain events",
    version
)]
struct Cli {
    /// Debug-level logging (overrides the config file)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay captured transactions through the decode pipeline
    Replay {
        /// Relay configuration (YAML)
        #[arg(long)]
        config: PathBuf,
        /// Token, market, order and account snapshot (JSON)
        #[arg(long)]
        catalog: PathBuf,
        /// JSON array of transaction bundles
        #[arg(long)]
        blocks: PathBuf,
        /// Second capture of the same range, reconciled against the first
        #[arg(long)]
        reorg: Option<PathBuf>,
        /// One JSON object per line
        #[arg(long)]
        json: bool,
    },

    /// List every event topic and method selector the relay decodes
    Signatures {
        #[arg(long)]
        json: bool,
    },

    /// Market id and price helpers
    Market {
        #[command(subcommand)]
        action: MarketAction,
    },
}

#[derive(Subcommand)]
enum MarketAction {
    /// List every supported market
    List {
        #[arg(long)]
        catalog: PathBuf,
    },
    /// Canonical market id of a token pair (symbols or addresses)
    Wrap {
        #[arg(long)]
        catalog: PathBuf,
        a: String,
        b: String,
    },
    /// Split a market id into its two symbols
    Unwrap { market: String },
    /// Price of an order in market units
    Price {
        #[arg(long)]
        catalog: PathBuf,
        amount_s: f64,
        amount_b: f64,
        token_s: String,
        token_b: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log = match &cli.command {
        Commands::Replay { config, .. } => config::RelayConfig::load(config)
            .map(|c| c.log)
            .unwrap_or_default(),
        _ => LogConfig {
            level: "warn".into(),
            ..Default::default()
        },
    };
    if cli.verbose {
        log.level = "debug".into();
    }
    init_tracing(&log).context("installing log subscriber")?;

    match cli.command {
        Commands::Replay {
            config,
            catalog,
            blocks,
            reorg,
            json,
        } => cmd_replay::run(&config, &catalog, &blocks, reorg.as_deref(), json).await,

        Commands::Signatures { json } => cmd_signatures(json),

        Commands::Market { action } => match action {
            MarketAction::List { catalog } => cmd_market::list(&catalog).await,
            MarketAction::Wrap { catalog, a, b } => cmd_market::wrap(&catalog, &a, &b).await,
            MarketAction::Unwrap { market } => cmd_market::unwrap(&market),
            MarketAction::Price {
                catalog,
                amount_s,
                amount_b,
                token_s,
                token_b,
            } => cmd_market::price(&catalog, amount_s, amount_b, &token_s, &token_b).await,
        },
    }
}

#[derive(Serialize)]
struct Signature {
    family: String,
    kind: &'static str,
    name: String,
    signature: String,
    id: String,
}

fn cmd_signatures(as_json: bool) -> Result<()> {
    let mut rows = Vec::new();
    for family in ContractFamily::ALL {
        let abi = family.abi()?;
        for name in family.allowed_events() {
            let Some(event) = abi.events.get(*name).and_then(|v| v.first()) else {
                continue;
            };
            rows.push(Signature {
                family: family.to_string(),
                kind: "event",
                name: name.to_string(),
                signature: event.signature(),
                id: format!("{:#x}", event.selector()),
            });
        }
        for name in family.allowed_methods() {
            let Some(func) = abi.functions.get(*name).and_then(|v| v.first()) else {
                continue;
            };
            rows.push(Signature {
                family: family.to_string(),
                kind: "method",
                name: name.to_string(),
                signature: func.signature(),
                id: format!("{:#x}", func.selector()),
            });
        }
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        for r in &rows {
            println!("{:<15} {:<7} {:<68} {}", r.family, r.kind, r.id, r.signature);
        }
    }
    Ok(())
}
