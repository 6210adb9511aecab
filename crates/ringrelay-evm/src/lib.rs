//! # ringrelay-evm
//!
//! ABI decode registry for the ring-settlement exchange contracts.
//!
//! ```text
//! RawTransaction + logs ─► Extractor ─► inbound bus (signature hex)
//!                                           │
//!                                    SignatureHandler
//!                                           │ decode · enrich
//!                                           ▼
//!                                    outbound bus (Topic) ─► consumers
//! ```
//!
//! Embedded ABIs cover the exchange protocol, ERC20, WETH, the token
//! registry and the transfer delegate. Only allow-listed events and methods
//! are registered.

pub mod abi;
pub mod decode;
pub mod extractor;
pub mod handlers;
pub mod processor;
pub mod record;
pub mod typed;

pub use abi::ContractFamily;
pub use extractor::{ExtractSummary, Extractor};
pub use processor::{AbiProcessor, ProcessorDeps, ProcessorMetrics};
pub use record::{EventKind, EventRecord, MethodKind, MethodRecord, RawPayload};
pub use typed::{CancelOrderCall, LogPayload, MethodPayload, RingFill, RingMinedLog};
