//! # ringrelay-core
//!
//! Shared primitives for the RingRelay ingestion pipeline: raw chain records,
//! the transaction context every decoded event carries, the outbound domain
//! events and topics, collaborator traits, protocol deployment config, and
//! the fork-ordering unit.

pub mod chain;
pub mod config;
pub mod error;
pub mod event;
pub mod fork;
pub mod source;
pub mod topic;

pub use chain::{RawLog, RawReceipt, RawTransaction, TransactionBundle, TxInfo, TxStatus};
pub use config::{contract_versions, ProtocolDeployment};
pub use error::{ConfigError, DecodeError, HandlerError, MarketError, StoreError};
pub use event::{
    AddressAuthorizedEvent, AddressDeauthorizedEvent, ApprovalEvent, CutoffEvent,
    CutoffPairEvent, OrderCancelledEvent, OrderFilledEvent, RelayEvent, RingMinedEvent,
    SubmitRingMethodEvent, TokenRegisteredEvent, TokenUnregisteredEvent, TransferEvent,
    WethDepositEvent, WethWithdrawalEvent,
};
pub use fork::{reconcile, ForkEvent, ForkEventList, ForkKey, Reconciliation};
pub use source::{
    AccountUnlocker, MarketSource, MemoryOrderStore, OrderStore, StaticCatalog, StaticUnlocker,
    StoredOrder, TokenRecord, TokenSource,
};
pub use topic::Topic;
