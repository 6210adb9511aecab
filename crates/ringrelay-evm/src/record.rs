//! Decode records (signature → ABI binding) and the per-payload data built
//! from them.

use alloy_json_abi::{Event, Function};
use alloy_primitives::{Bytes, B256, U256};
use ringrelay_core::chain::{RawLog, RawTransaction, TxInfo, TxStatus};
use std::fmt;
use std::sync::Arc;

use crate::abi::ContractFamily;

/// Every event the relay decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RingMined,
    OrderCancelled,
    AllOrdersCancelled,
    OrdersCancelled,
    Transfer,
    Approval,
    WethDeposit,
    WethWithdrawal,
    TokenRegistered,
    TokenUnregistered,
    AddressAuthorized,
    AddressDeauthorized,
}

impl EventKind {
    pub fn resolve(family: ContractFamily, name: &str) -> Option<Self> {
        use ContractFamily as F;
        Some(match (family, name) {
            (F::Protocol, "RingMined") => Self::RingMined,
            (F::Protocol, "OrderCancelled") => Self::OrderCancelled,
            (F::Protocol, "AllOrdersCancelled") => Self::AllOrdersCancelled,
            (F::Protocol, "OrdersCancelled") => Self::OrdersCancelled,
            (F::Erc20, "Transfer") => Self::Transfer,
            (F::Erc20, "Approval") => Self::Approval,
            (F::Weth, "Deposit") => Self::WethDeposit,
            (F::Weth, "Withdrawal") => Self::WethWithdrawal,
            (F::TokenRegistry, "TokenRegistered") => Self::TokenRegistered,
            (F::TokenRegistry, "TokenUnregistered") => Self::TokenUnregistered,
            (F::Delegate, "AddressAuthorized") => Self::AddressAuthorized,
            (F::Delegate, "AddressDeauthorized") => Self::AddressDeauthorized,
            _ => return None,
        })
    }
}

/// Every method the relay decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    SubmitRing,
    CancelOrder,
    CancelAllOrders,
    CancelAllOrdersByTradingPair,
    Transfer,
    Approve,
    WethDeposit,
    WethWithdrawal,
}

impl MethodKind {
    pub fn resolve(family: ContractFamily, name: &str) -> Option<Self> {
        use ContractFamily as F;
        Some(match (family, name) {
            (F::Protocol, "submitRing") => Self::SubmitRing,
            (F::Protocol, "cancelOrder") => Self::CancelOrder,
            (F::Protocol, "cancelAllOrders") => Self::CancelAllOrders,
            (F::Protocol, "cancelAllOrdersByTradingPair") => Self::CancelAllOrdersByTradingPair,
            (F::Erc20, "transfer") => Self::Transfer,
            (F::Erc20, "approve") => Self::Approve,
            (F::Weth, "deposit") => Self::WethDeposit,
            (F::Weth, "withdraw") => Self::WethWithdrawal,
            _ => return None,
        })
    }
}

/// Binds an event topic hash to its ABI definition.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub id: B256,
    pub name: String,
    pub family: ContractFamily,
    pub kind: EventKind,
    pub abi: Event,
}

impl EventRecord {
    pub fn new(family: ContractFamily, kind: EventKind, abi: Event) -> Self {
        Self {
            id: abi.selector(),
            name: abi.name.clone(),
            family,
            kind,
            abi,
        }
    }

    /// Inbound bus key: lower-case `0x` hex of the topic hash.
    pub fn key(&self) -> String {
        event_key(&self.id)
    }

    /// Signature topic plus one topic per indexed input.
    pub fn required_topics(&self) -> usize {
        let indexed = self.abi.inputs.iter().filter(|p| p.indexed).count();
        if self.abi.anonymous {
            indexed
        } else {
            indexed + 1
        }
    }
}

/// Binds a 4-byte selector to its ABI definition.
#[derive(Debug, Clone)]
pub struct MethodRecord {
    pub selector: [u8; 4],
    pub name: String,
    pub family: ContractFamily,
    pub kind: MethodKind,
    pub abi: Function,
}

impl MethodRecord {
    pub fn new(family: ContractFamily, kind: MethodKind, abi: Function) -> Self {
        Self {
            selector: abi.selector().0,
            name: abi.name.clone(),
            family,
            kind,
            abi,
        }
    }

    /// Inbound bus key: `0x` + 8 hex chars.
    pub fn key(&self) -> String {
        method_key(&self.selector)
    }
}

pub fn event_key(id: &B256) -> String {
    format!("{id:#x}")
}

pub fn method_key(selector: &[u8; 4]) -> String {
    format!("0x{}", hex::encode(selector))
}

/// A log matched to its record, with the context of its transaction.
#[derive(Debug, Clone)]
pub struct EventData {
    pub record: Arc<EventRecord>,
    pub tx: TxInfo,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

impl EventData {
    pub fn new(record: Arc<EventRecord>, base: &TxInfo, log: &RawLog) -> Self {
        Self {
            record,
            tx: base.clone().for_log(log),
            topics: log.topics.clone(),
            data: log.data.clone(),
        }
    }
}

/// A transaction's calldata matched to its method record.
#[derive(Debug, Clone)]
pub struct MethodData {
    pub record: Arc<MethodRecord>,
    pub tx: TxInfo,
    pub value: U256,
    pub input: Bytes,
}

impl MethodData {
    pub fn new(
        record: Arc<MethodRecord>,
        base: &TxInfo,
        raw: &RawTransaction,
        status: TxStatus,
    ) -> Self {
        Self {
            record,
            tx: base.clone().for_method(status),
            value: raw.value,
            input: raw.input.clone(),
        }
    }

    /// `Some` with a reason when the transaction failed on chain.
    pub fn failure(&self) -> Option<String> {
        self.tx
            .status
            .is_failed()
            .then(|| format!("method {} transaction failed", self.record.name))
    }
}

/// What travels on the inbound bus.
#[derive(Debug, Clone)]
pub enum RawPayload {
    Log(EventData),
    Method(MethodData),
}

impl RawPayload {
    pub fn tx(&self) -> &TxInfo {
        match self {
            Self::Log(d) => &d.tx,
            Self::Method(d) => &d.tx,
        }
    }
}

impl fmt::Display for RawPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Log(d) => write!(f, "event {} in tx {:#x}", d.record.name, d.tx.tx_hash),
            Self::Method(d) => write!(f, "method {} in tx {:#x}", d.record.name, d.tx.tx_hash),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_resolve_only_within_their_family() {
        assert_eq!(
            EventKind::resolve(ContractFamily::Erc20, "Transfer"),
            Some(EventKind::Transfer)
        );
        assert_eq!(EventKind::resolve(ContractFamily::Weth, "Transfer"), None);
        assert_eq!(
            MethodKind::resolve(ContractFamily::Weth, "withdraw"),
            Some(MethodKind::WethWithdrawal)
        );
        assert_eq!(MethodKind::resolve(ContractFamily::Erc20, "transferFrom"), None);
    }

    #[test]
    fn required_topics_counts_indexed_inputs() {
        let abi = ContractFamily::Erc20.abi().unwrap();
        let rec = EventRecord::new(
            ContractFamily::Erc20,
            EventKind::Transfer,
            abi.events["Transfer"][0].clone(),
        );
        assert_eq!(rec.required_topics(), 3);
        assert!(rec.key().starts_with("0xddf252ad"));

        let abi = ContractFamily::TokenRegistry.abi().unwrap();
        let rec = EventRecord::new(
            ContractFamily::TokenRegistry,
            EventKind::TokenRegistered,
            abi.events["TokenRegistered"][0].clone(),
        );
        assert_eq!(rec.required_topics(), 1);
    }

    #[test]
    fn method_key_format() {
        assert_eq!(method_key(&[0xa9, 0x05, 0x9c, 0xbb]), "0xa9059cbb");
    }
}
