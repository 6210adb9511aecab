//! Domain events published on the outbound bus.
//!
//! Every event embeds the `TxInfo` of the chain record it was derived from.
//! `RelayEvent` is the closed set of payloads a `Topic` can carry.

use crate::chain::TxInfo;
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// Settlement summary of one mined ring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RingMinedEvent {
    pub tx: TxInfo,
    pub ring_index: U256,
    pub ring_hash: B256,
    pub miner: Address,
    pub fee_recipient: Address,
    /// Number of fills carried by the event, matched or not.
    pub fill_count: usize,
}

/// One order's execution within a mined ring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFilledEvent {
    pub tx: TxInfo,
    pub ring_hash: B256,
    pub pre_order_hash: B256,
    pub order_hash: B256,
    pub next_order_hash: B256,
    pub amount_s: U256,
    pub amount_b: U256,
    pub lrc_reward: U256,
    pub lrc_fee: U256,
    pub split_s: U256,
    pub split_b: U256,
    /// Position of this fill within the ring.
    pub fill_index: usize,
    pub token_s: Address,
    pub token_b: Address,
    pub owner: Address,
    /// `"<market>-<token>"`, empty when the pair is not a supported market.
    pub market: String,
    /// Owner of the next matched fill (wraps around).
    pub sell_to: Address,
    /// Owner of the previous matched fill (wraps around).
    pub buy_from: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCancelledEvent {
    pub tx: TxInfo,
    pub order_hash: B256,
    pub amount_cancelled: U256,
}

/// All of `owner`'s orders placed before `cutoff` are invalid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CutoffEvent {
    pub tx: TxInfo,
    pub owner: Address,
    pub cutoff: U256,
}

/// Pair-scoped cutoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CutoffPairEvent {
    pub tx: TxInfo,
    pub owner: Address,
    pub token1: Address,
    pub token2: Address,
    pub cutoff: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalEvent {
    pub tx: TxInfo,
    pub owner: Address,
    pub spender: Address,
    pub value: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferEvent {
    pub tx: TxInfo,
    pub sender: Address,
    pub receiver: Address,
    pub value: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WethDepositEvent {
    pub tx: TxInfo,
    pub owner: Address,
    pub value: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WethWithdrawalEvent {
    pub tx: TxInfo,
    pub owner: Address,
    pub value: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRegisteredEvent {
    pub tx: TxInfo,
    pub token: Address,
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUnregisteredEvent {
    pub tx: TxInfo,
    pub token: Address,
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressAuthorizedEvent {
    pub tx: TxInfo,
    pub protocol: Address,
    pub number: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressDeauthorizedEvent {
    pub tx: TxInfo,
    pub protocol: Address,
    pub number: u32,
}

/// Published as soon as a `submitRing` call is seen, whether or not it
/// decodes. `error` is set when the transaction failed on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRingMethodEvent {
    pub tx: TxInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The closed set of payloads carried by the outbound bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "event")]
pub enum RelayEvent {
    RingMined(RingMinedEvent),
    OrderFilled(OrderFilledEvent),
    OrderCancelled(OrderCancelledEvent),
    Cutoff(CutoffEvent),
    CutoffPair(CutoffPairEvent),
    Approval(ApprovalEvent),
    Transfer(TransferEvent),
    WethDeposit(WethDepositEvent),
    WethWithdrawal(WethWithdrawalEvent),
    TokenRegistered(TokenRegisteredEvent),
    TokenUnregistered(TokenUnregisteredEvent),
    AddressAuthorized(AddressAuthorizedEvent),
    AddressDeauthorized(AddressDeauthorizedEvent),
    SubmitRing(SubmitRingMethodEvent),
}

impl RelayEvent {
    /// Transaction context of the wrapped event.
    pub fn tx(&self) -> &TxInfo {
        match self {
            Self::RingMined(e) => &e.tx,
            Self::OrderFilled(e) => &e.tx,
            Self::OrderCancelled(e) => &e.tx,
            Self::Cutoff(e) => &e.tx,
            Self::CutoffPair(e) => &e.tx,
            Self::Approval(e) => &e.tx,
            Self::Transfer(e) => &e.tx,
            Self::WethDeposit(e) => &e.tx,
            Self::WethWithdrawal(e) => &e.tx,
            Self::TokenRegistered(e) => &e.tx,
            Self::TokenUnregistered(e) => &e.tx,
            Self::AddressAuthorized(e) => &e.tx,
            Self::AddressDeauthorized(e) => &e.tx,
            Self::SubmitRing(e) => &e.tx,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::RingMined(_) => "RingMined",
            Self::OrderFilled(_) => "OrderFilled",
            Self::OrderCancelled(_) => "OrderCancelled",
            Self::Cutoff(_) => "Cutoff",
            Self::CutoffPair(_) => "CutoffPair",
            Self::Approval(_) => "Approval",
            Self::Transfer(_) => "Transfer",
            Self::WethDeposit(_) => "WethDeposit",
            Self::WethWithdrawal(_) => "WethWithdrawal",
            Self::TokenRegistered(_) => "TokenRegistered",
            Self::TokenUnregistered(_) => "TokenUnregistered",
            Self::AddressAuthorized(_) => "AddressAuthorized",
            Self::AddressDeauthorized(_) => "AddressDeauthorized",
            Self::SubmitRing(_) => "SubmitRing",
        }
    }

    /// Ordering key of the wrapped event, for cross-topic causal ordering.
    pub fn fork_key(&self) -> crate::fork::ForkKey {
        let tx = self.tx();
        crate::fork::ForkKey::new(tx.block_number, tx.log_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_kind_tag() {
        let ev = RelayEvent::Cutoff(CutoffEvent {
            tx: TxInfo::default(),
            owner: Address::repeat_byte(0x11),
            cutoff: U256::from(1_700_000_000u64),
        });
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["kind"], "Cutoff");
        assert!(json["event"]["owner"].is_string());
        assert_eq!(ev.kind(), "Cutoff");
    }

    #[test]
    fn submit_ring_error_omitted_when_none() {
        let ev = SubmitRingMethodEvent {
            tx: TxInfo::default(),
            error: None,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert!(json.get("error").is_none());
    }

    #[test]
    fn fork_key_comes_from_tx_context() {
        let mut tx = TxInfo::default();
        tx.block_number = 32;
        tx.log_index = 3;
        let ev = RelayEvent::Transfer(TransferEvent {
            tx,
            sender: Address::ZERO,
            receiver: Address::ZERO,
            value: U256::ZERO,
        });
        assert_eq!(ev.fork_key(), crate::fork::ForkKey::new(32, 3));
    }
}
