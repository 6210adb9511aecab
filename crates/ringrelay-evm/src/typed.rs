//! Typed views of every allow-listed event and method.
//!
//! Each payload is decoded once from its `DynSolValue`s, so handlers work
//! with named fields instead of argument positions.

use alloy_primitives::{keccak256, Address, B256, U256};
use ringrelay_core::error::DecodeError;

use crate::decode::{decode_call, decode_log, Args};
use crate::record::{EventData, EventKind, MethodData, MethodKind};

/// Words per fill in a `RingMined` order info list.
pub const FILL_STRIDE: usize = 7;

/// A ring settles at least two orders.
pub const MIN_RING_SIZE: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingMinedLog {
    pub ring_index: U256,
    pub ring_hash: B256,
    pub miner: Address,
    pub fee_recipient: Address,
    pub order_info: Vec<B256>,
}

/// One order's slice of a ring, before it is matched to a stored order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingFill {
    pub fill_index: usize,
    pub order_hash: B256,
    pub pre_order_hash: B256,
    pub next_order_hash: B256,
    pub amount_s: U256,
    pub amount_b: U256,
    pub lrc_reward: U256,
    pub lrc_fee: U256,
    pub split_s: U256,
    pub split_b: U256,
}

impl RingMinedLog {
    /// Split the order info list into fills. Neighbour hashes wrap around
    /// the whole ring.
    pub fn fills(&self) -> Result<Vec<RingFill>, DecodeError> {
        let words = &self.order_info;
        if words.len() % FILL_STRIDE != 0 {
            return Err(DecodeError::InvalidInput {
                reason: format!(
                    "order info list length {} is not a multiple of {FILL_STRIDE}",
                    words.len()
                ),
            });
        }
        let n = words.len() / FILL_STRIDE;
        if n < MIN_RING_SIZE {
            return Err(DecodeError::InvalidInput {
                reason: format!("ring carries {n} fills, need at least {MIN_RING_SIZE}"),
            });
        }

        let hash_at = |i: usize| words[i * FILL_STRIDE];
        let uint_at = |i: usize, off: usize| U256::from_be_bytes(words[i * FILL_STRIDE + off].0);

        Ok((0..n)
            .map(|i| RingFill {
                fill_index: i,
                order_hash: hash_at(i),
                pre_order_hash: hash_at((i + n - 1) % n),
                next_order_hash: hash_at((i + 1) % n),
                amount_s: uint_at(i, 1),
                amount_b: uint_at(i, 2),
                lrc_reward: uint_at(i, 3),
                lrc_fee: uint_at(i, 4),
                split_s: uint_at(i, 5),
                split_b: uint_at(i, 6),
            })
            .collect())
    }
}

/// A decoded allow-listed log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogPayload {
    RingMined(RingMinedLog),
    OrderCancelled { order_hash: B256, amount_cancelled: U256 },
    AllOrdersCancelled { owner: Address, cutoff: U256 },
    OrdersCancelled { owner: Address, token1: Address, token2: Address, cutoff: U256 },
    Transfer { from: Address, to: Address, value: U256 },
    Approval { owner: Address, spender: Address, value: U256 },
    WethDeposit { owner: Address, value: U256 },
    WethWithdrawal { owner: Address, value: U256 },
    TokenRegistered { token: Address, symbol: String },
    TokenUnregistered { token: Address, symbol: String },
    AddressAuthorized { protocol: Address, number: u32 },
    AddressDeauthorized { protocol: Address, number: u32 },
}

impl LogPayload {
    pub fn decode(data: &EventData) -> Result<Self, DecodeError> {
        let record = &data.record;
        let values = decode_log(&record.abi, &data.topics, &data.data)?;
        let a = Args::new(&record.name, values);

        Ok(match record.kind {
            EventKind::RingMined => Self::RingMined(RingMinedLog {
                ring_index: a.uint(0)?,
                ring_hash: a.b256(1)?,
                miner: a.address(2)?,
                fee_recipient: a.address(3)?,
                order_info: a.b256_list(4)?,
            }),
            EventKind::OrderCancelled => Self::OrderCancelled {
                order_hash: a.b256(0)?,
                amount_cancelled: a.uint(1)?,
            },
            EventKind::AllOrdersCancelled => Self::AllOrdersCancelled {
                owner: a.address(0)?,
                cutoff: a.uint(1)?,
            },
            EventKind::OrdersCancelled => Self::OrdersCancelled {
                owner: a.address(0)?,
                token1: a.address(1)?,
                token2: a.address(2)?,
                cutoff: a.uint(3)?,
            },
            EventKind::Transfer => Self::Transfer {
                from: a.address(0)?,
                to: a.address(1)?,
                value: a.uint(2)?,
            },
            EventKind::Approval => Self::Approval {
                owner: a.address(0)?,
                spender: a.address(1)?,
                value: a.uint(2)?,
            },
            EventKind::WethDeposit => Self::WethDeposit {
                owner: a.address(0)?,
                value: a.uint(1)?,
            },
            EventKind::WethWithdrawal => Self::WethWithdrawal {
                owner: a.address(0)?,
                value: a.uint(1)?,
            },
            EventKind::TokenRegistered => Self::TokenRegistered {
                token: a.address(0)?,
                symbol: a.string(1)?,
            },
            EventKind::TokenUnregistered => Self::TokenUnregistered {
                token: a.address(0)?,
                symbol: a.string(1)?,
            },
            EventKind::AddressAuthorized => Self::AddressAuthorized {
                protocol: a.address(0)?,
                number: a.small(1)?,
            },
            EventKind::AddressDeauthorized => Self::AddressDeauthorized {
                protocol: a.address(0)?,
                number: a.small(1)?,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRingCall {
    /// Number of orders in the submitted ring.
    pub ring_size: usize,
    pub fee_recipient: Address,
    pub fee_selections: u16,
}

/// `cancelOrder` arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelOrderCall {
    /// owner, tokenS, tokenB, wallet, authAddr
    pub addresses: [Address; 5],
    /// amountS, amountB, validSince, validUntil, lrcFee, cancelAmount
    pub order_values: [U256; 6],
    pub buy_no_more_than_amount_b: bool,
    pub margin_split_percentage: u8,
    pub v: u8,
    pub r: B256,
    pub s: B256,
}

impl CancelOrderCall {
    pub fn owner(&self) -> Address {
        self.addresses[0]
    }

    pub fn amount_cancelled(&self) -> U256 {
        self.order_values[5]
    }

    /// Hash identifying the order on `protocol`: keccak256 over the packed
    /// order fields (addresses as 20 bytes, amounts as 32 bytes, then one
    /// byte each for the flag and the margin split).
    pub fn order_hash(&self, protocol: Address) -> B256 {
        let mut packed = Vec::with_capacity(20 * 6 + 32 * 5 + 2);
        packed.extend_from_slice(protocol.as_slice());
        for addr in &self.addresses {
            packed.extend_from_slice(addr.as_slice());
        }
        for value in &self.order_values[..5] {
            packed.extend_from_slice(&value.to_be_bytes::<32>());
        }
        packed.push(u8::from(self.buy_no_more_than_amount_b));
        packed.push(self.margin_split_percentage);
        keccak256(&packed)
    }
}

/// A decoded allow-listed method call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodPayload {
    SubmitRing(SubmitRingCall),
    CancelOrder(CancelOrderCall),
    CancelAllOrders { cutoff: U256 },
    CancelAllOrdersByTradingPair { token1: Address, token2: Address, cutoff: U256 },
    Transfer { to: Address, value: U256 },
    Approve { spender: Address, value: U256 },
    WethDeposit,
    WethWithdrawal { value: U256 },
}

impl MethodPayload {
    pub fn decode(data: &MethodData) -> Result<Self, DecodeError> {
        let record = &data.record;
        let values = decode_call(&record.abi, &data.input)?;
        let a = Args::new(&record.name, values);

        Ok(match record.kind {
            MethodKind::SubmitRing => Self::SubmitRing(SubmitRingCall {
                ring_size: a.list(0)?.len(),
                fee_recipient: a.address(7)?,
                fee_selections: a.small(8)?,
            }),
            MethodKind::CancelOrder => Self::CancelOrder(CancelOrderCall {
                addresses: a.address_array::<5>(0)?,
                order_values: a.uint_array::<6>(1)?,
                buy_no_more_than_amount_b: a.bool(2)?,
                margin_split_percentage: a.small(3)?,
                v: a.small(4)?,
                r: a.b256(5)?,
                s: a.b256(6)?,
            }),
            MethodKind::CancelAllOrders => Self::CancelAllOrders { cutoff: a.uint(0)? },
            MethodKind::CancelAllOrdersByTradingPair => Self::CancelAllOrdersByTradingPair {
                token1: a.address(0)?,
                token2: a.address(1)?,
                cutoff: a.uint(2)?,
            },
            MethodKind::Transfer => Self::Transfer {
                to: a.address(0)?,
                value: a.uint(1)?,
            },
            MethodKind::Approve => Self::Approve {
                spender: a.address(0)?,
                value: a.uint(1)?,
            },
            MethodKind::WethDeposit => Self::WethDeposit,
            MethodKind::WethWithdrawal => Self::WethWithdrawal { value: a.uint(0)? },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(n_words: usize) -> RingMinedLog {
        RingMinedLog {
            ring_index: U256::from(9u64),
            ring_hash: B256::repeat_byte(0xaa),
            miner: Address::repeat_byte(1),
            fee_recipient: Address::repeat_byte(2),
            order_info: (0..n_words)
                .map(|i| B256::from(U256::from(i as u64 + 1)))
                .collect(),
        }
    }

    #[test]
    fn fills_split_by_stride_with_wraparound_neighbours() {
        let fills = ring(FILL_STRIDE * 3).fills().unwrap();
        assert_eq!(fills.len(), 3);

        assert_eq!(fills[0].order_hash, B256::from(U256::from(1u64)));
        assert_eq!(fills[0].amount_s, U256::from(2u64));
        assert_eq!(fills[0].split_b, U256::from(7u64));
        assert_eq!(fills[1].order_hash, B256::from(U256::from(8u64)));

        assert_eq!(fills[0].pre_order_hash, fills[2].order_hash);
        assert_eq!(fills[2].next_order_hash, fills[0].order_hash);
        assert_eq!(fills[1].pre_order_hash, fills[0].order_hash);
        assert_eq!(fills[1].next_order_hash, fills[2].order_hash);
    }

    #[test]
    fn malformed_order_info_is_rejected() {
        assert!(ring(FILL_STRIDE * 2 + 1).fills().is_err());
        assert!(ring(FILL_STRIDE).fills().is_err());
        assert!(ring(0).fills().is_err());
    }

    #[test]
    fn order_hash_depends_on_protocol_and_fields() {
        let call = CancelOrderCall {
            addresses: [Address::repeat_byte(1); 5],
            order_values: [U256::from(5u64); 6],
            buy_no_more_than_amount_b: false,
            margin_split_percentage: 50,
            v: 27,
            r: B256::ZERO,
            s: B256::ZERO,
        };
        let a = call.order_hash(Address::repeat_byte(0xee));
        let b = call.order_hash(Address::repeat_byte(0xef));
        assert_ne!(a, b);

        let mut flipped = call.clone();
        flipped.buy_no_more_than_amount_b = true;
        assert_ne!(a, flipped.order_hash(Address::repeat_byte(0xee)));

        // the cancel amount is not part of the order identity
        let mut other_amount = call.clone();
        other_amount.order_values[5] = U256::from(1u64);
        assert_eq!(a, other_amount.order_hash(Address::repeat_byte(0xee)));
        assert_eq!(call.amount_cancelled(), U256::from(5u64));
    }
}
