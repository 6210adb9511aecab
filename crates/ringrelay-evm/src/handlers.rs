//! Per-signature handlers: precondition, decode, convert, enrich, publish.
//!
//! Decode failures are logged with the transaction hash and counted; the
//! handler then returns `Ok` so one malformed payload never blocks the next.

use alloy_primitives::B256;
use async_trait::async_trait;
use ringrelay_bus::Handler;
use ringrelay_core::chain::TxInfo;
use ringrelay_core::error::{DecodeError, HandlerError};
use ringrelay_core::event::*;
use ringrelay_core::topic::Topic;
use std::sync::Arc;
use tracing::{debug, error};

use crate::processor::AbiProcessor;
use crate::record::{EventData, EventRecord, MethodData, MethodKind, MethodRecord, RawPayload};
use crate::typed::{LogPayload, MethodPayload, RingMinedLog};

enum Expected {
    Event(Arc<EventRecord>),
    Method(Arc<MethodRecord>),
}

/// Inbound subscription for one signature.
pub struct SignatureHandler {
    processor: Arc<AbiProcessor>,
    expected: Expected,
}

impl SignatureHandler {
    pub fn event(processor: Arc<AbiProcessor>, record: Arc<EventRecord>) -> Self {
        Self {
            processor,
            expected: Expected::Event(record),
        }
    }

    pub fn method(processor: Arc<AbiProcessor>, record: Arc<MethodRecord>) -> Self {
        Self {
            processor,
            expected: Expected::Method(record),
        }
    }
}

#[async_trait]
impl Handler<RawPayload> for SignatureHandler {
    async fn handle(&self, msg: RawPayload) -> Result<(), HandlerError> {
        match (&self.expected, msg) {
            (Expected::Event(rec), RawPayload::Log(data)) if rec.id == data.record.id => {
                self.processor.handle_event(data).await
            }
            (Expected::Method(rec), RawPayload::Method(data))
                if rec.selector == data.record.selector =>
            {
                self.processor.handle_method(data);
                Ok(())
            }
            (Expected::Event(rec), _) => Err(HandlerError::PayloadMismatch {
                expected: format!("log of event {}", rec.name),
            }),
            (Expected::Method(rec), _) => Err(HandlerError::PayloadMismatch {
                expected: format!("call of method {}", rec.name),
            }),
        }
    }
}

impl AbiProcessor {
    fn decode_failed(&self, what: &str, tx: &TxInfo, err: &DecodeError) {
        error!(tx = %tx.tx_hash, "{what} decode error: {err}");
        self.metrics().decode_errors += 1;
    }

    pub(crate) async fn handle_event(&self, data: EventData) -> Result<(), HandlerError> {
        let payload = match LogPayload::decode(&data) {
            Ok(p) => p,
            Err(e) => {
                self.decode_failed(&data.record.name, &data.tx, &e);
                return Ok(());
            }
        };
        let tx = data.tx;

        match payload {
            LogPayload::RingMined(ring) => return self.handle_ring_mined(tx, ring).await,
            LogPayload::OrderCancelled {
                order_hash,
                amount_cancelled,
            } => {
                debug!(tx = %tx.tx_hash, order = %order_hash, amount = %amount_cancelled, "order cancelled event");
                self.publish(
                    &[Topic::OrderManagerCancel, Topic::TxManagerCancelEvent],
                    RelayEvent::OrderCancelled(OrderCancelledEvent {
                        tx,
                        order_hash,
                        amount_cancelled,
                    }),
                );
            }
            LogPayload::AllOrdersCancelled { owner, cutoff } => {
                debug!(tx = %tx.tx_hash, owner = %owner, cutoff = %cutoff, "cutoff event");
                self.publish(
                    &[Topic::OrderManagerCutoff, Topic::TxManagerCutoffEvent],
                    RelayEvent::Cutoff(CutoffEvent { tx, owner, cutoff }),
                );
            }
            LogPayload::OrdersCancelled {
                owner,
                token1,
                token2,
                cutoff,
            } => {
                debug!(tx = %tx.tx_hash, owner = %owner, token1 = %token1, token2 = %token2, cutoff = %cutoff, "cutoff pair event");
                self.publish(
                    &[Topic::OrderManagerCutoffPair, Topic::TxManagerCutoffPairEvent],
                    RelayEvent::CutoffPair(CutoffPairEvent {
                        tx,
                        owner,
                        token1,
                        token2,
                        cutoff,
                    }),
                );
            }
            LogPayload::Transfer { from, to, value } => {
                debug!(tx = %tx.tx_hash, from = %from, to = %to, value = %value, "transfer event");
                self.publish(
                    &[Topic::AccountTransfer, Topic::TxManagerTransferEvent],
                    RelayEvent::Transfer(TransferEvent {
                        tx,
                        sender: from,
                        receiver: to,
                        value,
                    }),
                );
            }
            LogPayload::Approval {
                owner,
                spender,
                value,
            } => {
                debug!(tx = %tx.tx_hash, owner = %owner, spender = %spender, value = %value, "approval event");
                let topics: &[Topic] = if self.has_spender(&spender) {
                    &[Topic::AccountApproval, Topic::TxManagerApprovalEvent]
                } else {
                    &[Topic::TxManagerApprovalEvent]
                };
                self.publish(
                    topics,
                    RelayEvent::Approval(ApprovalEvent {
                        tx,
                        owner,
                        spender,
                        value,
                    }),
                );
            }
            LogPayload::WethDeposit { owner, value } => {
                debug!(tx = %tx.tx_hash, owner = %owner, value = %value, "weth deposit event");
                self.publish(
                    &[Topic::AccountWethDeposit, Topic::TxManagerWethDepositEvent],
                    RelayEvent::WethDeposit(WethDepositEvent { tx, owner, value }),
                );
            }
            LogPayload::WethWithdrawal { owner, value } => {
                debug!(tx = %tx.tx_hash, owner = %owner, value = %value, "weth withdrawal event");
                self.publish(
                    &[Topic::AccountWethWithdrawal, Topic::TxManagerWethWithdrawalEvent],
                    RelayEvent::WethWithdrawal(WethWithdrawalEvent { tx, owner, value }),
                );
            }
            LogPayload::TokenRegistered { token, symbol } => {
                debug!(tx = %tx.tx_hash, token = %token, symbol = %symbol, "token registered");
                self.publish(
                    &[Topic::TokenRegistered],
                    RelayEvent::TokenRegistered(TokenRegisteredEvent { tx, token, symbol }),
                );
            }
            LogPayload::TokenUnregistered { token, symbol } => {
                debug!(tx = %tx.tx_hash, token = %token, symbol = %symbol, "token unregistered");
                self.publish(
                    &[Topic::TokenUnregistered],
                    RelayEvent::TokenUnregistered(TokenUnregisteredEvent { tx, token, symbol }),
                );
            }
            LogPayload::AddressAuthorized { protocol, number } => {
                debug!(tx = %tx.tx_hash, protocol = %protocol, number, "address authorized");
                self.publish(
                    &[Topic::AddressAuthorized],
                    RelayEvent::AddressAuthorized(AddressAuthorizedEvent {
                        tx,
                        protocol,
                        number,
                    }),
                );
            }
            LogPayload::AddressDeauthorized { protocol, number } => {
                debug!(tx = %tx.tx_hash, protocol = %protocol, number, "address deauthorized");
                self.publish(
                    &[Topic::AddressDeauthorized],
                    RelayEvent::AddressDeauthorized(AddressDeauthorizedEvent {
                        tx,
                        protocol,
                        number,
                    }),
                );
            }
        }
        self.metrics().decoded += 1;
        Ok(())
    }

    /// Publish the ring summary, then every fill whose order is known, with
    /// token, owner, market and circular counterparties attached.
    async fn handle_ring_mined(&self, tx: TxInfo, ring: RingMinedLog) -> Result<(), HandlerError> {
        let fills = match ring.fills() {
            Ok(f) => f,
            Err(e) => {
                self.decode_failed("RingMined", &tx, &e);
                return Ok(());
            }
        };

        debug!(
            tx = %tx.tx_hash,
            ring_hash = %ring.ring_hash,
            ring_index = %ring.ring_index,
            fills = fills.len(),
            "ring mined event"
        );
        self.publish(
            &[Topic::OrderManagerRingMined, Topic::TxManagerRingMined],
            RelayEvent::RingMined(RingMinedEvent {
                tx: tx.clone(),
                ring_index: ring.ring_index,
                ring_hash: ring.ring_hash,
                miner: ring.miner,
                fee_recipient: ring.fee_recipient,
                fill_count: fills.len(),
            }),
        );

        let hashes: Vec<String> = fills.iter().map(|f| order_key(&f.order_hash)).collect();
        let stored = self.orders.orders_by_hash(&hashes).await?;

        let mut matched = Vec::with_capacity(fills.len());
        for fill in fills {
            let Some(order) = stored.get(&order_key(&fill.order_hash)) else {
                debug!(tx = %tx.tx_hash, order = %fill.order_hash, "fill does not match a stored order");
                self.metrics().unmatched_fills += 1;
                continue;
            };
            let market = self
                .market
                .wrap_market_by_address(&order.token_b, &order.token_s)
                .unwrap_or_else(|e| {
                    debug!(tx = %tx.tx_hash, order = %fill.order_hash, "no market for fill: {e}");
                    String::new()
                });
            matched.push(OrderFilledEvent {
                tx: tx.clone(),
                ring_hash: ring.ring_hash,
                pre_order_hash: fill.pre_order_hash,
                order_hash: fill.order_hash,
                next_order_hash: fill.next_order_hash,
                amount_s: fill.amount_s,
                amount_b: fill.amount_b,
                lrc_reward: fill.lrc_reward,
                lrc_fee: fill.lrc_fee,
                split_s: fill.split_s,
                split_b: fill.split_b,
                fill_index: fill.fill_index,
                token_s: order.token_s,
                token_b: order.token_b,
                owner: order.owner,
                market,
                sell_to: Default::default(),
                buy_from: Default::default(),
            });
        }

        let n = matched.len();
        let owners: Vec<_> = matched.iter().map(|f| f.owner).collect();
        for (i, mut fill) in matched.into_iter().enumerate() {
            fill.sell_to = owners[(i + 1) % n];
            fill.buy_from = owners[(i + n - 1) % n];
            debug!(
                tx = %tx.tx_hash,
                order = %fill.order_hash,
                amount_s = %fill.amount_s,
                amount_b = %fill.amount_b,
                market = %fill.market,
                "order filled"
            );
            self.publish(
                &[Topic::OrderManagerFill, Topic::TxManagerFill],
                RelayEvent::OrderFilled(fill),
            );
        }

        self.metrics().decoded += 1;
        Ok(())
    }

    pub(crate) fn handle_method(&self, data: MethodData) {
        if data.record.kind == MethodKind::SubmitRing {
            self.handle_submit_ring(data);
            return;
        }

        let payload = match MethodPayload::decode(&data) {
            Ok(p) => p,
            Err(e) => {
                self.decode_failed(&data.record.name, &data.tx, &e);
                return;
            }
        };
        let tx = data.tx;

        match payload {
            // handled above
            MethodPayload::SubmitRing(_) => return,
            MethodPayload::CancelOrder(call) => {
                let order_hash = call.order_hash(tx.to);
                debug!(tx = %tx.tx_hash, order = %order_hash, amount = %call.amount_cancelled(), status = %tx.status, "cancel order method");
                self.publish(
                    &[Topic::TxManagerCancelMethod],
                    RelayEvent::OrderCancelled(OrderCancelledEvent {
                        tx,
                        order_hash,
                        amount_cancelled: call.amount_cancelled(),
                    }),
                );
            }
            MethodPayload::CancelAllOrders { cutoff } => {
                let owner = tx.from;
                debug!(tx = %tx.tx_hash, owner = %owner, cutoff = %cutoff, status = %tx.status, "cutoff method");
                self.publish(
                    &[Topic::TxManagerCutoffMethod],
                    RelayEvent::Cutoff(CutoffEvent { tx, owner, cutoff }),
                );
            }
            MethodPayload::CancelAllOrdersByTradingPair {
                token1,
                token2,
                cutoff,
            } => {
                let owner = tx.from;
                debug!(tx = %tx.tx_hash, owner = %owner, token1 = %token1, token2 = %token2, status = %tx.status, "cutoff pair method");
                self.publish(
                    &[Topic::TxManagerCutoffPairMethod],
                    RelayEvent::CutoffPair(CutoffPairEvent {
                        tx,
                        owner,
                        token1,
                        token2,
                        cutoff,
                    }),
                );
            }
            MethodPayload::Transfer { to, value } => {
                let sender = tx.from;
                debug!(tx = %tx.tx_hash, from = %sender, to = %to, value = %value, status = %tx.status, "transfer method");
                self.publish(
                    &[Topic::TxManagerTransferMethod],
                    RelayEvent::Transfer(TransferEvent {
                        tx,
                        sender,
                        receiver: to,
                        value,
                    }),
                );
            }
            MethodPayload::Approve { spender, value } => {
                let owner = tx.from;
                debug!(tx = %tx.tx_hash, owner = %owner, spender = %spender, value = %value, status = %tx.status, "approve method");
                let topics: &[Topic] = if self.has_spender(&spender) {
                    &[Topic::AccountApproveMethod, Topic::TxManagerApproveMethod]
                } else {
                    &[Topic::TxManagerApproveMethod]
                };
                self.publish(
                    topics,
                    RelayEvent::Approval(ApprovalEvent {
                        tx,
                        owner,
                        spender,
                        value,
                    }),
                );
            }
            MethodPayload::WethDeposit => {
                let owner = tx.from;
                debug!(tx = %tx.tx_hash, owner = %owner, value = %data.value, status = %tx.status, "weth deposit method");
                self.publish(
                    &[Topic::AccountWethDepositMethod, Topic::TxManagerWethDepositMethod],
                    RelayEvent::WethDeposit(WethDepositEvent {
                        tx,
                        owner,
                        value: data.value,
                    }),
                );
            }
            MethodPayload::WethWithdrawal { value } => {
                let owner = tx.from;
                debug!(tx = %tx.tx_hash, owner = %owner, value = %value, status = %tx.status, "weth withdrawal method");
                self.publish(
                    &[Topic::AccountWethWithdrawalMethod, Topic::TxManagerWethWithdrawalMethod],
                    RelayEvent::WethWithdrawal(WethWithdrawalEvent { tx, owner, value }),
                );
            }
        }
        self.metrics().decoded += 1;
    }

    /// The attempt is published before anything is decoded. Only a
    /// successful submission is unpacked further.
    fn handle_submit_ring(&self, data: MethodData) {
        let failure = data.failure();
        self.publish(
            &[Topic::MinerSubmitRing],
            RelayEvent::SubmitRing(SubmitRingMethodEvent {
                tx: data.tx.clone(),
                error: failure.clone(),
            }),
        );

        if let Some(reason) = failure {
            debug!(tx = %data.tx.tx_hash, "submit ring not decoded: {reason}");
            return;
        }

        match MethodPayload::decode(&data) {
            Ok(MethodPayload::SubmitRing(call)) => {
                debug!(
                    tx = %data.tx.tx_hash,
                    ring_size = call.ring_size,
                    fee_recipient = %call.fee_recipient,
                    "submit ring method"
                );
                self.metrics().decoded += 1;
            }
            Ok(_) => {}
            Err(e) => self.decode_failed("submitRing", &data.tx, &e),
        }
    }
}

/// Order store key: lower-case `0x` hex.
fn order_key(hash: &B256) -> String {
    format!("{hash:#x}")
}
