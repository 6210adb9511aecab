//! End-to-end runs: raw transaction + logs in, domain events out.

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, Bytes, B256, U256};
use ringrelay_bus::{Dispatcher, Recorder, Watcher};
use ringrelay_core::chain::{RawLog, RawReceipt, RawTransaction, TxStatus};
use ringrelay_core::config::ProtocolDeployment;
use ringrelay_core::event::RelayEvent;
use ringrelay_core::source::{
    MemoryOrderStore, StaticCatalog, StaticUnlocker, StoredOrder, TokenRecord,
};
use ringrelay_core::topic::Topic;
use ringrelay_evm::{AbiProcessor, CancelOrderCall, ContractFamily, Extractor, ProcessorDeps};
use ringrelay_market::MarketRegistry;
use std::sync::Arc;

const PROTOCOL: Address = Address::repeat_byte(0xa0);
const REGISTRY: Address = Address::repeat_byte(0xa1);
const DELEGATE: Address = Address::repeat_byte(0xa2);
const LRC: Address = Address::repeat_byte(0x10);
const EOS: Address = Address::repeat_byte(0x30);
const WETH: Address = Address::repeat_byte(0x20);
const ALICE: Address = Address::repeat_byte(0x51);
const BOB: Address = Address::repeat_byte(0x52);
const CAROL: Address = Address::repeat_byte(0x53);

type Seen = Recorder<(Topic, RelayEvent)>;

struct Harness {
    extractor: Extractor,
    market: Arc<MarketRegistry>,
    seen: Seen,
}

impl Harness {
    async fn new(unlocked: Vec<Address>, orders: Vec<StoredOrder>) -> Self {
        let market = Arc::new(MarketRegistry::default());
        let tokens = StaticCatalog::new(vec![
            TokenRecord::new("LRC", LRC),
            TokenRecord::new("EOS", EOS),
        ]);
        let markets = StaticCatalog::new(vec![TokenRecord::new("WETH", WETH)]);
        market.initialize(&tokens, &markets).await.unwrap();

        let outbound = Arc::new(Dispatcher::new("outbound"));
        let seen = Seen::new();
        for topic in Topic::ALL {
            outbound.on(topic, Watcher::serial(Arc::new(seen.tagged(topic))));
        }

        let processor = AbiProcessor::new(
            &[ProtocolDeployment {
                version: "v1.5".into(),
                protocol: PROTOCOL,
                token_registry: REGISTRY,
                delegate: DELEGATE,
            }],
            ProcessorDeps {
                market: Arc::clone(&market),
                orders: Arc::new(orders.into_iter().collect::<MemoryOrderStore>()),
                accounts: Arc::new(StaticUnlocker::new(unlocked)),
                outbound,
            },
        )
        .unwrap();

        Self {
            extractor: Extractor::new(Arc::new(processor), false),
            market,
            seen,
        }
    }

    async fn run(&self, tx: &RawTransaction, receipt: Option<&RawReceipt>, logs: &[RawLog]) {
        self.extractor.process_transaction(tx, receipt, 1_520_000_000, logs);
        self.extractor.flush().await;
    }

    fn on(&self, topic: Topic) -> Vec<RelayEvent> {
        self.seen
            .messages()
            .into_iter()
            .filter(|(t, _)| *t == topic)
            .map(|(_, e)| e)
            .collect()
    }

    fn topics(&self) -> Vec<Topic> {
        let mut t: Vec<Topic> = self.seen.messages().into_iter().map(|(t, _)| t).collect();
        t.sort();
        t
    }
}

fn ok() -> RawReceipt {
    RawReceipt {
        gas_used: U256::from(50_000u64),
        success: true,
    }
}

fn failed() -> RawReceipt {
    RawReceipt {
        gas_used: U256::from(50_000u64),
        success: false,
    }
}

fn tx(from: Address, to: Address, value: u64, input: Vec<u8>) -> RawTransaction {
    RawTransaction {
        hash: B256::repeat_byte(0xcc),
        from,
        to: Some(to),
        value: U256::from(value),
        gas: U256::from(300_000u64),
        gas_price: U256::from(20_000_000_000u64),
        nonce: U256::from(1u64),
        block_number: 5_000_000,
        block_hash: B256::repeat_byte(0xbb),
        input: Bytes::from(input),
    }
}

fn event_id(family: ContractFamily, name: &str) -> B256 {
    family.abi().unwrap().events[name][0].selector()
}

fn calldata(family: ContractFamily, name: &str, args: Vec<DynSolValue>) -> Vec<u8> {
    let abi = family.abi().unwrap();
    let mut input = abi.functions[name][0].selector().to_vec();
    if !args.is_empty() {
        input.extend(DynSolValue::Tuple(args).abi_encode_params());
    }
    input
}

fn log(address: Address, topics: Vec<B256>, body: Vec<DynSolValue>, log_index: u64) -> RawLog {
    RawLog {
        address,
        topics,
        data: Bytes::from(DynSolValue::Tuple(body).abi_encode_params()),
        log_index,
    }
}

fn uint(v: u64) -> DynSolValue {
    DynSolValue::Uint(U256::from(v), 256)
}

fn transfer_log(topics: usize, log_index: u64) -> RawLog {
    let all = vec![
        event_id(ContractFamily::Erc20, "Transfer"),
        ALICE.into_word(),
        BOB.into_word(),
    ];
    log(LRC, all[..topics].to_vec(), vec![uint(1_000)], log_index)
}

#[tokio::test]
async fn transfer_log_reaches_account_and_tx_manager() {
    let h = Harness::new(vec![], vec![]).await;
    let t = tx(ALICE, LRC, 0, vec![]);
    h.run(&t, Some(&ok()), &[transfer_log(3, 4)]).await;

    let mut expected = vec![Topic::TxManagerTransferEvent, Topic::AccountTransfer];
    expected.sort();
    assert_eq!(h.topics(), expected);
    let RelayEvent::Transfer(evt) = &h.on(Topic::AccountTransfer)[0] else {
        panic!("expected a transfer");
    };
    assert_eq!(evt.sender, ALICE);
    assert_eq!(evt.receiver, BOB);
    assert_eq!(evt.value, U256::from(1_000u64));
    assert_eq!(evt.tx.log_index, 5);
    assert_eq!(evt.tx.protocol, LRC);
    assert_eq!(evt.tx.status, TxStatus::Success);
    assert_eq!(evt.tx.block_time, 1_520_000_000);
}

#[tokio::test]
async fn log_missing_indexed_topics_publishes_nothing() {
    let h = Harness::new(vec![], vec![]).await;
    let t = tx(ALICE, LRC, 0, vec![]);
    h.run(&t, Some(&ok()), &[transfer_log(2, 0)]).await;

    assert!(h.seen.is_empty());
    assert_eq!(h.extractor.processor().metrics_snapshot().decode_errors, 1);
}

#[tokio::test]
async fn logs_of_failed_or_unknown_sources_are_skipped() {
    let h = Harness::new(vec![], vec![]).await;
    let t = tx(ALICE, LRC, 0, vec![]);

    let summary = h.extractor.process_transaction(&t, Some(&failed()), 0, &[transfer_log(3, 0)]);
    assert_eq!(summary.status, TxStatus::Failed);
    assert_eq!(summary.skipped_logs, 1);

    let mut foreign = transfer_log(3, 1);
    foreign.address = Address::repeat_byte(0x99);
    let summary = h.extractor.process_transaction(&t, Some(&ok()), 0, &[foreign]);
    assert_eq!(summary.logs, 0);

    h.extractor.flush().await;
    assert!(h.seen.is_empty());
}

fn order(hash: B256, owner: Address) -> StoredOrder {
    StoredOrder {
        order_hash: format!("{hash:#x}"),
        token_s: LRC,
        token_b: WETH,
        owner,
    }
}

fn fill_words(hash: B256, amount_s: u64) -> Vec<DynSolValue> {
    let mut words = vec![DynSolValue::FixedBytes(hash, 32)];
    for v in [amount_s, amount_s * 2, 3, 4, 5, 6] {
        words.push(DynSolValue::FixedBytes(B256::from(U256::from(v)), 32));
    }
    words
}

#[tokio::test]
async fn ring_mined_publishes_matched_fills_with_circular_counterparties() {
    let h1 = B256::repeat_byte(0x01);
    let h2 = B256::repeat_byte(0x02);
    let unknown = B256::repeat_byte(0x0f);
    let h3 = B256::repeat_byte(0x03);
    let h = Harness::new(
        vec![],
        vec![order(h1, ALICE), order(h2, BOB), order(h3, CAROL)],
    )
    .await;

    let ring_hash = B256::repeat_byte(0xee);
    let info: Vec<DynSolValue> = [(h1, 10), (h2, 20), (unknown, 30), (h3, 40)]
        .into_iter()
        .flat_map(|(hash, amt)| fill_words(hash, amt))
        .collect();
    let ring = log(
        PROTOCOL,
        vec![event_id(ContractFamily::Protocol, "RingMined"), ring_hash],
        vec![
            uint(77),
            DynSolValue::Address(Address::repeat_byte(0x61)),
            DynSolValue::Address(Address::repeat_byte(0x62)),
            DynSolValue::Array(info),
        ],
        2,
    );
    let t = tx(Address::repeat_byte(0x61), PROTOCOL, 0, vec![]);
    h.run(&t, Some(&ok()), &[ring]).await;

    for topic in [Topic::OrderManagerRingMined, Topic::TxManagerRingMined] {
        let summaries = h.on(topic);
        assert_eq!(summaries.len(), 1);
        let RelayEvent::RingMined(s) = &summaries[0] else {
            panic!("expected a ring summary");
        };
        assert_eq!(s.ring_hash, ring_hash);
        assert_eq!(s.ring_index, U256::from(77u64));
        assert_eq!(s.fill_count, 4);
    }

    let mut fills: Vec<_> = h
        .on(Topic::OrderManagerFill)
        .into_iter()
        .filter_map(|e| match e {
            RelayEvent::OrderFilled(f) => Some(f),
            _ => None,
        })
        .collect();
    fills.sort_by_key(|f| f.fill_index);
    assert_eq!(fills.len(), 3);
    assert_eq!(h.on(Topic::TxManagerFill).len(), 3);

    let hashes: Vec<_> = fills.iter().map(|f| f.order_hash).collect();
    assert_eq!(hashes, vec![h1, h2, h3]);
    assert!(fills.iter().all(|f| f.order_hash != unknown));

    assert_eq!((fills[0].sell_to, fills[0].buy_from), (BOB, CAROL));
    assert_eq!((fills[1].sell_to, fills[1].buy_from), (CAROL, ALICE));
    assert_eq!((fills[2].sell_to, fills[2].buy_from), (ALICE, BOB));

    // neighbour hashes follow the full ring, including the unknown order
    assert_eq!(fills[2].pre_order_hash, unknown);
    assert_eq!(fills[2].next_order_hash, h1);

    assert_eq!(fills[1].amount_s, U256::from(20u64));
    assert_eq!(fills[1].amount_b, U256::from(40u64));
    assert!(fills.iter().all(|f| f.market == "weth-lrc"));
    assert_eq!(fills[0].owner, ALICE);
    assert_eq!(h.extractor.processor().metrics_snapshot().unmatched_fills, 1);
}

#[tokio::test]
async fn two_matched_fills_point_at_each_other() {
    let h1 = B256::repeat_byte(0x01);
    let unknown = B256::repeat_byte(0x0f);
    let h2 = B256::repeat_byte(0x02);
    let h = Harness::new(vec![], vec![order(h1, ALICE), order(h2, BOB)]).await;

    let info: Vec<DynSolValue> = [(h1, 10), (unknown, 20), (h2, 30)]
        .into_iter()
        .flat_map(|(hash, amt)| fill_words(hash, amt))
        .collect();
    let ring = log(
        PROTOCOL,
        vec![event_id(ContractFamily::Protocol, "RingMined"), B256::repeat_byte(0xed)],
        vec![
            uint(78),
            DynSolValue::Address(Address::repeat_byte(0x61)),
            DynSolValue::Address(Address::repeat_byte(0x62)),
            DynSolValue::Array(info),
        ],
        0,
    );
    let t = tx(Address::repeat_byte(0x61), PROTOCOL, 0, vec![]);
    h.run(&t, Some(&ok()), &[ring]).await;

    let RelayEvent::RingMined(summary) = &h.on(Topic::OrderManagerRingMined)[0] else {
        panic!("expected a ring summary");
    };
    assert_eq!(summary.fill_count, 3);

    let mut fills: Vec<_> = h
        .on(Topic::OrderManagerFill)
        .into_iter()
        .filter_map(|e| match e {
            RelayEvent::OrderFilled(f) => Some(f),
            _ => None,
        })
        .collect();
    fills.sort_by_key(|f| f.fill_index);
    assert_eq!(fills.len(), 2);
    assert_eq!((fills[0].owner, fills[1].owner), (ALICE, BOB));
    assert_eq!((fills[0].sell_to, fills[0].buy_from), (BOB, BOB));
    assert_eq!((fills[1].sell_to, fills[1].buy_from), (ALICE, ALICE));
    assert_eq!(h.extractor.processor().metrics_snapshot().unmatched_fills, 1);
}

#[tokio::test]
async fn failed_submit_ring_publishes_one_attempt_with_error() {
    let h = Harness::new(vec![], vec![]).await;
    let mut input = calldata(ContractFamily::Protocol, "submitRing", vec![]);
    input.extend([0u8; 8]);
    let t = tx(Address::repeat_byte(0x61), PROTOCOL, 0, input);

    h.run(&t, Some(&failed()), &[transfer_log(3, 0)]).await;

    let seen = h.seen.messages();
    assert_eq!(seen.len(), 1);
    let (topic, RelayEvent::SubmitRing(evt)) = &seen[0] else {
        panic!("expected a submit ring attempt");
    };
    assert_eq!(*topic, Topic::MinerSubmitRing);
    assert!(evt.error.is_some());
    assert_eq!(evt.tx.status, TxStatus::Failed);
    assert_eq!(evt.tx.log_index, 0);
}

#[tokio::test]
async fn successful_submit_ring_is_announced_even_if_undecodable() {
    let h = Harness::new(vec![], vec![]).await;
    let mut input = calldata(ContractFamily::Protocol, "submitRing", vec![]);
    input.extend([0u8; 8]);
    let t = tx(Address::repeat_byte(0x61), PROTOCOL, 0, input);

    h.run(&t, Some(&ok()), &[]).await;

    let attempts = h.on(Topic::MinerSubmitRing);
    assert_eq!(attempts.len(), 1);
    let RelayEvent::SubmitRing(evt) = &attempts[0] else {
        panic!("expected a submit ring attempt");
    };
    assert!(evt.error.is_none());
    assert_eq!(h.extractor.processor().metrics_snapshot().decode_errors, 1);
}

fn approval_log(spender: Address) -> RawLog {
    log(
        LRC,
        vec![
            event_id(ContractFamily::Erc20, "Approval"),
            ALICE.into_word(),
            spender.into_word(),
        ],
        vec![uint(500)],
        0,
    )
}

#[tokio::test]
async fn approval_reaches_accounts_only_for_delegate_spender() {
    let h = Harness::new(vec![], vec![]).await;
    let t = tx(ALICE, LRC, 0, vec![]);

    h.run(&t, Some(&ok()), &[approval_log(Address::repeat_byte(0x77))]).await;
    assert_eq!(h.topics(), vec![Topic::TxManagerApprovalEvent]);

    h.seen.clear();
    h.run(&t, Some(&ok()), &[approval_log(DELEGATE)]).await;
    let mut expected = vec![Topic::TxManagerApprovalEvent, Topic::AccountApproval];
    expected.sort();
    assert_eq!(h.topics(), expected);
}

#[tokio::test]
async fn approve_method_of_pending_tx_forwards_status() {
    let h = Harness::new(vec![], vec![]).await;
    let input = calldata(
        ContractFamily::Erc20,
        "approve",
        vec![DynSolValue::Address(DELEGATE), uint(9)],
    );
    let t = tx(ALICE, LRC, 0, input);
    h.run(&t, None, &[]).await;

    let mut expected = vec![Topic::AccountApproveMethod, Topic::TxManagerApproveMethod];
    expected.sort();
    assert_eq!(h.topics(), expected);
    let RelayEvent::Approval(evt) = &h.on(Topic::TxManagerApproveMethod)[0] else {
        panic!("expected an approval");
    };
    assert_eq!(evt.owner, ALICE);
    assert_eq!(evt.spender, DELEGATE);
    assert_eq!(evt.tx.status, TxStatus::Pending);
    assert_eq!(evt.tx.gas_used, U256::ZERO);
}

#[tokio::test]
async fn cancel_order_method_hashes_the_order() {
    let h = Harness::new(vec![], vec![]).await;
    let addresses = [ALICE, LRC, WETH, Address::repeat_byte(0x70), Address::repeat_byte(0x71)];
    let values = [100u64, 200, 1, 2, 3, 40];
    let input = calldata(
        ContractFamily::Protocol,
        "cancelOrder",
        vec![
            DynSolValue::FixedArray(addresses.iter().map(|a| DynSolValue::Address(*a)).collect()),
            DynSolValue::FixedArray(values.iter().map(|v| uint(*v)).collect()),
            DynSolValue::Bool(true),
            DynSolValue::Uint(U256::from(50u64), 8),
            DynSolValue::Uint(U256::from(27u64), 8),
            DynSolValue::FixedBytes(B256::repeat_byte(1), 32),
            DynSolValue::FixedBytes(B256::repeat_byte(2), 32),
        ],
    );
    let t = tx(ALICE, PROTOCOL, 0, input);
    h.run(&t, Some(&ok()), &[]).await;

    let expected = CancelOrderCall {
        addresses,
        order_values: values.map(U256::from),
        buy_no_more_than_amount_b: true,
        margin_split_percentage: 50,
        v: 27,
        r: B256::repeat_byte(1),
        s: B256::repeat_byte(2),
    }
    .order_hash(PROTOCOL);

    let cancels = h.on(Topic::TxManagerCancelMethod);
    assert_eq!(cancels.len(), 1);
    let RelayEvent::OrderCancelled(evt) = &cancels[0] else {
        panic!("expected a cancellation");
    };
    assert_eq!(evt.order_hash, expected);
    assert_eq!(evt.amount_cancelled, U256::from(40u64));
}

#[tokio::test]
async fn deauthorization_has_its_own_topic() {
    let h = Harness::new(vec![], vec![]).await;
    let deauth = log(
        DELEGATE,
        vec![
            event_id(ContractFamily::Delegate, "AddressDeauthorized"),
            PROTOCOL.into_word(),
        ],
        vec![DynSolValue::Uint(U256::from(3u64), 32)],
        0,
    );
    let t = tx(ALICE, DELEGATE, 0, vec![]);
    h.run(&t, Some(&ok()), &[deauth]).await;

    assert_eq!(h.topics(), vec![Topic::AddressDeauthorized]);
    let RelayEvent::AddressDeauthorized(evt) = &h.on(Topic::AddressDeauthorized)[0] else {
        panic!("expected a deauthorization");
    };
    assert_eq!(evt.protocol, PROTOCOL);
    assert_eq!(evt.number, 3);
}

#[tokio::test]
async fn token_registered_decodes_string_symbol() {
    let h = Harness::new(vec![], vec![]).await;
    let registered = log(
        REGISTRY,
        vec![event_id(ContractFamily::TokenRegistry, "TokenRegistered")],
        vec![
            DynSolValue::Address(Address::repeat_byte(0x40)),
            DynSolValue::String("RDN".into()),
        ],
        0,
    );
    let t = tx(ALICE, REGISTRY, 0, vec![]);
    h.run(&t, Some(&ok()), &[registered]).await;

    let RelayEvent::TokenRegistered(evt) = &h.on(Topic::TokenRegistered)[0] else {
        panic!("expected a token registration");
    };
    assert_eq!(evt.symbol, "RDN");
    assert_eq!(evt.token, Address::repeat_byte(0x40));
}

#[tokio::test]
async fn weth_deposit_method_uses_tx_value() {
    let h = Harness::new(vec![], vec![]).await;
    let input = calldata(ContractFamily::Weth, "deposit", vec![]);
    let t = tx(ALICE, WETH, 1_000, input);
    h.run(&t, Some(&ok()), &[]).await;

    let mut expected = vec![Topic::AccountWethDepositMethod, Topic::TxManagerWethDepositMethod];
    expected.sort();
    assert_eq!(h.topics(), expected);
    let RelayEvent::WethDeposit(evt) = &h.on(Topic::AccountWethDepositMethod)[0] else {
        panic!("expected a deposit");
    };
    assert_eq!(evt.owner, ALICE);
    assert_eq!(evt.value, U256::from(1_000u64));
}

#[tokio::test]
async fn plain_value_transfer_between_accounts() {
    let h = Harness::new(vec![ALICE], vec![]).await;
    let t = tx(ALICE, BOB, 42, vec![]);
    let summary = h.extractor.process_transaction(&t, Some(&ok()), 7, &[]);
    h.extractor.flush().await;
    assert!(summary.eth_transfer);
    assert!(!summary.method);

    assert_eq!(h.topics(), vec![Topic::TxManagerEthTransfer]);
    let RelayEvent::Transfer(evt) = &h.on(Topic::TxManagerEthTransfer)[0] else {
        panic!("expected a transfer");
    };
    assert_eq!(evt.tx.symbol, "ETH");
    assert_eq!(evt.tx.protocol, Address::ZERO);
    assert_eq!(evt.tx.log_index, 0);
    assert_eq!(evt.value, U256::from(42u64));
    assert_eq!(evt.receiver, BOB);
    assert_eq!(evt.tx.status, TxStatus::Success);

    for (receipt, status) in [(Some(failed()), TxStatus::Failed), (None, TxStatus::Pending)] {
        h.seen.clear();
        h.run(&t, receipt.as_ref(), &[]).await;
        let RelayEvent::Transfer(evt) = &h.on(Topic::TxManagerEthTransfer)[0] else {
            panic!("expected a transfer");
        };
        assert_eq!(evt.tx.status, status);
        if receipt.is_none() {
            assert_eq!(evt.tx.gas_used, U256::ZERO);
        }
    }

    // neither side unlocked
    h.seen.clear();
    let t = tx(BOB, CAROL, 42, vec![]);
    h.run(&t, Some(&ok()), &[]).await;
    assert!(h.seen.is_empty());
}

#[tokio::test]
async fn token_listed_after_start_is_picked_up_on_reload() {
    const RDN: Address = Address::repeat_byte(0x40);
    let h = Harness::new(vec![ALICE], vec![]).await;
    let mut rdn_transfer = transfer_log(3, 0);
    rdn_transfer.address = RDN;
    let t = tx(ALICE, RDN, 0, vec![]);

    let summary = h.extractor.process_transaction(&t, Some(&ok()), 0, &[rdn_transfer.clone()]);
    assert_eq!(summary.logs, 0);
    let paid = tx(ALICE, RDN, 5, vec![]);
    assert!(h.extractor.processor().is_valid_eth_transfer_transaction(&paid));

    let tokens = StaticCatalog::new(vec![
        TokenRecord::new("LRC", LRC),
        TokenRecord::new("EOS", EOS),
        TokenRecord::new("RDN", RDN),
    ]);
    let markets = StaticCatalog::new(vec![TokenRecord::new("WETH", WETH)]);
    h.market.initialize(&tokens, &markets).await.unwrap();
    h.extractor.flush().await;
    h.seen.clear();

    let summary = h.extractor.process_transaction(&t, Some(&ok()), 0, &[rdn_transfer]);
    assert_eq!(summary.logs, 1);
    h.extractor.flush().await;
    let RelayEvent::Transfer(evt) = &h.on(Topic::AccountTransfer)[0] else {
        panic!("expected a transfer");
    };
    assert_eq!(evt.tx.protocol, RDN);
    assert!(!h.extractor.processor().is_valid_eth_transfer_transaction(&paid));
}
