//! The decode registry.
//!
//! Holds one record per allow-listed event/method signature, the sets of
//! known contract addresses, and the collaborators handlers need. Records
//! are subscribed on the inbound bus by [`AbiProcessor::register`]; handlers
//! publish domain events on the outbound bus.

use alloy_primitives::{Address, B256};
use ringrelay_bus::{Dispatcher, Watcher};
use ringrelay_core::chain::{RawReceipt, RawTransaction, TxInfo, TxStatus};
use ringrelay_core::config::ProtocolDeployment;
use ringrelay_core::error::DecodeError;
use ringrelay_core::event::{RelayEvent, TransferEvent};
use ringrelay_core::source::{AccountUnlocker, OrderStore};
use ringrelay_core::topic::Topic;
use ringrelay_market::MarketRegistry;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

use crate::abi::ContractFamily;
use crate::handlers::SignatureHandler;
use crate::record::{EventKind, EventRecord, MethodKind, MethodRecord, RawPayload};

/// Decode counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessorMetrics {
    /// Payloads that decoded and published.
    pub decoded: u64,
    pub decode_errors: u64,
    /// Ring fills whose order hash was not in the order store.
    pub unmatched_fills: u64,
    /// Domain events handed to the outbound bus.
    pub published: u64,
}

/// Collaborators an `AbiProcessor` needs at run time.
pub struct ProcessorDeps {
    pub market: Arc<MarketRegistry>,
    pub orders: Arc<dyn OrderStore>,
    pub accounts: Arc<dyn AccountUnlocker>,
    pub outbound: Arc<Dispatcher<Topic, RelayEvent>>,
}

pub struct AbiProcessor {
    events: HashMap<B256, Arc<EventRecord>>,
    methods: HashMap<[u8; 4], Arc<MethodRecord>>,
    /// Protocol address → deployment version.
    protocols: HashMap<Address, String>,
    /// Token registries and delegates. Token contracts come from the market
    /// registry's live snapshot.
    contracts: HashSet<Address>,
    delegates: HashSet<Address>,
    pub(crate) market: Arc<MarketRegistry>,
    pub(crate) orders: Arc<dyn OrderStore>,
    accounts: Arc<dyn AccountUnlocker>,
    outbound: Arc<Dispatcher<Topic, RelayEvent>>,
    metrics: Mutex<ProcessorMetrics>,
}

impl AbiProcessor {
    /// Build the registry from the embedded ABIs and the given deployments.
    ///
    /// Fails when an ABI does not parse, an allow-listed name is missing,
    /// or two records share a signature.
    pub fn new(deployments: &[ProtocolDeployment], deps: ProcessorDeps) -> Result<Self, DecodeError> {
        let mut events = HashMap::new();
        let mut methods = HashMap::new();

        for family in ContractFamily::ALL {
            let abi = family.abi()?;

            for name in family.allowed_events() {
                let (event, kind) = abi
                    .events
                    .get(*name)
                    .and_then(|v| v.first())
                    .zip(EventKind::resolve(family, name))
                    .ok_or_else(|| DecodeError::UnknownSignature {
                        signature: format!("{family}.{name}"),
                    })?;
                let record = EventRecord::new(family, kind, event.clone());
                if events.contains_key(&record.id) {
                    return Err(DecodeError::InvalidInput {
                        reason: format!("duplicate event signature {}", record.key()),
                    });
                }
                debug!(family = %family, event = %name, id = %record.key(), "event registered");
                events.insert(record.id, Arc::new(record));
            }

            for name in family.allowed_methods() {
                let (func, kind) = abi
                    .functions
                    .get(*name)
                    .and_then(|v| v.first())
                    .zip(MethodKind::resolve(family, name))
                    .ok_or_else(|| DecodeError::UnknownSignature {
                        signature: format!("{family}.{name}"),
                    })?;
                let record = MethodRecord::new(family, kind, func.clone());
                if methods.contains_key(&record.selector) {
                    return Err(DecodeError::InvalidInput {
                        reason: format!("duplicate method selector {}", record.key()),
                    });
                }
                debug!(family = %family, method = %name, id = %record.key(), "method registered");
                methods.insert(record.selector, Arc::new(record));
            }
        }

        let mut protocols = HashMap::new();
        let mut contracts: HashSet<Address> = HashSet::new();
        let mut delegates = HashSet::new();
        for d in deployments {
            protocols.insert(d.protocol, d.version.clone());
            contracts.insert(d.token_registry);
            contracts.insert(d.delegate);
            delegates.insert(d.delegate);
        }

        info!(
            events = events.len(),
            methods = methods.len(),
            protocols = protocols.len(),
            tokens = deps.market.all_tokens().len(),
            "abi processor ready"
        );

        Ok(Self {
            events,
            methods,
            protocols,
            contracts,
            delegates,
            market: deps.market,
            orders: deps.orders,
            accounts: deps.accounts,
            outbound: deps.outbound,
            metrics: Mutex::new(ProcessorMetrics::default()),
        })
    }

    /// Subscribe one handler per record on the inbound bus.
    pub fn register(self: &Arc<Self>, inbound: &Dispatcher<String, RawPayload>, concurrent: bool) {
        let watcher = |h: SignatureHandler| -> Watcher<RawPayload> {
            Watcher {
                concurrent,
                handler: Arc::new(h),
            }
        };
        for record in self.events.values() {
            inbound.on(
                record.key(),
                watcher(SignatureHandler::event(Arc::clone(self), Arc::clone(record))),
            );
        }
        for record in self.methods.values() {
            inbound.on(
                record.key(),
                watcher(SignatureHandler::method(Arc::clone(self), Arc::clone(record))),
            );
        }
    }

    pub fn get_event(&self, id: &B256) -> Option<Arc<EventRecord>> {
        self.events.get(id).cloned()
    }

    pub fn get_method(&self, selector: &[u8; 4]) -> Option<Arc<MethodRecord>> {
        self.methods.get(selector).cloned()
    }

    pub fn events(&self) -> impl Iterator<Item = &Arc<EventRecord>> {
        self.events.values()
    }

    pub fn methods(&self) -> impl Iterator<Item = &Arc<MethodRecord>> {
        self.methods.values()
    }

    /// Any configured protocol, token registry or delegate, or a token
    /// contract in the market registry's current snapshot.
    pub fn has_contract(&self, address: &Address) -> bool {
        self.protocols.contains_key(address)
            || self.contracts.contains(address)
            || self.market.is_token_address(address)
    }

    /// A configured transfer delegate.
    pub fn has_spender(&self, address: &Address) -> bool {
        self.delegates.contains(address)
    }

    pub fn protocol_version(&self, address: &Address) -> Option<&str> {
        self.protocols.get(address).map(String::as_str)
    }

    /// Heuristic for a plain native-currency transfer: a non-zero value sent
    /// to an address that is not a known contract, where either party is an
    /// unlocked account.
    ///
    /// A contract missing from the tables (or a token not yet in the market
    /// registry) is indistinguishable from an externally owned account here
    /// and will be classified as a transfer.
    pub fn is_valid_eth_transfer_transaction(&self, tx: &RawTransaction) -> bool {
        let to = tx.to_or_zero();
        if self.has_contract(&to) || tx.value.is_zero() {
            return false;
        }
        self.accounts.has_unlocked(&tx.from) || self.accounts.has_unlocked(&to)
    }

    /// Publish a native-currency transfer on `TxManagerEthTransfer`.
    pub fn handle_eth_transfer(&self, tx: &RawTransaction, receipt: Option<&RawReceipt>, block_time: i64) {
        let mut info = TxInfo::new(tx, receipt, block_time);
        info.status = TxStatus::from_receipt(receipt);
        info.protocol = Address::ZERO;
        info.log_index = 0;
        info.symbol = "ETH".to_string();

        let evt = TransferEvent {
            tx: info,
            sender: tx.from,
            receiver: tx.to_or_zero(),
            value: tx.value,
        };
        debug!(
            tx = %tx.hash,
            from = %evt.sender,
            to = %evt.receiver,
            value = %evt.value,
            "eth transfer"
        );
        self.publish(&[Topic::TxManagerEthTransfer], RelayEvent::Transfer(evt));
    }

    /// Emit `event` on every topic in `topics`.
    pub(crate) fn publish(&self, topics: &[Topic], event: RelayEvent) {
        for topic in topics {
            self.outbound.emit(topic, event.clone());
        }
        self.metrics().published += topics.len() as u64;
    }

    pub(crate) fn metrics(&self) -> std::sync::MutexGuard<'_, ProcessorMetrics> {
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn metrics_snapshot(&self) -> ProcessorMetrics {
        self.metrics().clone()
    }

    pub fn outbound(&self) -> &Arc<Dispatcher<Topic, RelayEvent>> {
        &self.outbound
    }
}
