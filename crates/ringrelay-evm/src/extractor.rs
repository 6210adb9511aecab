//! Front door of the pipeline.
//!
//! Turns one fetched transaction (plus receipt and logs) into inbound bus
//! messages keyed by signature.

use ringrelay_bus::Dispatcher;
use ringrelay_core::chain::{RawLog, RawReceipt, RawTransaction, TransactionBundle, TxInfo, TxStatus};
use ringrelay_core::event::RelayEvent;
use ringrelay_core::topic::Topic;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::processor::AbiProcessor;
use crate::record::{event_key, method_key, EventData, MethodData, RawPayload};

/// What `process_transaction` did with one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub status: TxStatus,
    /// A registered method call was dispatched.
    pub method: bool,
    /// Published as a native-currency transfer.
    pub eth_transfer: bool,
    /// Logs dispatched to a decoder.
    pub logs: usize,
    /// Logs ignored: failed tx, unknown emitter or unregistered topic.
    pub skipped_logs: usize,
}

pub struct Extractor {
    processor: Arc<AbiProcessor>,
    inbound: Arc<Dispatcher<String, RawPayload>>,
}

impl Extractor {
    /// Wire `processor` onto a fresh inbound bus.
    pub fn new(processor: Arc<AbiProcessor>, concurrent: bool) -> Self {
        let inbound: Arc<Dispatcher<String, RawPayload>> = Arc::new(Dispatcher::new("inbound"));
        processor.register(&inbound, concurrent);
        Self { processor, inbound }
    }

    pub fn processor(&self) -> &Arc<AbiProcessor> {
        &self.processor
    }

    pub fn inbound(&self) -> &Arc<Dispatcher<String, RawPayload>> {
        &self.inbound
    }

    pub fn outbound(&self) -> &Arc<Dispatcher<Topic, RelayEvent>> {
        self.processor.outbound()
    }

    /// Dispatch a log if its topic0 is registered. Returns whether it was.
    pub fn dispatch_log(&self, base: &TxInfo, log: &RawLog) -> bool {
        let Some(record) = log.signature().and_then(|id| self.processor.get_event(id)) else {
            return false;
        };
        let key = event_key(&record.id);
        self.inbound
            .emit(&key, RawPayload::Log(EventData::new(record, base, log)))
            > 0
    }

    /// Dispatch a transaction's calldata if its selector is registered.
    pub fn dispatch_method(&self, base: &TxInfo, tx: &RawTransaction, status: TxStatus) -> bool {
        let Some(record) = tx.selector().and_then(|s| self.processor.get_method(&s)) else {
            return false;
        };
        let key = method_key(&record.selector);
        self.inbound
            .emit(&key, RawPayload::Method(MethodData::new(record, base, tx, status)))
            > 0
    }

    /// Route one transaction:
    ///
    /// 1. calldata to a known contract with a registered selector goes to its
    ///    method handler, whatever the status;
    /// 2. otherwise a plain value transfer involving an unlocked account is
    ///    published directly;
    /// 3. logs are decoded only for a successful transaction, and only from
    ///    known contracts.
    pub fn process_transaction(
        &self,
        tx: &RawTransaction,
        receipt: Option<&RawReceipt>,
        block_time: i64,
        logs: &[RawLog],
    ) -> ExtractSummary {
        let status = TxStatus::from_receipt(receipt);
        let base = TxInfo::new(tx, receipt, block_time);
        let mut summary = ExtractSummary {
            status,
            ..Default::default()
        };

        let to = tx.to_or_zero();
        if self.processor.has_contract(&to) {
            summary.method = self.dispatch_method(&base, tx, status);
        }
        if !summary.method && self.processor.is_valid_eth_transfer_transaction(tx) {
            self.processor.handle_eth_transfer(tx, receipt, block_time);
            summary.eth_transfer = true;
        }

        for log in logs {
            let dispatched = status == TxStatus::Success
                && self.processor.has_contract(&log.address)
                && self.dispatch_log(&base, log);
            if dispatched {
                summary.logs += 1;
            } else {
                trace!(tx = %tx.hash, emitter = %log.address, "log skipped");
                summary.skipped_logs += 1;
            }
        }

        debug!(
            tx = %tx.hash,
            status = %status,
            method = summary.method,
            logs = summary.logs,
            skipped = summary.skipped_logs,
            "transaction extracted"
        );
        summary
    }

    pub fn process_bundle(&self, bundle: &TransactionBundle) -> ExtractSummary {
        self.process_transaction(
            &bundle.transaction,
            bundle.receipt.as_ref(),
            bundle.block_time,
            &bundle.logs,
        )
    }

    /// Wait until both buses are drained. Inbound handlers publish to the
    /// outbound bus, so inbound is flushed first.
    pub async fn flush(&self) {
        self.inbound.flush().await;
        self.outbound().flush().await;
    }
}
