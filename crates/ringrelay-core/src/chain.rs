//! Raw chain records supplied by the node client, and the transaction
//! context (`TxInfo`) every decoded domain event carries.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// A transaction as fetched from the node, before any decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    pub hash: B256,
    pub from: Address,
    /// `None` for contract creation.
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default)]
    pub value: U256,
    #[serde(default)]
    pub gas: U256,
    #[serde(default)]
    pub gas_price: U256,
    #[serde(default)]
    pub nonce: U256,
    pub block_number: u64,
    #[serde(default)]
    pub block_hash: B256,
    #[serde(default)]
    pub input: Bytes,
}

impl RawTransaction {
    /// The 4-byte method selector of the calldata, if present.
    pub fn selector(&self) -> Option<[u8; 4]> {
        self.input.get(..4).and_then(|s| s.try_into().ok())
    }

    /// Destination address, zero for contract creation.
    pub fn to_or_zero(&self) -> Address {
        self.to.unwrap_or(Address::ZERO)
    }
}

/// The subset of a transaction receipt the relay reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReceipt {
    #[serde(default)]
    pub gas_used: U256,
    /// `false` when the transaction reverted.
    #[serde(default = "success_default")]
    pub success: bool,
}

fn success_default() -> bool {
    true
}

/// A log emitted by a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    pub address: Address,
    /// `topics[0]` is the event signature hash; the rest are indexed params.
    pub topics: Vec<B256>,
    #[serde(default)]
    pub data: Bytes,
    /// Zero-based position of the log within its block.
    pub log_index: u64,
}

impl RawLog {
    pub fn signature(&self) -> Option<&B256> {
        self.topics.first()
    }
}

/// On-chain execution status of the transaction a record came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    #[default]
    Pending,
    Success,
    Failed,
}

impl TxStatus {
    /// Status implied by an optional receipt: no receipt means pending.
    pub fn from_receipt(receipt: Option<&RawReceipt>) -> Self {
        match receipt {
            None => Self::Pending,
            Some(r) if r.success => Self::Success,
            Some(_) => Self::Failed,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl std::fmt::Display for TxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Transaction context shared by every decoded record and domain event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxInfo {
    /// Emitting contract for logs, destination contract for methods.
    pub protocol: Address,
    pub from: Address,
    pub to: Address,
    pub tx_hash: B256,
    pub block_hash: B256,
    pub block_number: u64,
    /// Unix seconds.
    pub block_time: i64,
    pub gas_limit: U256,
    pub gas_used: U256,
    pub gas_price: U256,
    pub nonce: U256,
    /// 0 for method-level records, 1-based log position for log records.
    pub log_index: i64,
    pub status: TxStatus,
    /// Display symbol; only set for native-currency transfers.
    pub symbol: String,
}

impl TxInfo {
    /// Build the shared context from a transaction and its (optional) receipt.
    /// A missing receipt yields zero gas used.
    pub fn new(tx: &RawTransaction, receipt: Option<&RawReceipt>, block_time: i64) -> Self {
        Self {
            protocol: tx.to_or_zero(),
            from: tx.from,
            to: tx.to_or_zero(),
            tx_hash: tx.hash,
            block_hash: tx.block_hash,
            block_number: tx.block_number,
            block_time,
            gas_limit: tx.gas,
            gas_used: receipt.map(|r| r.gas_used).unwrap_or(U256::ZERO),
            gas_price: tx.gas_price,
            nonce: tx.nonce,
            log_index: 0,
            status: TxStatus::Pending,
            symbol: String::new(),
        }
    }

    /// Context for a log record: emitter as protocol, 1-based log index, success.
    pub fn for_log(mut self, log: &RawLog) -> Self {
        self.protocol = log.address;
        self.log_index = log.log_index as i64 + 1;
        self.status = TxStatus::Success;
        self
    }

    /// Context for a method record: log index 0 and the given status.
    pub fn for_method(mut self, status: TxStatus) -> Self {
        self.log_index = 0;
        self.status = status;
        self
    }
}

/// A transaction with everything needed to replay it through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionBundle {
    pub transaction: RawTransaction,
    #[serde(default)]
    pub receipt: Option<RawReceipt>,
    /// Unix seconds of the containing block.
    #[serde(default)]
    pub block_time: i64,
    #[serde(default)]
    pub logs: Vec<RawLog>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> RawTransaction {
        RawTransaction {
            hash: B256::repeat_byte(0xaa),
            from: Address::repeat_byte(0x01),
            to: Some(Address::repeat_byte(0x02)),
            value: U256::from(5u64),
            gas: U256::from(21_000u64),
            gas_price: U256::from(1_000_000_000u64),
            nonce: U256::from(7u64),
            block_number: 4_000_000,
            block_hash: B256::repeat_byte(0xbb),
            input: Bytes::from(vec![0xa9, 0x05, 0x9c, 0xbb, 0x00]),
        }
    }

    #[test]
    fn missing_receipt_means_zero_gas_used_and_pending() {
        let tx = sample_tx();
        let info = TxInfo::new(&tx, None, 1_500_000_000);
        assert_eq!(info.gas_used, U256::ZERO);
        assert_eq!(TxStatus::from_receipt(None), TxStatus::Pending);
        assert_eq!(info.protocol, Address::repeat_byte(0x02));
    }

    #[test]
    fn log_context_is_one_based() {
        let tx = sample_tx();
        let log = RawLog {
            address: Address::repeat_byte(0x09),
            topics: vec![],
            data: Bytes::new(),
            log_index: 0,
        };
        let info = TxInfo::new(&tx, None, 0).for_log(&log);
        assert_eq!(info.log_index, 1);
        assert_eq!(info.protocol, Address::repeat_byte(0x09));
        assert_eq!(info.status, TxStatus::Success);
    }

    #[test]
    fn selector_reads_first_four_bytes() {
        assert_eq!(sample_tx().selector(), Some([0xa9, 0x05, 0x9c, 0xbb]));
        let mut tx = sample_tx();
        tx.input = Bytes::from(vec![0x01]);
        assert_eq!(tx.selector(), None);
    }

    #[test]
    fn failed_receipt_status() {
        let r = RawReceipt {
            gas_used: U256::from(1u64),
            success: false,
        };
        assert!(TxStatus::from_receipt(Some(&r)).is_failed());
    }

    #[test]
    fn bundle_deserializes_with_defaults() {
        let json = r#"{
            "transaction": {
                "hash": "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
                "from": "0x0101010101010101010101010101010101010101",
                "to": "0x0202020202020202020202020202020202020202",
                "value": "0x5",
                "blockNumber": 10
            }
        }"#;
        let bundle: TransactionBundle = serde_json::from_str(json).unwrap();
        assert!(bundle.receipt.is_none());
        assert!(bundle.logs.is_empty());
        assert_eq!(bundle.transaction.value, U256::from(5u64));
        assert_eq!(bundle.transaction.block_number, 10);
    }
}
