//! Downstream topics the decode layer publishes to.
//!
//! Two audiences consume most chain events: the order manager (order state)
//! and the transaction manager (per-account history). Account-facing topics
//! drive balance and allowance tracking.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Topic {
    // order manager
    OrderManagerRingMined,
    OrderManagerFill,
    OrderManagerCancel,
    OrderManagerCutoff,
    OrderManagerCutoffPair,

    // transaction manager
    TxManagerRingMined,
    TxManagerFill,
    TxManagerCancelEvent,
    TxManagerCancelMethod,
    TxManagerCutoffEvent,
    TxManagerCutoffMethod,
    TxManagerCutoffPairEvent,
    TxManagerCutoffPairMethod,
    TxManagerApprovalEvent,
    TxManagerApproveMethod,
    TxManagerTransferEvent,
    TxManagerTransferMethod,
    TxManagerWethDepositEvent,
    TxManagerWethDepositMethod,
    TxManagerWethWithdrawalEvent,
    TxManagerWethWithdrawalMethod,
    TxManagerEthTransfer,

    // accounts
    AccountTransfer,
    AccountApproval,
    AccountApproveMethod,
    AccountWethDeposit,
    AccountWethDepositMethod,
    AccountWethWithdrawal,
    AccountWethWithdrawalMethod,

    // registry / delegate administration
    TokenRegistered,
    TokenUnregistered,
    AddressAuthorized,
    AddressDeauthorized,

    // miner
    MinerSubmitRing,
}

impl Topic {
    pub const ALL: [Topic; 34] = [
        Topic::OrderManagerRingMined,
        Topic::OrderManagerFill,
        Topic::OrderManagerCancel,
        Topic::OrderManagerCutoff,
        Topic::OrderManagerCutoffPair,
        Topic::TxManagerRingMined,
        Topic::TxManagerFill,
        Topic::TxManagerCancelEvent,
        Topic::TxManagerCancelMethod,
        Topic::TxManagerCutoffEvent,
        Topic::TxManagerCutoffMethod,
        Topic::TxManagerCutoffPairEvent,
        Topic::TxManagerCutoffPairMethod,
        Topic::TxManagerApprovalEvent,
        Topic::TxManagerApproveMethod,
        Topic::TxManagerTransferEvent,
        Topic::TxManagerTransferMethod,
        Topic::TxManagerWethDepositEvent,
        Topic::TxManagerWethDepositMethod,
        Topic::TxManagerWethWithdrawalEvent,
        Topic::TxManagerWethWithdrawalMethod,
        Topic::TxManagerEthTransfer,
        Topic::AccountTransfer,
        Topic::AccountApproval,
        Topic::AccountApproveMethod,
        Topic::AccountWethDeposit,
        Topic::AccountWethDepositMethod,
        Topic::AccountWethWithdrawal,
        Topic::AccountWethWithdrawalMethod,
        Topic::TokenRegistered,
        Topic::TokenUnregistered,
        Topic::AddressAuthorized,
        Topic::AddressDeauthorized,
        Topic::MinerSubmitRing,
    ];

    /// Returns `true` for topics consumed by the transaction manager.
    pub fn is_tx_manager(&self) -> bool {
        matches!(
            self,
            Topic::TxManagerRingMined
                | Topic::TxManagerFill
                | Topic::TxManagerCancelEvent
                | Topic::TxManagerCancelMethod
                | Topic::TxManagerCutoffEvent
                | Topic::TxManagerCutoffMethod
                | Topic::TxManagerCutoffPairEvent
                | Topic::TxManagerCutoffPairMethod
                | Topic::TxManagerApprovalEvent
                | Topic::TxManagerApproveMethod
                | Topic::TxManagerTransferEvent
                | Topic::TxManagerTransferMethod
                | Topic::TxManagerWethDepositEvent
                | Topic::TxManagerWethDepositMethod
                | Topic::TxManagerWethWithdrawalEvent
                | Topic::TxManagerWethWithdrawalMethod
                | Topic::TxManagerEthTransfer
        )
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn all_topics_are_distinct() {
        let set: HashSet<_> = Topic::ALL.iter().collect();
        assert_eq!(set.len(), Topic::ALL.len());
    }

    #[test]
    fn tx_manager_classification() {
        assert!(Topic::TxManagerFill.is_tx_manager());
        assert!(!Topic::OrderManagerFill.is_tx_manager());
        assert!(!Topic::AccountTransfer.is_tx_manager());
    }
}
