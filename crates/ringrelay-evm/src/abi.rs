//! Embedded contract ABIs and the allow-list of events/methods the relay
//! decodes from each.

use alloy_json_abi::JsonAbi;
use ringrelay_core::error::DecodeError;
use serde::Serialize;
use std::fmt;

const PROTOCOL_ABI: &str = include_str!("../abi/protocol.json");
const ERC20_ABI: &str = include_str!("../abi/erc20.json");
const WETH_ABI: &str = include_str!("../abi/weth.json");
const TOKEN_REGISTRY_ABI: &str = include_str!("../abi/token_registry.json");
const DELEGATE_ABI: &str = include_str!("../abi/delegate.json");

/// The five contract families the relay understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ContractFamily {
    /// The exchange protocol (ring settlement, cancellation, cutoffs).
    Protocol,
    Erc20,
    Weth,
    TokenRegistry,
    /// Transfer delegate; holds token allowances on behalf of the protocol.
    Delegate,
}

impl ContractFamily {
    pub const ALL: [ContractFamily; 5] = [
        ContractFamily::Protocol,
        ContractFamily::Erc20,
        ContractFamily::Weth,
        ContractFamily::TokenRegistry,
        ContractFamily::Delegate,
    ];

    fn abi_json(&self) -> &'static str {
        match self {
            Self::Protocol => PROTOCOL_ABI,
            Self::Erc20 => ERC20_ABI,
            Self::Weth => WETH_ABI,
            Self::TokenRegistry => TOKEN_REGISTRY_ABI,
            Self::Delegate => DELEGATE_ABI,
        }
    }

    /// Parse this family's embedded ABI.
    pub fn abi(&self) -> Result<JsonAbi, DecodeError> {
        serde_json::from_str(self.abi_json()).map_err(|e| DecodeError::AbiDecodeFailed {
            reason: format!("invalid {self} ABI JSON: {e}"),
        })
    }

    /// Event names decoded for this family.
    pub fn allowed_events(&self) -> &'static [&'static str] {
        match self {
            Self::Protocol => &[
                "RingMined",
                "OrderCancelled",
                "AllOrdersCancelled",
                "OrdersCancelled",
            ],
            Self::Erc20 => &["Transfer", "Approval"],
            Self::Weth => &["Deposit", "Withdrawal"],
            Self::TokenRegistry => &["TokenRegistered", "TokenUnregistered"],
            Self::Delegate => &["AddressAuthorized", "AddressDeauthorized"],
        }
    }

    /// Method names decoded for this family.
    pub fn allowed_methods(&self) -> &'static [&'static str] {
        match self {
            Self::Protocol => &[
                "submitRing",
                "cancelOrder",
                "cancelAllOrders",
                "cancelAllOrdersByTradingPair",
            ],
            Self::Erc20 => &["transfer", "approve"],
            Self::Weth => &["deposit", "withdraw"],
            Self::TokenRegistry | Self::Delegate => &[],
        }
    }
}

impl fmt::Display for ContractFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Protocol => "protocol",
            Self::Erc20 => "erc20",
            Self::Weth => "weth",
            Self::TokenRegistry => "token_registry",
            Self::Delegate => "delegate",
        };
        f.write_str(s)
    }
}
