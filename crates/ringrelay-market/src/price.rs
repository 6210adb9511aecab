//! Base-unit amount conversion.
//!
//! Amounts travel as the text form of a big integer (`"2000000000000000000"`
//! or `"0x1bc16d674ec80000"`). Every token is treated as having 18 decimals.

use alloy_primitives::{Address, U256};

/// Fixed scaling factor between base units and display units.
pub const WEI_PER_UNIT: f64 = 1e18;

/// Parse a serialized big-integer amount and scale it to display units.
/// Anything that does not parse counts as zero.
pub fn bytes_to_float(amount: &[u8]) -> f64 {
    parse_amount(amount)
        .and_then(|v| v.to_string().parse::<f64>().ok())
        .map(|v| v / WEI_PER_UNIT)
        .unwrap_or(0.0)
}

/// Scale a display amount back to base units, serialized as decimal text.
/// Negative or non-finite input yields `"0"`.
pub fn float_to_bytes(amount: f64) -> Vec<u8> {
    let scaled = amount * WEI_PER_UNIT;
    if !scaled.is_finite() || scaled <= 0.0 {
        return b"0".to_vec();
    }
    format!("{scaled:.0}").into_bytes()
}

/// Returns `true` when `token` is written in address form rather than as a symbol.
pub fn is_address(token: &str) -> bool {
    token.starts_with("0x")
}

/// Parse an address string, ignoring checksum casing.
pub fn parse_address(s: &str) -> Option<Address> {
    s.trim().parse::<Address>().ok()
}

fn parse_amount(raw: &[u8]) -> Option<U256> {
    let text = std::str::from_utf8(raw).ok()?.trim();
    if text.is_empty() {
        return None;
    }
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => U256::from_str_radix(hex, 16).ok(),
        None => U256::from_str_radix(text, 10).ok(),
    }
}
