//! Ledger amounts in the smallest native unit.
//!
//! Balances, gas prices and costs are integral wei values. Conversions to a
//! decimal ether string exist for messages only; every comparison and product
//! is done on the integer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of decimal places in one ether.
pub const ETHER_DECIMALS: u32 = 18;

/// One ether in wei.
pub const WEI_PER_ETHER: u128 = 10u128.pow(ETHER_DECIMALS);

/// One gwei in wei.
pub const WEI_PER_GWEI: u128 = 1_000_000_000;

/// Amount of the native currency in wei.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Wei(pub u128);

impl Wei {
    pub const fn from_wei(wei: u128) -> Self {
        Self(wei)
    }

    pub const fn from_gwei(gwei: u64) -> Self {
        Self((gwei as u128) * WEI_PER_GWEI)
    }

    pub const fn zero() -> Self {
        Self(0)
    }

    /// Raw wei value.
    pub const fn wei(&self) -> u128 {
        self.0
    }

    /// Checked multiplication by a unit count (e.g. gas units).
    pub fn checked_mul(&self, units: u128) -> Option<Wei> {
        self.0.checked_mul(units).map(Wei)
    }

    /// Parse a decimal ether string such as `"0.001"`.
    pub fn from_ether_str(s: &str) -> Result<Self, String> {
        let s = s.trim();
        let (whole, frac) = match s.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err("empty amount".to_string());
        }
        if frac.len() > ETHER_DECIMALS as usize {
            return Err(format!("too many decimal places (max {ETHER_DECIMALS})"));
        }

        let whole = if whole.is_empty() {
            0
        } else {
            whole
                .parse::<u128>()
                .map_err(|e| format!("invalid whole part: {e}"))?
        };
        let fractional = if frac.is_empty() {
            0
        } else {
            let padded = format!("{frac:0<width$}", width = ETHER_DECIMALS as usize);
            padded
                .parse::<u128>()
                .map_err(|e| format!("invalid fractional part: {e}"))?
        };

        whole
            .checked_mul(WEI_PER_ETHER)
            .and_then(|w| w.checked_add(fractional))
            .map(Wei)
            .ok_or_else(|| "amount overflows u128 wei".to_string())
    }

    /// Decimal ether rendering with trailing zeros trimmed.
    pub fn to_ether_string(&self) -> String {
        let whole = self.0 / WEI_PER_ETHER;
        let fractional = self.0 % WEI_PER_ETHER;
        if fractional == 0 {
            return whole.to_string();
        }
        let fractional_str = format!("{fractional:018}");
        format!("{whole}.{}", fractional_str.trim_end_matches('0'))
    }

    /// Parse a JSON-RPC hex quantity (`0x1bc16d674ec80000`).
    pub fn from_hex_quantity(raw: &str) -> Result<Self, String> {
        parse_hex_u128(raw).map(Wei)
    }

    /// JSON-RPC hex quantity without leading zeros.
    pub fn to_hex_quantity(&self) -> String {
        format!("{:#x}", self.0)
    }
}

impl fmt::Display for Wei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ETH", self.to_ether_string())
    }
}

/// Parse a 0x-prefixed hex quantity into a `u128`, rejecting values that do
/// not fit.
pub fn parse_hex_u128(raw: &str) -> Result<u128, String> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .ok_or_else(|| format!("quantity `{raw}` is missing the 0x prefix"))?;
    if digits.is_empty() {
        return Err(format!("quantity `{raw}` has no digits"));
    }
    let significant = digits.trim_start_matches('0');
    if significant.len() > 32 {
        return Err(format!("quantity `{raw}` does not fit in 128 bits"));
    }
    if significant.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(significant, 16).map_err(|e| format!("invalid quantity `{raw}`: {e}"))
}
