//! Fixed-point amounts in the ledger's minor unit
//!
//! Amounts are compared as fixed-point integers in the ledger's minor unit
//! to avoid floating-point ambiguity. Stellar's minor unit is the stroop
//! (1 XLM = 10_000_000 stroops); we use that scale throughout so tier
//! thresholds and approval amounts never touch a float.

use crate::CustodyError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Number of stroops in one XLM.
pub const STROOPS_PER_XLM: i64 = 10_000_000;

/// An amount of the custodied asset, expressed in stroops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Amount(i64);

impl Amount {
    /// Construct from a raw stroop count. Rejects negative amounts: a
    /// payment intent can never move a non-positive amount (`input-invalid`).
    pub fn from_stroops(stroops: i64) -> Result<Self, CustodyError> {
        if stroops <= 0 {
            return Err(CustodyError::input_invalid(
                "amount",
                "amount must be a positive number of stroops",
            ));
        }
        Ok(Self(stroops))
    }

    /// Construct from a whole-XLM value (test/demo convenience).
    pub fn from_xlm(xlm: i64) -> Result<Self, CustodyError> {
        let stroops = xlm
            .checked_mul(STROOPS_PER_XLM)
            .ok_or_else(|| CustodyError::input_invalid("amount", "amount overflows stroops"))?;
        Self::from_stroops(stroops)
    }

    /// Raw stroop value.
    pub fn stroops(self) -> i64 {
        self.0
    }

    /// Whole-XLM value, truncated.
    pub fn xlm(self) -> i64 {
        self.0 / STROOPS_PER_XLM
    }

    pub fn checked_add(self, other: Self) -> Result<Self, CustodyError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(CustodyError::AmountOverflow)
    }

    pub fn checked_sub(self, other: Self) -> Result<Self, CustodyError> {
        self.0
            .checked_sub(other.0)
            .filter(|v| *v > 0)
            .map(Self)
            .ok_or(CustodyError::AmountUnderflow)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:07} XLM",
            self.0 / STROOPS_PER_XLM,
            (self.0 % STROOPS_PER_XLM).abs()
        )
    }
}

impl Add for Amount {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        self.checked_add(other).expect("amount addition overflow")
    }
}

impl Sub for Amount {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        self.checked_sub(other).expect("amount subtraction underflow")
    }
}

/// Amount + wallet-class-dependent thresholds (tier policy) live in
/// `custody-approval`; this crate only owns the arithmetic primitive.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_xlm() {
        let amt = Amount::from_xlm(5_000).unwrap();
        assert_eq!(amt.stroops(), 5_000 * STROOPS_PER_XLM);
        assert_eq!(amt.xlm(), 5_000);
    }

    #[test]
    fn test_rejects_non_positive() {
        assert!(Amount::from_stroops(0).is_err());
        assert!(Amount::from_stroops(-1).is_err());
    }

    #[test]
    fn test_checked_arithmetic() {
        let a = Amount::from_xlm(100).unwrap();
        let b = Amount::from_xlm(50).unwrap();
        assert_eq!((a.checked_sub(b).unwrap()).xlm(), 50);
        assert!(b.checked_sub(a).is_err());
    }

    #[test]
    fn test_display() {
        let amt = Amount::from_stroops(12_3456_789).unwrap();
        assert_eq!(amt.to_string(), "12.3456789 XLM");
    }

    #[test]
    fn test_ordering() {
        let a = Amount::from_xlm(100).unwrap();
        let b = Amount::from_xlm(200).unwrap();
        assert!(a < b);
    }
}
