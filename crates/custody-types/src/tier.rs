//! Approval tiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// The approval policy applicable to a [`TransactionIntent`](crate) given its
/// amount and source wallet class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// 2-of-3, challenge-response optional (fallback OTP accepted).
    LowValue,
    /// 2-of-3, challenge-response mandatory.
    HighValue,
    /// 3-of-3, challenge-response mandatory.
    Critical,
}

impl Tier {
    /// Number of valid approvals required to reach the execution threshold.
    pub fn threshold(self) -> u8 {
        match self {
            Self::LowValue => 2,
            Self::HighValue => 2,
            Self::Critical => 3,
        }
    }

    /// Whether this tier requires a bound Challenge (vs. bare fallback OTP).
    pub fn requires_challenge(self) -> bool {
        !matches!(self, Self::LowValue)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LowValue => write!(f, "LOW_VALUE"),
            Self::HighValue => write!(f, "HIGH_VALUE"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}
