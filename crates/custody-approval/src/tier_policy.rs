//! Tier selection
//!
//! A pure function of amount, source wallet class, and the configured
//! thresholds - no I/O, no clock, no randomness, so it's trivially testable
//! as a property: same inputs always yield the same tier.

use crate::config::ApprovalConfig;
use custody_types::{Amount, KeyClass, Tier};

/// Cold wallets are always CRITICAL regardless of amount; otherwise
/// the amount is compared against the configured high/low thresholds.
pub fn select_tier(amount: Amount, wallet_class: KeyClass, config: &ApprovalConfig) -> Tier {
    if wallet_class == KeyClass::Cold {
        return Tier::Critical;
    }
    if amount >= config.high_threshold() {
        Tier::Critical
    } else if amount >= config.low_threshold() {
        Tier::HighValue
    } else {
        Tier::LowValue
    }
}
