//! Approval Engine configuration

use custody_types::Amount;
use serde::{Deserialize, Serialize};

/// Every field the core recognizes, grouped under the component that
/// consumes it. Never environment-coupled in the library itself - only the
/// CLI/demo binary's `from_env` convenience constructor touches env vars.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalConfig {
    pub low_threshold_stroops: i64,
    pub high_threshold_stroops: i64,
    pub ephemeral_ttl_seconds: i64,
    pub challenge_ttl_seconds: i64,
    pub approver_totp_step_seconds: u64,
    pub approver_totp_tolerance_steps: u32,
    pub hsm_call_timeout_ms: u64,
    pub ledger_call_timeout_ms: u64,
    pub max_inflight_intents_per_tenant: usize,
    pub network_passphrase: String,
}

impl ApprovalConfig {
    pub fn low_threshold(&self) -> Amount {
        Amount::from_stroops(self.low_threshold_stroops).expect("configured threshold must be positive")
    }

    pub fn high_threshold(&self) -> Amount {
        Amount::from_stroops(self.high_threshold_stroops).expect("configured threshold must be positive")
    }

    /// Each intent has a hard deadline = creation + 2 * Challenge-TTL.
    pub fn intent_deadline_millis(&self) -> i64 {
        2 * self.challenge_ttl_seconds * 1000
    }
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            low_threshold_stroops: 1_000 * custody_types::STROOPS_PER_XLM,
            high_threshold_stroops: 10_000 * custody_types::STROOPS_PER_XLM,
            ephemeral_ttl_seconds: 3_600,
            challenge_ttl_seconds: 300,
            approver_totp_step_seconds: 30,
            approver_totp_tolerance_steps: 1,
            hsm_call_timeout_ms: 30_000,
            ledger_call_timeout_ms: 60_000,
            max_inflight_intents_per_tenant: 50,
            network_passphrase: "Test SDF Network ; September 2015".to_string(),
        }
    }
}
