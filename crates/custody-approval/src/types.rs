//! Persisted record shapes for the Approval Engine: Wallet, TransactionIntent,
//! Approval, Challenge.

use custody_types::{
    Amount, ApprovalId, ApproverId, ChallengeId, EphemeralKeyId, IntentId, IntentState, KeyClass, KeyId,
    PartitionId, Tier, WalletId,
};
use serde::{Deserialize, Serialize};

/// A logical binding between a tenant, a Key, and its tier policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletRecord {
    pub wallet_id: WalletId,
    pub partition: PartitionId,
    pub key_id: KeyId,
    pub class: KeyClass,
}

/// A transaction intent moving through the approval state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentRecord {
    pub intent_id: IntentId,
    pub partition: PartitionId,
    pub source_wallet: WalletId,
    pub destination_address: String,
    pub amount: Amount,
    pub memo: Option<String>,
    pub tier: Tier,
    pub state: IntentState,
    pub ephemeral_key_id: Option<EphemeralKeyId>,
    pub valid_approvals: u8,
    pub created_at_millis: i64,
    pub deadline_millis: i64,
    pub ledger_hash_hex: Option<String>,
    pub ledger_sequence: Option<i64>,
    pub failure_reason: Option<String>,
}

impl IntentRecord {
    pub fn threshold(&self) -> u8 {
        self.tier.threshold()
    }
}

/// One approver's endorsement of one intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthenticatorMethod {
    ChallengeResponse,
    FallbackOtp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub approval_id: ApprovalId,
    pub intent_id: IntentId,
    pub approver: ApproverId,
    pub method: AuthenticatorMethod,
    pub response: String,
    pub timestamp_millis: i64,
}

/// A challenge issued to the roster for one intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeRecord {
    pub challenge_id: ChallengeId,
    pub intent_id: IntentId,
    pub display_digest: String,
    pub created_at_millis: i64,
    pub expires_at_millis: i64,
}

impl ChallengeRecord {
    pub fn is_expired(&self, now_millis: i64) -> bool {
        now_millis >= self.expires_at_millis
    }
}
