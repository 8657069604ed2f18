//! The Approval Engine: tier policy, challenge issuance, approval
//! validation, atomic execution trigger. The heart of the custody core.

use std::sync::Arc;

use async_trait::async_trait;
use custody_auth::ApproverAuthenticator;
use custody_crypto::hsm::HsmGateway;
use custody_crypto::{CryptoError, PublicKey, Signature};
use custody_db::{keys, CustodyStore, CustodyStoreExt};
use custody_keys::EphemeralKeyManager;
use custody_ledger::{DigestSigner, LedgerSubmitter, PaymentIntent as LedgerPaymentIntent};
use custody_types::{
    Amount, ApproverId, Clock, CustodyError, EphemeralKeyId, IntentId, IntentState, PartitionId, WalletId,
};

use crate::audit::{AuditEvent, AuditLog};
use crate::challenge;
use crate::config::ApprovalConfig;
use crate::error::{ApprovalError, ApprovalResult};
use crate::types::{ApprovalRecord, AuthenticatorMethod, ChallengeRecord, IntentRecord, WalletRecord};

const WALLET_PREFIX: &str = keys::WALLET;
const CHALLENGE_PREFIX: &str = keys::CHALLENGE;
const APPROVAL_PREFIX: &str = keys::APPROVAL;

fn intent_key(id: IntentId) -> String {
    format!("{}{}", keys::INTENT, id)
}

fn wallet_key(id: WalletId) -> String {
    format!("{WALLET_PREFIX}{id}")
}

fn challenge_key(intent_id: IntentId) -> String {
    format!("{CHALLENGE_PREFIX}{intent_id}")
}

fn approval_key(intent_id: IntentId, approval_id: custody_types::ApprovalId) -> String {
    format!("{APPROVAL_PREFIX}{intent_id}:{approval_id}")
}

fn approval_claim_key(intent_id: IntentId, approver: ApproverId) -> String {
    format!("{}{}:{}", keys::APPROVAL_CLAIM, intent_id, approver)
}

/// Outcome of submitting one approver's response.
#[derive(Debug, Clone)]
pub struct ApprovalOutcome {
    pub valid_approvals: u8,
    pub threshold: u8,
    pub reached_threshold: bool,
    pub state: IntentState,
}

pub struct ApprovalEngine {
    store: Arc<dyn CustodyStore>,
    clock: Arc<dyn Clock>,
    hsm: Arc<dyn HsmGateway>,
    authenticator: Arc<ApproverAuthenticator>,
    ephemeral_keys: Arc<EphemeralKeyManager>,
    ledger: Arc<LedgerSubmitter>,
    audit: Arc<dyn AuditLog>,
    config: ApprovalConfig,
    challenge_responses: custody_auth::used_response::UsedResponseSet,
    inflight_counts: InflightCounter,
}

/// Per-partition count of intents in `awaiting_approval`, backing the
/// `max_inflight_intents_per_tenant` backpressure cap. Kept in memory
/// rather than in `CustodyStore`: losing this count on restart only means a
/// brief under-count of the cap, never a correctness issue for any other
/// invariant.
#[derive(Default)]
struct InflightCounter {
    counts: std::sync::RwLock<std::collections::HashMap<PartitionId, usize>>,
}

impl InflightCounter {
    fn try_reserve(&self, partition: PartitionId, cap: usize) -> bool {
        let mut counts = self.counts.write().unwrap();
        let entry = counts.entry(partition).or_insert(0);
        if *entry >= cap {
            return false;
        }
        *entry += 1;
        true
    }

    fn release(&self, partition: PartitionId) {
        let mut counts = self.counts.write().unwrap();
        if let Some(entry) = counts.get_mut(&partition) {
            *entry = entry.saturating_sub(1);
        }
    }
}

impl ApprovalEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn CustodyStore>,
        clock: Arc<dyn Clock>,
        hsm: Arc<dyn HsmGateway>,
        authenticator: Arc<ApproverAuthenticator>,
        ephemeral_keys: Arc<EphemeralKeyManager>,
        ledger: Arc<LedgerSubmitter>,
        audit: Arc<dyn AuditLog>,
        config: ApprovalConfig,
    ) -> Self {
        let challenge_responses = custody_auth::used_response::UsedResponseSet::challenges(store.clone());
        Self {
            store,
            clock,
            hsm,
            authenticator,
            ephemeral_keys,
            ledger,
            audit,
            config,
            challenge_responses,
            inflight_counts: InflightCounter::default(),
        }
    }

    pub async fn register_wallet(&self, wallet: WalletRecord) -> ApprovalResult<()> {
        self.store.put_json(&wallet_key(wallet.wallet_id), &wallet).await?;
        Ok(())
    }

    pub async fn get_wallet(&self, wallet_id: WalletId) -> ApprovalResult<WalletRecord> {
        self.store
            .get_json(&wallet_key(wallet_id))
            .await?
            .ok_or_else(|| ApprovalError::WalletNotFound(wallet_id.to_string()))
    }

    pub async fn get_intent(&self, intent_id: IntentId) -> ApprovalResult<IntentRecord> {
        self.store
            .get_json(&intent_key(intent_id))
            .await?
            .ok_or_else(|| ApprovalError::IntentNotFound(intent_id.to_string()))
    }

    async fn put_intent(&self, intent: &IntentRecord) -> ApprovalResult<()> {
        self.store.put_json(&intent_key(intent.intent_id), intent).await?;
        Ok(())
    }

    /// `pending -> awaiting_approval`: create an intent, select its
    /// tier, allocate its ephemeral key, and issue a Challenge if the tier
    /// requires one.
    pub async fn create_intent(
        &self,
        wallet_id: WalletId,
        destination_address: String,
        amount: Amount,
        memo: Option<String>,
    ) -> ApprovalResult<IntentRecord> {
        if memo.as_deref().map(|m| m.len()).unwrap_or(0) > 28 {
            return Err(ApprovalError::InputInvalid {
                field: "memo".to_string(),
                reason: "memo exceeds 28 bytes".to_string(),
            });
        }

        if custody_crypto::strkey::decode_public_key(&destination_address).is_none() {
            return Err(ApprovalError::InputInvalid {
                field: "destination_address".to_string(),
                reason: "not a valid Stellar public key address".to_string(),
            });
        }

        let wallet = self.get_wallet(wallet_id).await?;

        if !self.inflight_counts.try_reserve(wallet.partition, self.config.max_inflight_intents_per_tenant) {
            return Err(ApprovalError::Busy);
        }

        let tier = crate::tier_policy::select_tier(amount, wallet.class, &self.config);
        let now = self.clock.now_millis();
        let intent_id = IntentId::new();

        let mut intent = IntentRecord {
            intent_id,
            partition: wallet.partition,
            source_wallet: wallet_id,
            destination_address: destination_address.clone(),
            amount,
            memo,
            tier,
            state: IntentState::Pending,
            ephemeral_key_id: None,
            valid_approvals: 0,
            created_at_millis: now,
            deadline_millis: now + self.config.intent_deadline_millis(),
            ledger_hash_hex: None,
            ledger_sequence: None,
            failure_reason: None,
        };

        let ephemeral = self
            .ephemeral_keys
            .allocate(intent_id, wallet.key_id, wallet.partition)
            .await
            .map_err(ApprovalError::from)?;
        intent.ephemeral_key_id = Some(ephemeral.ephemeral_key_id);
        intent.state = IntentState::AwaitingApproval;
        self.put_intent(&intent).await?;

        if tier.requires_challenge() {
            let challenge = challenge::generate(
                intent_id,
                amount,
                &destination_address,
                wallet_id,
                now,
                self.config.challenge_ttl_seconds * 1000,
            );
            self.store.put_json(&challenge_key(intent_id), &challenge).await?;
        }

        tracing::info!(%intent_id, %tier, "intent created and awaiting approval");
        Ok(intent)
    }

    /// The Challenge currently open on `intent_id`, if any - exposed so a
    /// caller notifying approvers can read its display digest without
    /// reaching into this engine's storage layout.
    pub async fn active_challenge(&self, intent_id: IntentId) -> ApprovalResult<Option<ChallengeRecord>> {
        Ok(self.store.get_json(&challenge_key(intent_id)).await?)
    }

    /// Validate one approver's response and, if it completes the
    /// threshold, trigger execution.
    pub async fn submit_approval(
        &self,
        intent_id: IntentId,
        approver: ApproverId,
        response: &str,
    ) -> ApprovalResult<ApprovalOutcome> {
        let intent = self.get_intent(intent_id).await?;
        if intent.state != IntentState::AwaitingApproval {
            return Err(ApprovalError::NotAwaitingApproval { state: intent.state.to_string() });
        }

        let now = self.clock.now_millis();
        if now >= intent.deadline_millis {
            return Err(ApprovalError::ChallengeExpired);
        }

        let method = if intent.tier.requires_challenge() {
            let challenge = self
                .active_challenge(intent_id)
                .await?
                .ok_or(ApprovalError::NoActiveChallenge)?;
            if challenge.is_expired(now) {
                return Err(ApprovalError::ChallengeExpired);
            }
            AuthenticatorMethod::ChallengeResponse
        } else {
            AuthenticatorMethod::FallbackOtp
        };

        // Verify the code first so a typo never consumes the approver's
        // one-time claim on this intent or the response's anti-replay slot -
        // both of those are "spent" only once the code is known good.
        if let Err(err) = self.authenticator.verify(approver, response).await {
            self.audit.record(AuditEvent::AuthnFailed { intent_id, approver, reason: err.to_string() });
            return Err(err.into());
        }

        // UsedResponseSet: process-wide (approver, response) anti-replay,
        // independent of which intent presented it.
        if !self.challenge_responses.claim(&approver.to_string(), response).await? {
            self.audit.record(AuditEvent::AuthnFailed {
                intent_id,
                approver,
                reason: "replayed-response".to_string(),
            });
            return Err(ApprovalError::ResponseReplayed);
        }

        // At most one valid Approval per (intent, approver).
        if !self.store.claim_unique(&approval_claim_key(intent_id, approver)).await? {
            self.audit.record(AuditEvent::PolicyDenied {
                intent_id,
                reason: "approver already approved this intent".to_string(),
            });
            return Err(ApprovalError::AlreadyApproved);
        }

        let wallet = self.get_wallet(intent.source_wallet).await?;
        let ephemeral_id = intent
            .ephemeral_key_id
            .ok_or_else(|| ApprovalError::Internal("intent missing ephemeral key".to_string()))?;
        let ephemeral = self
            .ephemeral_keys
            .get(ephemeral_id)
            .await
            .map_err(ApprovalError::from)?
            .ok_or_else(|| ApprovalError::Internal("ephemeral key record missing".to_string()))?;

        let grant = self
            .hsm
            .authorize_release(wallet.partition, ephemeral.hsm_key_id, approver, response)
            .await
            .map_err(|e: CryptoError| ApprovalError::HsmDenied(e.to_string()))?;

        let approval = ApprovalRecord {
            approval_id: custody_types::ApprovalId::new(),
            intent_id,
            approver,
            method,
            response: response.to_string(),
            timestamp_millis: now,
        };
        self.store.put_json(&approval_key(intent_id, approval.approval_id), &approval).await?;

        let outcome = self.bump_approvals(intent_id).await?;

        if outcome.reached_threshold {
            tracing::info!(%intent_id, "approval threshold reached, executing");
            self.execute(intent_id, grant.release_id).await?;
        }

        Ok(outcome)
    }

    /// An atomic transition: a single conditional update naming the
    /// expected current `valid_approvals` so two Nth approvals racing the
    /// threshold cannot both win.
    async fn bump_approvals(&self, intent_id: IntentId) -> ApprovalResult<ApprovalOutcome> {
        loop {
            let key = intent_key(intent_id);
            let current_bytes = self
                .store
                .get(&key)
                .await?
                .ok_or_else(|| ApprovalError::IntentNotFound(intent_id.to_string()))?;
            let mut intent: IntentRecord = serde_json::from_slice(&current_bytes)
                .map_err(|e| ApprovalError::Internal(e.to_string()))?;

            if intent.state != IntentState::AwaitingApproval {
                // Someone else already pushed this past threshold.
                return Ok(ApprovalOutcome {
                    valid_approvals: intent.valid_approvals,
                    threshold: intent.threshold(),
                    reached_threshold: false,
                    state: intent.state,
                });
            }

            let threshold = intent.threshold();
            intent.valid_approvals += 1;
            let reached = intent.valid_approvals >= threshold;
            if reached {
                intent.state = IntentState::Executing;
            }

            let new_bytes = serde_json::to_vec(&intent).map_err(|e| ApprovalError::Internal(e.to_string()))?;
            if self.store.compare_and_swap(&key, Some(&current_bytes), new_bytes).await? {
                return Ok(ApprovalOutcome {
                    valid_approvals: intent.valid_approvals,
                    threshold,
                    reached_threshold: reached,
                    state: intent.state,
                });
            }
            // Lost the race: retry against the freshly observed state.
        }
    }

    /// Execution trigger: hand the intent to the Ledger Submitter,
    /// using the ephemeral key's one-shot signature.
    async fn execute(&self, intent_id: IntentId, release_id: custody_types::ReleaseId) -> ApprovalResult<()> {
        let intent = self.get_intent(intent_id).await?;
        let ephemeral_id = intent
            .ephemeral_key_id
            .ok_or_else(|| ApprovalError::Internal("intent missing ephemeral key".to_string()))?;
        let ephemeral = self
            .ephemeral_keys
            .get(ephemeral_id)
            .await
            .map_err(ApprovalError::from)?
            .ok_or_else(|| ApprovalError::Internal("ephemeral key record missing".to_string()))?;

        let source_address = PublicKey::from_bytes(ephemeral.public_key_bytes).to_stellar_address();
        let signer = EphemeralSigner { manager: self.ephemeral_keys.clone(), ephemeral_id, release_id };

        let ledger_intent = LedgerPaymentIntent {
            source_address,
            destination_address: intent.destination_address.clone(),
            amount: intent.amount,
            memo: intent.memo.clone(),
        };

        match self.ledger.submit_payment(&ledger_intent, &signer).await {
            Ok(receipt) => {
                let mut intent = self.get_intent(intent_id).await?;
                intent.state = IntentState::Success;
                intent.ledger_hash_hex = Some(hex::encode(receipt.ledger_hash));
                intent.ledger_sequence = Some(receipt.ledger_sequence);
                self.put_intent(&intent).await?;
                self.inflight_counts.release(intent.partition);
                self.audit.record(AuditEvent::IntentSucceeded { intent_id });
                Ok(())
            }
            Err(err) => {
                tracing::error!(%intent_id, error = %err, "execution failed, destroying ephemeral key");
                let _ = self.hsm.destroy(ephemeral.hsm_key_id).await;
                let mut intent = self.get_intent(intent_id).await?;
                intent.state = IntentState::Failed;
                intent.failure_reason = Some(err.to_string());
                self.put_intent(&intent).await?;
                self.inflight_counts.release(intent.partition);
                self.audit.record(AuditEvent::IntentFailed { intent_id, reason: err.to_string() });
                Err(err.into())
            }
        }
    }

    /// Intents past their deadline without reaching threshold are
    /// cancelled and their ephemeral key destroyed.
    pub async fn cancel_expired(&self, limit: usize) -> ApprovalResult<usize> {
        let now = self.clock.now_millis();
        let entries = self.store.scan_prefix(keys::INTENT).await?;
        let mut cancelled = 0;

        for (_, bytes) in entries {
            if cancelled >= limit {
                break;
            }
            let mut intent: IntentRecord = match serde_json::from_slice(&bytes) {
                Ok(i) => i,
                Err(_) => continue,
            };
            if intent.state != IntentState::AwaitingApproval || now < intent.deadline_millis {
                continue;
            }

            if let Some(ephemeral_id) = intent.ephemeral_key_id {
                if let Ok(Some(ephemeral)) = self.ephemeral_keys.get(ephemeral_id).await {
                    let _ = self.hsm.destroy(ephemeral.hsm_key_id).await;
                }
            }
            intent.state = IntentState::Cancelled;
            intent.failure_reason = Some("challenge expired with insufficient approvals".to_string());
            self.put_intent(&intent).await?;
            self.inflight_counts.release(intent.partition);
            self.audit.record(AuditEvent::IntentCancelled {
                intent_id: intent.intent_id,
                reason: "deadline exceeded".to_string(),
            });
            cancelled += 1;
        }

        Ok(cancelled)
    }

    /// After an HSM or ledger timeout during execution, consult the
    /// ledger and the HSM's key state and reconcile to `success` or
    /// `failed` rather than guessing.
    pub async fn reconcile(&self, intent_id: IntentId) -> ApprovalResult<IntentState> {
        let mut intent = self.get_intent(intent_id).await?;
        if intent.state.is_terminal() {
            return Ok(intent.state);
        }

        let ephemeral_id = intent
            .ephemeral_key_id
            .ok_or_else(|| ApprovalError::Internal("intent missing ephemeral key".to_string()))?;
        let ephemeral = self
            .ephemeral_keys
            .get(ephemeral_id)
            .await
            .map_err(ApprovalError::from)?
            .ok_or_else(|| ApprovalError::Internal("ephemeral key record missing".to_string()))?;

        // The local state alone can't tell a lost response apart from a
        // payment that actually landed, so ask the ledger directly: if the
        // ephemeral address's account shows a submitted transaction, the
        // payment went through regardless of what our own call observed.
        let source_address = PublicKey::from_bytes(ephemeral.public_key_bytes).to_stellar_address();
        let landed = self.ledger.account_has_submitted(&source_address).await;

        let resolved = if landed {
            IntentState::Success
        } else {
            if !ephemeral.state.is_terminal() {
                let _ = self.hsm.destroy(ephemeral.hsm_key_id).await;
            }
            IntentState::Failed
        };

        intent.state = resolved;
        if resolved == IntentState::Failed {
            intent.failure_reason.get_or_insert_with(|| "reconciliation: ledger shows no landed transaction".to_string());
        }
        self.put_intent(&intent).await?;
        self.inflight_counts.release(intent.partition);
        Ok(resolved)
    }
}

struct EphemeralSigner {
    manager: Arc<EphemeralKeyManager>,
    ephemeral_id: EphemeralKeyId,
    release_id: custody_types::ReleaseId,
}

#[async_trait]
impl DigestSigner for EphemeralSigner {
    async fn sign(&self, digest: &[u8; 32]) -> Result<(PublicKey, Signature), CustodyError> {
        let signature = self.manager.sign_for_intent(self.ephemeral_id, self.release_id, digest).await?;
        let record = self
            .manager
            .get(self.ephemeral_id)
            .await
            .map_err(CustodyError::from)?
            .ok_or_else(|| CustodyError::not_found("ephemeral key"))?;
        Ok((PublicKey::from_bytes(record.public_key_bytes), signature))
    }
}
