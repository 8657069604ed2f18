//! `CustodyService`: the facade that wires the HSM Gateway, Key Registry,
//! Ephemeral Key Manager, approver authenticator, Ledger Submitter and
//! Approval Engine into the single object a deployment (or `custody-cli`)
//! talks to.

use std::sync::Arc;

use custody_approval::audit::{AuditLog, InMemoryAuditLog};
use custody_approval::{ApprovalEngine, ApprovalOutcome, IntentRecord, WalletRecord};
use custody_auth::ApproverAuthenticator;
use custody_crypto::hsm::HsmGateway;
use custody_db::CustodyStore;
use custody_keys::registry::{KeyRecord, KeyRegistry};
use custody_keys::EphemeralKeyManager;
use custody_ledger::{LedgerClient, LedgerSubmitter, SubmitRetryConfig};
use custody_types::{
    Amount, ApproverId, ApproverRole, Clock, CustodyError, DerivationPath, IntentId, IntentState, KeyClass,
    PartitionId, Result, WalletId,
};

use crate::config::CustodyConfig;
use crate::notification::{ApprovalNotice, NotificationSink};
use crate::roster::ApproverRoster;

/// The wallet pair produced by onboarding one tenant: the always-CRITICAL
/// cold wallet at `m/0'` and the hot wallet at `m/0'/0'` that every
/// ephemeral payment key descends from.
#[derive(Debug, Clone, Copy)]
pub struct ProvisionedWallets {
    pub partition: PartitionId,
    pub cold_wallet_id: WalletId,
    pub hot_wallet_id: WalletId,
}

pub struct CustodyService {
    store: Arc<dyn CustodyStore>,
    clock: Arc<dyn Clock>,
    hsm: Arc<dyn HsmGateway>,
    key_registry: KeyRegistry,
    ephemeral_keys: Arc<EphemeralKeyManager>,
    authenticator: Arc<ApproverAuthenticator>,
    engine: ApprovalEngine,
    roster: ApproverRoster,
    notifier: Arc<dyn NotificationSink>,
    config: CustodyConfig,
}

impl CustodyService {
    /// `hsm` and `authenticator` must share the same [`ApproverAuthenticator`]
    /// as its `ReleaseAuthenticator` - the HSM Gateway's `authorize_release`
    /// and the Approval Engine's challenge validation both consume one-time
    /// codes from the same anti-replay set, so the two cannot be built
    /// independently. Callers construct `authenticator` first, wire it
    /// into `hsm`, then pass both here.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn CustodyStore>,
        clock: Arc<dyn Clock>,
        hsm: Arc<dyn HsmGateway>,
        authenticator: Arc<ApproverAuthenticator>,
        ledger_client: Arc<dyn LedgerClient>,
        notifier: Arc<dyn NotificationSink>,
        config: CustodyConfig,
    ) -> Self {
        let key_registry = KeyRegistry::new(store.clone());
        let ephemeral_keys = Arc::new(EphemeralKeyManager::new(
            hsm.clone(),
            store.clone(),
            clock.clone(),
            config.approval.ephemeral_ttl_seconds * 1000,
        ));
        let ledger = Arc::new(LedgerSubmitter::new(
            ledger_client,
            config.approval.network_passphrase.clone(),
            SubmitRetryConfig::default(),
        ));
        let audit: Arc<dyn AuditLog> = Arc::new(InMemoryAuditLog::new());
        let roster = ApproverRoster::new(store.clone());

        let engine = ApprovalEngine::new(
            store.clone(),
            clock.clone(),
            hsm.clone(),
            authenticator.clone(),
            ephemeral_keys.clone(),
            ledger,
            audit,
            config.approval.clone(),
        );

        Self { store, clock, hsm, key_registry, ephemeral_keys, authenticator, engine, roster, notifier, config }
    }

    // ------------------------------------------------------------------
    // Approver enrollment
    // ------------------------------------------------------------------

    /// Provision a TOTP secret for `approver` and bind it to `role` in the
    /// roster. Returns the provisioning URI for out-of-band handoff to the
    /// approver's authenticator app.
    pub async fn enroll_approver(
        &self,
        role: ApproverRole,
        approver: ApproverId,
        account_name: &str,
        contact: impl Into<String>,
    ) -> Result<custody_auth::TotpSecret> {
        let secret = self.authenticator.enroll(approver, account_name).await.map_err(CustodyError::from)?;
        self.roster.enroll(role, approver, contact).await.map_err(CustodyError::from)?;
        Ok(secret)
    }

    pub async fn deactivate_approver(&self, approver: ApproverId) -> Result<()> {
        self.roster.set_active(approver, false).await.map_err(CustodyError::from)
    }

    pub async fn activate_approver(&self, approver: ApproverId) -> Result<()> {
        self.roster.set_active(approver, true).await.map_err(CustodyError::from)
    }

    // ------------------------------------------------------------------
    // Wallet provisioning
    // ------------------------------------------------------------------

    /// Create a fresh partition and derive its cold (`m/0'`) and hot
    /// (`m/0'/0'`) keys, registering both as Wallets the Approval Engine can
    /// select a tier for (cold is always CRITICAL; hot is tiered by amount).
    pub async fn provision_wallets(&self) -> Result<ProvisionedWallets> {
        let partition = PartitionId::new();
        let info = self.hsm.create_partition(partition).await.map_err(CustodyError::from)?;

        let cold = self
            .hsm
            .derive_key(info.master_key_id, &DerivationPath::cold().suffix_for_parent(), KeyClass::Cold)
            .await
            .map_err(CustodyError::from)?;
        let hot = self
            .hsm
            .derive_key(cold.key_id, &DerivationPath::hot().suffix_for_parent(), KeyClass::Hot)
            .await
            .map_err(CustodyError::from)?;

        let now = self.clock.now_millis();
        self.key_registry
            .put(&KeyRecord {
                key_id: cold.key_id,
                parent_key_id: Some(info.master_key_id),
                path: DerivationPath::cold(),
                class: KeyClass::Cold,
                partition,
                public_key_bytes: cold.public_key.to_bytes(),
                created_at_millis: now,
                revoked: false,
            })
            .await
            .map_err(CustodyError::from)?;
        self.key_registry
            .put(&KeyRecord {
                key_id: hot.key_id,
                parent_key_id: Some(cold.key_id),
                path: DerivationPath::hot(),
                class: KeyClass::Hot,
                partition,
                public_key_bytes: hot.public_key.to_bytes(),
                created_at_millis: now,
                revoked: false,
            })
            .await
            .map_err(CustodyError::from)?;

        let cold_wallet_id = WalletId::new();
        let hot_wallet_id = WalletId::new();
        self.engine
            .register_wallet(WalletRecord { wallet_id: cold_wallet_id, partition, key_id: cold.key_id, class: KeyClass::Cold })
            .await
            .map_err(CustodyError::from)?;
        self.engine
            .register_wallet(WalletRecord { wallet_id: hot_wallet_id, partition, key_id: hot.key_id, class: KeyClass::Hot })
            .await
            .map_err(CustodyError::from)?;

        Ok(ProvisionedWallets { partition, cold_wallet_id, hot_wallet_id })
    }

    // ------------------------------------------------------------------
    // Payment intents
    // ------------------------------------------------------------------

    /// `create-intent`, followed by a best-effort notification to
    /// every active approver if the selected tier requires a challenge
    /// response (fire-and-forget).
    pub async fn create_payment_intent(
        &self,
        wallet_id: WalletId,
        destination_address: String,
        amount: Amount,
        memo: Option<String>,
    ) -> Result<IntentRecord> {
        let intent = self
            .engine
            .create_intent(wallet_id, destination_address.clone(), amount, memo)
            .await
            .map_err(CustodyError::from)?;

        if intent.tier.requires_challenge() {
            let digest = self
                .engine
                .active_challenge(intent.intent_id)
                .await
                .map_err(CustodyError::from)?
                .map(|c| c.display_digest)
                .unwrap_or_default();
            let approval_url = format!("custody://approve/{}", intent.intent_id);

            let approvers = self.roster.all().await.map_err(CustodyError::from)?;
            for approver in approvers.into_iter().filter(|a| a.active) {
                self.notifier
                    .notify_approver(ApprovalNotice {
                        approver: approver.approver_id,
                        intent_id: intent.intent_id,
                        amount,
                        destination: &destination_address,
                        display_digest: &digest,
                        approval_url: &approval_url,
                    })
                    .await;
            }
        }

        Ok(intent)
    }

    /// Submit one approver's response. Rejects up front if the approver
    /// isn't an active member of the roster (`policy-denied` "approver
    /// inactive") before even touching the engine's state machine.
    pub async fn submit_approval(
        &self,
        intent_id: IntentId,
        approver: ApproverId,
        response: &str,
    ) -> Result<ApprovalOutcome> {
        if !self.roster.is_active(approver).await.map_err(CustodyError::from)? {
            return Err(CustodyError::policy_denied(format!("approver {approver} is not active")));
        }
        self.engine.submit_approval(intent_id, approver, response).await.map_err(CustodyError::from)
    }

    pub async fn get_intent(&self, intent_id: IntentId) -> Result<IntentRecord> {
        self.engine.get_intent(intent_id).await.map_err(CustodyError::from)
    }

    pub async fn get_wallet(&self, wallet_id: WalletId) -> Result<WalletRecord> {
        self.engine.get_wallet(wallet_id).await.map_err(CustodyError::from)
    }

    /// Read one ephemeral key's lifecycle record, for ops tooling that wants
    /// to confirm no `success` while the key is outstanding itself.
    pub async fn get_ephemeral_key(
        &self,
        ephemeral_key_id: custody_types::EphemeralKeyId,
    ) -> Result<Option<custody_keys::EphemeralKeyRecord>> {
        self.ephemeral_keys.get(ephemeral_key_id).await.map_err(CustodyError::from)
    }

    // ------------------------------------------------------------------
    // Background sweeps: intent cancellation, ephemeral key expiry
    // ------------------------------------------------------------------

    pub async fn cancel_expired_intents(&self, limit: usize) -> Result<usize> {
        self.engine.cancel_expired(limit).await.map_err(CustodyError::from)
    }

    pub async fn sweep_expired_ephemeral_keys(&self, limit: usize) -> Result<usize> {
        self.ephemeral_keys.expire_sweep(limit).await
    }

    /// Resolve an intent stuck mid-execution after an HSM or ledger
    /// timeout.
    pub async fn reconcile_intent(&self, intent_id: IntentId) -> Result<IntentState> {
        self.engine.reconcile(intent_id).await.map_err(CustodyError::from)
    }

    pub fn config(&self) -> &CustodyConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn CustodyStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use custody_crypto::hsm::FakeHsm;
    use custody_db::InMemoryStore;
    use custody_ledger::FakeLedgerClient;
    use custody_types::TestClock;

    const TEST_DESTINATION: &str = "GADQOBYHA4DQOBYHA4DQOBYHA4DQOBYHA4DQOBYHA4DQOBYHA4DQOZPI";

    async fn build_service() -> (CustodyService, Arc<FakeLedgerClient>) {
        let clock = Arc::new(TestClock::new(1_700_000_000_000));
        let store: Arc<dyn CustodyStore> = Arc::new(InMemoryStore::new());
        let config = CustodyConfig::default();
        let authenticator =
            Arc::new(ApproverAuthenticator::new(store.clone(), clock.clone(), config.auth.clone()));
        let hsm: Arc<dyn HsmGateway> = Arc::new(FakeHsm::new(clock.clone(), authenticator.clone(), 300_000));
        let ledger = Arc::new(FakeLedgerClient::new(100));
        let ledger_client: Arc<dyn LedgerClient> = ledger.clone();
        let notifier: Arc<dyn NotificationSink> = Arc::new(crate::notification::LoggingNotificationSink);

        let service =
            CustodyService::new(store, clock, hsm, authenticator, ledger_client, notifier, config);
        (service, ledger)
    }

    #[tokio::test]
    async fn provision_wallets_registers_cold_and_hot() {
        let (service, _ledger) = build_service().await;
        let wallets = service.provision_wallets().await.unwrap();

        let cold = service.get_wallet(wallets.cold_wallet_id).await.unwrap();
        let hot = service.get_wallet(wallets.hot_wallet_id).await.unwrap();
        assert_eq!(cold.class, KeyClass::Cold);
        assert_eq!(hot.class, KeyClass::Hot);
    }

    #[tokio::test]
    async fn inactive_approver_is_rejected_before_reaching_the_engine() {
        let (service, ledger) = build_service().await;
        let wallets = service.provision_wallets().await.unwrap();
        ledger.fund(TEST_DESTINATION, 1);

        let intent = service
            .create_payment_intent(wallets.hot_wallet_id, TEST_DESTINATION.to_string(), Amount::from_xlm(10).unwrap(), None)
            .await
            .unwrap();

        let approver = ApproverId::new();
        service.enroll_approver(ApproverRole::Cfo, approver, "cfo@example.com", "cfo@example.com").await.unwrap();
        service.deactivate_approver(approver).await.unwrap();

        let err = service.submit_approval(intent.intent_id, approver, "000000").await.unwrap_err();
        assert!(matches!(err, CustodyError::PolicyDenied { .. }));
    }

    #[tokio::test]
    async fn cold_wallet_outflow_is_always_critical() {
        let (service, _ledger) = build_service().await;
        let wallets = service.provision_wallets().await.unwrap();

        let intent = service
            .create_payment_intent(wallets.cold_wallet_id, TEST_DESTINATION.to_string(), Amount::from_xlm(1).unwrap(), None)
            .await
            .unwrap();
        assert_eq!(intent.tier, custody_types::Tier::Critical);
    }
}
