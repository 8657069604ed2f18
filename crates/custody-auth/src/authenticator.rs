//! Approver authentication service.
//!
//! Wires together TOTP verification, per-approver lockout, and anti-replay
//! into the [`custody_crypto::hsm::ReleaseAuthenticator`] the HSM boundary
//! calls before minting a release-id. The Approval Engine uses the same
//! TOTP secret store directly to validate a challenge response before it
//! even reaches the HSM - two independent checks of the same underlying
//! code, each with its own anti-replay namespace.

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::lockout::LockoutTracker;
use crate::totp::{TotpSecret, TotpService};
use crate::used_response::UsedResponseSet;
use async_trait::async_trait;
use custody_crypto::hsm::ReleaseAuthenticator;
use custody_crypto::{CryptoError, CryptoResult};
use custody_db::{CustodyStore, CustodyStoreExt};
use custody_types::{ApproverId, Clock, PartitionId};
use std::sync::Arc;

const SECRET_KEY_PREFIX: &str = "approver_totp_secret:";

/// Service an operator uses to enroll approvers and that the Approval
/// Engine and HSM boundary both call into to validate codes.
pub struct ApproverAuthenticator {
    store: Arc<dyn CustodyStore>,
    clock: Arc<dyn Clock>,
    totp: TotpService,
    lockout: LockoutTracker,
    release_claims: UsedResponseSet,
}

impl ApproverAuthenticator {
    pub fn new(store: Arc<dyn CustodyStore>, clock: Arc<dyn Clock>, config: AuthConfig) -> Self {
        let totp = TotpService::new(config.totp);
        let lockout = LockoutTracker::new(clock.clone(), config.lockout);
        let release_claims = UsedResponseSet::release_authorizations(store.clone());
        Self { store, clock, totp, lockout, release_claims }
    }

    /// Provision a fresh TOTP secret for `approver`, overwriting any prior
    /// enrollment. Returns the provisioning URI for the operator to hand to
    /// the approver out of band.
    pub async fn enroll(&self, approver: ApproverId, account_name: &str) -> AuthResult<TotpSecret> {
        let secret = self.totp.generate_secret(account_name);
        self.store
            .put_json(&secret_key(approver), &secret.secret)
            .await?;
        Ok(secret)
    }

    /// Validate `code` for `approver` without consuming anything - used by
    /// the Approval Engine to accept a challenge response, which maintains
    /// its own anti-replay claim on the `(challenge, response)` pair rather
    /// than this service's release-authorization claim.
    pub async fn verify(&self, approver: ApproverId, code: &str) -> AuthResult<()> {
        self.lockout.check(approver)?;

        let secret: String = self
            .store
            .get_json(&secret_key(approver))
            .await?
            .ok_or(AuthError::SecretNotFound)?;

        let now = self.clock.now_millis();
        if self.totp.verify_code(&secret, code, now)? {
            self.lockout.record_success(approver);
            Ok(())
        } else {
            self.lockout.record_failure(approver);
            Err(AuthError::InvalidCode)
        }
    }
}

fn secret_key(approver: ApproverId) -> String {
    format!("{SECRET_KEY_PREFIX}{approver}")
}

#[async_trait]
impl ReleaseAuthenticator for ApproverAuthenticator {
    async fn validate_and_consume(
        &self,
        partition: PartitionId,
        approver: ApproverId,
        one_time_code: &str,
    ) -> CryptoResult<()> {
        self.verify(approver, one_time_code)
            .await
            .map_err(CryptoError::from)?;

        let subject = format!("{partition}:{approver}");
        let claimed = self
            .release_claims
            .claim(&subject, one_time_code)
            .await
            .map_err(|e| CryptoError::Internal(e.to_string()))?;

        if !claimed {
            return Err(CryptoError::CodeReplayed);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use custody_db::InMemoryStore;
    use custody_types::TestClock;

    fn authenticator(clock: Arc<TestClock>) -> ApproverAuthenticator {
        let store: Arc<dyn CustodyStore> = Arc::new(InMemoryStore::new());
        ApproverAuthenticator::new(store, clock, AuthConfig::default())
    }

    #[tokio::test]
    async fn verifies_enrolled_approver_code() {
        let clock = Arc::new(TestClock::new(1_700_000_000_000));
        let auth = authenticator(clock.clone());
        let approver = ApproverId::new();
        let secret = auth.enroll(approver, "cfo@example.com").await.unwrap();

        let code = auth
            .totp
            .generate_current_code(&secret.secret, clock.now_millis())
            .unwrap();
        assert!(auth.verify(approver, &code).await.is_ok());
    }

    #[tokio::test]
    async fn rejects_wrong_code() {
        let clock = Arc::new(TestClock::new(1_700_000_000_000));
        let auth = authenticator(clock.clone());
        let approver = ApproverId::new();
        auth.enroll(approver, "cfo@example.com").await.unwrap();

        assert!(matches!(
            auth.verify(approver, "000000").await,
            Err(AuthError::InvalidCode)
        ));
    }

    #[tokio::test]
    async fn release_authorization_rejects_replayed_code() {
        let clock = Arc::new(TestClock::new(1_700_000_000_000));
        let auth = authenticator(clock.clone());
        let approver = ApproverId::new();
        let secret = auth.enroll(approver, "cfo@example.com").await.unwrap();
        let partition = PartitionId::new();
        let code = auth
            .totp
            .generate_current_code(&secret.secret, clock.now_millis())
            .unwrap();

        auth.validate_and_consume(partition, approver, &code).await.unwrap();
        let result = auth.validate_and_consume(partition, approver, &code).await;
        assert!(matches!(result, Err(CryptoError::CodeReplayed)));
    }

    #[tokio::test]
    async fn lockout_blocks_further_attempts() {
        let clock = Arc::new(TestClock::new(1_700_000_000_000));
        let auth = authenticator(clock.clone());
        let approver = ApproverId::new();
        auth.enroll(approver, "cfo@example.com").await.unwrap();

        for _ in 0..5 {
            let _ = auth.verify(approver, "000000").await;
        }
        assert!(matches!(
            auth.verify(approver, "000000").await,
            Err(AuthError::ApproverLockedOut { .. })
        ));
    }
}
