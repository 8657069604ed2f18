//! Ledger Submitter orchestration: build → digest → sign → attach →
//! submit, with bounded retries. Stateless - every call re-derives its state
//! from the ledger client and the signer it's given.

use crate::client::{LedgerClient, SubmitReceipt};
use crate::error::{LedgerError, LedgerResult};
use crate::transaction::{AccountState, PaymentIntent, SignedTransaction, UnsignedTransaction};
use async_trait::async_trait;
use custody_crypto::{PublicKey, Signature};
use custody_types::CustodyError;
use std::sync::Arc;
use std::time::Duration;

/// A signer that produces exactly one signature over a digest. The Ledger
/// Submitter doesn't know or care that this is backed by an ephemeral key
/// one HSM release authorizes; it only needs the capability.
#[async_trait]
pub trait DigestSigner: Send + Sync {
    async fn sign(&self, digest: &[u8; 32]) -> Result<(PublicKey, Signature), CustodyError>;
}

/// Retries are bounded: 3 attempts with exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct SubmitRetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for SubmitRetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_millis(200), max_delay: Duration::from_secs(5) }
    }
}

pub struct LedgerSubmitter {
    client: Arc<dyn LedgerClient>,
    network_passphrase: String,
    retry: SubmitRetryConfig,
}

impl LedgerSubmitter {
    pub fn new(client: Arc<dyn LedgerClient>, network_passphrase: impl Into<String>, retry: SubmitRetryConfig) -> Self {
        Self { client, network_passphrase: network_passphrase.into(), retry }
    }

    /// The full build-digest-sign-submit pipeline for one payment. `signer`
    /// is called exactly once, against the digest of the transaction
    /// actually built here, so the bytes submitted to the ledger are
    /// provably what the HSM signed.
    pub async fn submit_payment(
        &self,
        intent: &PaymentIntent,
        signer: &dyn DigestSigner,
    ) -> LedgerResult<SubmitReceipt> {
        let account = self.load_account_funding_if_needed(&intent.source_address).await?;
        let base_fee = self.client.fetch_base_fee().await?;

        let unsigned = UnsignedTransaction::build(intent, &account, base_fee, &self.network_passphrase)
            .map_err(|e| LedgerError::Malformed { reason: e.to_string() })?;
        let digest = unsigned.digest();

        let (public_key, signature) = signer
            .sign(&digest)
            .await
            .map_err(|e| LedgerError::Internal(e.to_string()))?;

        let signed = SignedTransaction::attach(unsigned, *public_key.as_bytes(), *signature.as_bytes());
        self.submit_with_retry(&signed).await
    }

    /// Best-effort reconciliation signal for a timed-out submission: true if
    /// `address` exists on the ledger with a nonzero sequence number. An
    /// ephemeral address starts at sequence zero when funded and is used for
    /// exactly one payment, so any advance can only be the one transaction
    /// this address was ever going to submit.
    pub async fn account_has_submitted(&self, address: &str) -> bool {
        matches!(self.client.load_account(address).await, Ok(account) if account.sequence > 0)
    }

    async fn load_account_funding_if_needed(&self, address: &str) -> LedgerResult<AccountState> {
        match self.client.load_account(address).await {
            Ok(account) => Ok(account),
            Err(LedgerError::AccountNotFound { address }) => {
                self.client.fund_test_account(&address).await?;
                self.client.load_account(&address).await
            }
            Err(other) => Err(other),
        }
    }

    async fn submit_with_retry(&self, signed: &SignedTransaction) -> LedgerResult<SubmitReceipt> {
        let bytes = signed.to_bytes();
        let mut attempt = 0;
        let mut delay = self.retry.base_delay;

        loop {
            attempt += 1;
            match self.client.submit_signed_xdr(&bytes).await {
                Ok(receipt) => return Ok(receipt),
                Err(err) if err.is_transient() && attempt < self.retry.max_attempts => {
                    tracing::warn!(attempt, error = %err, "ledger submit transient failure, retrying");
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(self.retry.max_delay);
                }
                Err(err) => return Err(err),
            }
        }
    }
}
