//! The Ledger client interface and its in-process reference
//! implementation, used for tests and local development.

use crate::error::{LedgerError, LedgerResult};
use crate::transaction::AccountState;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Result of a successful `submit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub ledger_hash: [u8; 32],
    pub ledger_sequence: i64,
}

/// Ledger client interface, consumed by the Ledger Submitter.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn load_account(&self, address: &str) -> LedgerResult<AccountState>;

    async fn fetch_base_fee(&self) -> LedgerResult<i64>;

    async fn submit_signed_xdr(&self, signed_tx_bytes: &[u8]) -> LedgerResult<SubmitReceipt>;

    /// Auto-funding on test networks via an out-of-band faucet is a
    /// deploy-time concern, not part of the core contract - still exposed
    /// here as an optional hook so the submitter can ask for it without
    /// hard-coding a faucet URL.
    async fn fund_test_account(&self, _address: &str) -> LedgerResult<()> {
        Err(LedgerError::Unavailable { reason: "no faucet configured".to_string() })
    }
}

struct LedgerAccount {
    sequence: i64,
    balance_stroops: i64,
}

/// A reference in-process ledger: accounts exist only once funded, sequence
/// numbers increment on submit, every submitted transaction is recorded by
/// its digest so the same signed bytes resubmit cleanly if the first
/// attempt's response was lost.
pub struct FakeLedgerClient {
    base_fee_stroops: i64,
    ledger_sequence: RwLock<i64>,
    accounts: RwLock<HashMap<String, LedgerAccount>>,
    submitted: RwLock<HashMap<Vec<u8>, SubmitReceipt>>,
}

impl FakeLedgerClient {
    pub fn new(base_fee_stroops: i64) -> Self {
        Self {
            base_fee_stroops,
            ledger_sequence: RwLock::new(1),
            accounts: RwLock::new(HashMap::new()),
            submitted: RwLock::new(HashMap::new()),
        }
    }

    /// Test/demo helper: fund an account as if an out-of-band faucet ran.
    pub fn fund(&self, address: &str, balance_stroops: i64) {
        self.accounts
            .write()
            .unwrap()
            .insert(address.to_string(), LedgerAccount { sequence: 0, balance_stroops });
    }
}

#[async_trait]
impl LedgerClient for FakeLedgerClient {
    async fn load_account(&self, address: &str) -> LedgerResult<AccountState> {
        let accounts = self.accounts.read().unwrap();
        let account = accounts
            .get(address)
            .ok_or_else(|| LedgerError::AccountNotFound { address: address.to_string() })?;
        Ok(AccountState { sequence: account.sequence, balance_stroops: account.balance_stroops })
    }

    async fn fetch_base_fee(&self) -> LedgerResult<i64> {
        Ok(self.base_fee_stroops)
    }

    async fn submit_signed_xdr(&self, signed_tx_bytes: &[u8]) -> LedgerResult<SubmitReceipt> {
        if let Some(receipt) = self.submitted.read().unwrap().get(signed_tx_bytes) {
            return Ok(*receipt);
        }

        let signed = crate::transaction::SignedTransaction::from_bytes(signed_tx_bytes)
            .map_err(|e| LedgerError::Malformed { reason: e.to_string() })?;
        let tx = &signed.transaction;

        let mut accounts = self.accounts.write().unwrap();
        let source = accounts
            .get_mut(&tx.source_address)
            .ok_or_else(|| LedgerError::AccountNotFound { address: tx.source_address.clone() })?;

        if tx.sequence != source.sequence + 1 {
            return Err(LedgerError::SequenceConflict);
        }
        if tx.fee_stroops < self.base_fee_stroops {
            return Err(LedgerError::InsufficientFee);
        }
        let required = tx.amount_stroops + tx.fee_stroops;
        if source.balance_stroops < required {
            return Err(LedgerError::Malformed { reason: "insufficient balance".to_string() });
        }

        source.sequence = tx.sequence;
        source.balance_stroops -= required;
        drop(accounts);

        self.accounts
            .write()
            .unwrap()
            .entry(tx.destination_address.clone())
            .or_insert(LedgerAccount { sequence: 0, balance_stroops: 0 })
            .balance_stroops += tx.amount_stroops;

        let mut ledger_sequence = self.ledger_sequence.write().unwrap();
        *ledger_sequence += 1;
        let receipt = SubmitReceipt {
            ledger_hash: custody_crypto::hash::sha256(signed_tx_bytes),
            ledger_sequence: *ledger_sequence,
        };

        self.submitted.write().unwrap().insert(signed_tx_bytes.to_vec(), receipt);
        Ok(receipt)
    }

    async fn fund_test_account(&self, address: &str) -> LedgerResult<()> {
        self.fund(address, 100 * custody_types::STROOPS_PER_XLM);
        Ok(())
    }
}
