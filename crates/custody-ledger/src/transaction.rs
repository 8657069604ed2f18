//! Unsigned transaction construction and the signing digest.
//!
//! The wire encoding is not externally prescribed; this module uses a
//! compact length-prefixed encoding that carries the fields Stellar's
//! payment operation actually needs (source,
//! destination, amount, sequence, fee, memo) and folds the network
//! passphrase into the signing base the way Stellar's `HashIdPreimage`
//! does: `digest = SHA256(SHA256(passphrase) || tx_bytes)`.

use custody_crypto::hash::{hash_all, sha256};
use custody_types::{Amount, CustodyError};
use serde::{Deserialize, Serialize};

/// Everything the Ledger Submitter needs to build an unsigned transaction.
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    pub source_address: String,
    pub destination_address: String,
    pub amount: Amount,
    pub memo: Option<String>,
}

/// An account's current chain state, as reported by [`crate::LedgerClient::load_account`].
#[derive(Debug, Clone, Copy)]
pub struct AccountState {
    pub sequence: i64,
    pub balance_stroops: i64,
}

/// An unsigned transaction, ready to be hashed and signed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub source_address: String,
    pub destination_address: String,
    pub amount_stroops: i64,
    pub memo: Option<String>,
    pub sequence: i64,
    pub fee_stroops: i64,
    pub network_passphrase: String,
}

impl UnsignedTransaction {
    /// Combine the payment intent with the source account's current
    /// sequence number and the network's base fee.
    pub fn build(
        intent: &PaymentIntent,
        account: &AccountState,
        base_fee_stroops: i64,
        network_passphrase: &str,
    ) -> Result<Self, CustodyError> {
        if let Some(memo) = &intent.memo {
            if memo.len() > 28 {
                return Err(CustodyError::input_invalid("memo", "memo exceeds 28 bytes"));
            }
        }

        Ok(Self {
            source_address: intent.source_address.clone(),
            destination_address: intent.destination_address.clone(),
            amount_stroops: intent.amount.stroops(),
            memo: intent.memo.clone(),
            sequence: account.sequence + 1,
            fee_stroops: base_fee_stroops,
            network_passphrase: network_passphrase.to_string(),
        })
    }

    fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for field in [
            self.source_address.as_bytes(),
            self.destination_address.as_bytes(),
            &self.amount_stroops.to_be_bytes(),
            self.memo.as_deref().unwrap_or("").as_bytes(),
            &self.sequence.to_be_bytes(),
            &self.fee_stroops.to_be_bytes(),
        ] {
            buf.extend_from_slice(&(field.len() as u32).to_be_bytes());
            buf.extend_from_slice(field);
        }
        buf
    }

    /// The signing base defined by the ledger network passphrase. Mirrors
    /// Stellar's `HashIdPreimage::EnvelopeTypeTx`
    /// construction: `SHA256(SHA256(passphrase) || body)`.
    pub fn digest(&self) -> [u8; 32] {
        let passphrase_hash = sha256(self.network_passphrase.as_bytes());
        hash_all(&[&passphrase_hash, &self.canonical_bytes()])
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("UnsignedTransaction always serializes")
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CustodyError> {
        serde_json::from_slice(bytes)
            .map_err(|e| CustodyError::input_invalid("unsigned_tx_bytes", e.to_string()))
    }
}

/// A transaction plus the signature the HSM produced over its digest,
/// ready for `submit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub transaction: UnsignedTransaction,
    pub public_key_bytes: [u8; 32],
    pub signature_bytes: [u8; 64],
}

impl SignedTransaction {
    /// Attach a signature to a built transaction.
    pub fn attach(transaction: UnsignedTransaction, public_key_bytes: [u8; 32], signature_bytes: [u8; 64]) -> Self {
        Self { transaction, public_key_bytes, signature_bytes }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("SignedTransaction always serializes")
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CustodyError> {
        serde_json::from_slice(bytes)
            .map_err(|e| CustodyError::input_invalid("signed_tx_bytes", e.to_string()))
    }
}
