//! Ledger Submitter error types

use thiserror::Error;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors the Ledger Submitter can raise, tagged so the Approval Engine can
/// classify them as `ledger-transient` vs `ledger-permanent`.
#[derive(Debug, Error, Clone)]
pub enum LedgerError {
    #[error("source account not found on ledger: {address}")]
    AccountNotFound { address: String },

    #[error("sequence number conflict, retry")]
    SequenceConflict,

    #[error("ledger rate-limited the request")]
    RateLimited,

    #[error("insufficient fee for current network conditions")]
    InsufficientFee,

    #[error("transaction signature rejected by the ledger")]
    BadSignature,

    #[error("malformed transaction: {reason}")]
    Malformed { reason: String },

    #[error("ledger network unreachable: {reason}")]
    Unavailable { reason: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// `ledger-transient`: retried by the submitter itself.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::SequenceConflict | Self::RateLimited | Self::Unavailable { .. })
    }
}

impl From<LedgerError> for custody_types::CustodyError {
    fn from(err: LedgerError) -> Self {
        use custody_types::CustodyError;
        match &err {
            LedgerError::AccountNotFound { .. }
            | LedgerError::InsufficientFee
            | LedgerError::BadSignature => CustodyError::LedgerPermanent { reason: err.to_string() },
            LedgerError::SequenceConflict | LedgerError::RateLimited | LedgerError::Unavailable { .. } => {
                CustodyError::LedgerTransient { reason: err.to_string() }
            }
            LedgerError::Malformed { reason } => CustodyError::input_invalid("transaction", reason.clone()),
            LedgerError::Internal(message) => CustodyError::internal(message.clone()),
        }
    }
}
