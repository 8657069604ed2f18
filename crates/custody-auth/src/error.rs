//! Approver authentication error types

use thiserror::Error;

/// Result type alias for approver authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid TOTP code")]
    InvalidCode,

    #[error("code already used")]
    CodeReplayed,

    #[error("approver {approver} locked out, try again in {retry_after} seconds")]
    ApproverLockedOut { approver: String, retry_after: u64 },

    #[error("no TOTP secret enrolled for this approver")]
    SecretNotFound,

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn locked_out(approver: impl Into<String>, duration: std::time::Duration) -> Self {
        Self::ApproverLockedOut {
            approver: approver.into(),
            retry_after: duration.as_secs(),
        }
    }
}

impl From<AuthError> for custody_crypto::CryptoError {
    fn from(err: AuthError) -> Self {
        use custody_crypto::CryptoError;
        match err {
            AuthError::InvalidCode => CryptoError::InvalidCode,
            AuthError::CodeReplayed => CryptoError::CodeReplayed,
            AuthError::ApproverLockedOut { .. } => CryptoError::Internal("approver locked out".into()),
            AuthError::SecretNotFound => CryptoError::Internal("no totp secret enrolled".into()),
            AuthError::Internal(reason) => CryptoError::Internal(reason),
        }
    }
}

impl From<AuthError> for custody_types::CustodyError {
    fn from(err: AuthError) -> Self {
        use custody_types::CustodyError;
        match err {
            AuthError::InvalidCode | AuthError::CodeReplayed | AuthError::SecretNotFound => {
                CustodyError::authn_failed(err.to_string())
            }
            AuthError::ApproverLockedOut { approver, retry_after } => {
                CustodyError::ApproverLockedOut { approver, remaining_secs: retry_after }
            }
            AuthError::Internal(reason) => CustodyError::internal(reason),
        }
    }
}

impl From<custody_db::DbError> for AuthError {
    fn from(err: custody_db::DbError) -> Self {
        Self::Internal(err.to_string())
    }
}
