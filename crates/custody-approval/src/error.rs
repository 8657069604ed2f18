//! Approval Engine error types

use thiserror::Error;

pub type ApprovalResult<T> = Result<T, ApprovalError>;

#[derive(Debug, Error, Clone)]
pub enum ApprovalError {
    #[error("invalid input: {field} - {reason}")]
    InputInvalid { field: String, reason: String },

    #[error("policy denied: {reason}")]
    PolicyDenied { reason: String },

    #[error("authentication failed: {reason}")]
    AuthnFailed { reason: String },

    #[error("no such intent: {0}")]
    IntentNotFound(String),

    #[error("no such wallet: {0}")]
    WalletNotFound(String),

    #[error("no active challenge for this intent")]
    NoActiveChallenge,

    #[error("challenge expired")]
    ChallengeExpired,

    #[error("approver already has a valid approval on this intent")]
    AlreadyApproved,

    #[error("response already used, replay rejected")]
    ResponseReplayed,

    #[error("intent is not awaiting approval (state: {state})")]
    NotAwaitingApproval { state: String },

    #[error("tenant has too many in-flight intents")]
    Busy,

    #[error("HSM denied the operation: {0}")]
    HsmDenied(String),

    #[error("ledger transient error: {0}")]
    LedgerTransient(String),

    #[error("ledger permanent error: {0}")]
    LedgerPermanent(String),

    #[error("operation outcome unknown, reconciliation required: {0}")]
    FailedUnknown(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ApprovalError> for custody_types::CustodyError {
    fn from(err: ApprovalError) -> Self {
        use custody_types::CustodyError;
        match err {
            ApprovalError::InputInvalid { field, reason } => CustodyError::input_invalid(field, reason),
            ApprovalError::PolicyDenied { reason } => CustodyError::policy_denied(reason),
            ApprovalError::AuthnFailed { reason } => CustodyError::authn_failed(reason),
            ApprovalError::IntentNotFound(what) | ApprovalError::WalletNotFound(what) => {
                CustodyError::not_found(what)
            }
            ApprovalError::NoActiveChallenge | ApprovalError::ChallengeExpired => {
                CustodyError::authn_failed(err.to_string())
            }
            ApprovalError::AlreadyApproved => CustodyError::policy_denied(err.to_string()),
            ApprovalError::ResponseReplayed => CustodyError::authn_failed("replayed-response"),
            ApprovalError::NotAwaitingApproval { state } => CustodyError::InvalidState { reason: state },
            ApprovalError::Busy => CustodyError::Busy { reason: "too many in-flight intents".to_string() },
            ApprovalError::HsmDenied(reason) => CustodyError::HsmDenied { reason },
            ApprovalError::LedgerTransient(reason) => CustodyError::LedgerTransient { reason },
            ApprovalError::LedgerPermanent(reason) => CustodyError::LedgerPermanent { reason },
            ApprovalError::FailedUnknown(reason) => CustodyError::FailedUnknown { reason },
            ApprovalError::Internal(message) => CustodyError::internal(message),
        }
    }
}

impl From<custody_db::DbError> for ApprovalError {
    fn from(err: custody_db::DbError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<custody_auth::AuthError> for ApprovalError {
    fn from(err: custody_auth::AuthError) -> Self {
        use custody_auth::AuthError;
        match err {
            AuthError::InvalidCode | AuthError::CodeReplayed | AuthError::SecretNotFound => {
                Self::AuthnFailed { reason: err.to_string() }
            }
            AuthError::ApproverLockedOut { approver, retry_after } => Self::AuthnFailed {
                reason: format!("approver {approver} locked out for {retry_after}s"),
            },
            AuthError::Internal(reason) => Self::Internal(reason),
        }
    }
}

impl From<custody_types::CustodyError> for ApprovalError {
    fn from(err: custody_types::CustodyError) -> Self {
        use custody_types::CustodyError;
        match err {
            CustodyError::InputInvalid { field, reason } => Self::InputInvalid { field, reason },
            CustodyError::PolicyDenied { reason } => Self::PolicyDenied { reason },
            CustodyError::AuthnFailed { reason } => Self::AuthnFailed { reason },
            CustodyError::ApproverLockedOut { approver, remaining_secs } => {
                Self::AuthnFailed { reason: format!("approver {approver} locked out for {remaining_secs}s") }
            }
            CustodyError::HsmDenied { reason } | CustodyError::HsmUnavailable { reason } => Self::HsmDenied(reason),
            CustodyError::LedgerTransient { reason } => Self::LedgerTransient(reason),
            CustodyError::LedgerPermanent { reason } => Self::LedgerPermanent(reason),
            CustodyError::ConcurrencyConflict { reason } => Self::Internal(reason),
            CustodyError::NotFound { what } => Self::IntentNotFound(what),
            CustodyError::InvalidState { reason } => Self::NotAwaitingApproval { state: reason },
            CustodyError::FailedUnknown { reason } => Self::FailedUnknown(reason),
            CustodyError::Busy { .. } => Self::Busy,
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<custody_ledger::LedgerError> for ApprovalError {
    fn from(err: custody_ledger::LedgerError) -> Self {
        if err.is_transient() {
            Self::LedgerTransient(err.to_string())
        } else {
            Self::LedgerPermanent(err.to_string())
        }
    }
}
