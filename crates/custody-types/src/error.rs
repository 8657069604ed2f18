//! Error kinds for the custody core
//!
//! Every error surfaced across a component boundary is tagged with one of
//! the kinds below. Only `input-invalid` is ever shown to an external caller
//! verbatim; everything else is normalized to [`CustodyError::error_code`]
//! while the full reason is logged via `tracing`.

use thiserror::Error;

/// Result type for custody core operations.
pub type Result<T> = std::result::Result<T, CustodyError>;

/// The custody core's unified error type.
#[derive(Debug, Clone, Error)]
pub enum CustodyError {
    // ------------------------------------------------------------------
    // input-invalid
    // ------------------------------------------------------------------
    #[error("invalid input: {field} - {reason}")]
    InputInvalid { field: String, reason: String },

    // ------------------------------------------------------------------
    // policy-denied
    // ------------------------------------------------------------------
    #[error("policy denied: {reason}")]
    PolicyDenied { reason: String },

    // ------------------------------------------------------------------
    // authn-failed
    // ------------------------------------------------------------------
    #[error("authentication failed: {reason}")]
    AuthnFailed { reason: String },

    #[error("approver {approver} locked out for {remaining_secs}s after repeated failures")]
    ApproverLockedOut { approver: String, remaining_secs: u64 },

    // ------------------------------------------------------------------
    // hsm-denied / hsm-unavailable
    // ------------------------------------------------------------------
    #[error("HSM denied the operation: {reason}")]
    HsmDenied { reason: String },

    #[error("HSM unavailable: {reason}")]
    HsmUnavailable { reason: String },

    // ------------------------------------------------------------------
    // ledger-transient / ledger-permanent
    // ------------------------------------------------------------------
    #[error("ledger transient error: {reason}")]
    LedgerTransient { reason: String },

    #[error("ledger permanent error: {reason}")]
    LedgerPermanent { reason: String },

    // ------------------------------------------------------------------
    // concurrency-conflict
    // ------------------------------------------------------------------
    #[error("concurrency conflict, retry: {reason}")]
    ConcurrencyConflict { reason: String },

    // ------------------------------------------------------------------
    // amount / arithmetic
    // ------------------------------------------------------------------
    #[error("amount overflow")]
    AmountOverflow,

    #[error("amount underflow")]
    AmountUnderflow,

    // ------------------------------------------------------------------
    // not found / state
    // ------------------------------------------------------------------
    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("invalid state transition: {reason}")]
    InvalidState { reason: String },

    // ------------------------------------------------------------------
    // reconciliation / unknown outcome
    // ------------------------------------------------------------------
    #[error("operation outcome unknown, reconciliation required: {reason}")]
    FailedUnknown { reason: String },

    // ------------------------------------------------------------------
    // capacity
    // ------------------------------------------------------------------
    #[error("busy: {reason}")]
    Busy { reason: String },

    // ------------------------------------------------------------------
    // internal
    // ------------------------------------------------------------------
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl CustodyError {
    pub fn input_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InputInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn policy_denied(reason: impl Into<String>) -> Self {
        Self::PolicyDenied { reason: reason.into() }
    }

    pub fn authn_failed(reason: impl Into<String>) -> Self {
        Self::AuthnFailed { reason: reason.into() }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Whether a caller above this layer should retry once
    /// (`concurrency-conflict`) or with backoff (`hsm-unavailable`,
    /// `ledger-transient`).
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::ConcurrencyConflict { .. } | Self::HsmUnavailable { .. } | Self::LedgerTransient { .. }
        )
    }

    /// Opaque error code for external consumers; only `InputInvalid` carries
    /// its reason verbatim outside this process.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InputInvalid { .. } => "INPUT_INVALID",
            Self::PolicyDenied { .. } => "POLICY_DENIED",
            Self::AuthnFailed { .. } => "AUTHN_FAILED",
            Self::ApproverLockedOut { .. } => "APPROVER_LOCKED_OUT",
            Self::HsmDenied { .. } => "HSM_DENIED",
            Self::HsmUnavailable { .. } => "HSM_UNAVAILABLE",
            Self::LedgerTransient { .. } => "LEDGER_TRANSIENT",
            Self::LedgerPermanent { .. } => "LEDGER_PERMANENT",
            Self::ConcurrencyConflict { .. } => "CONCURRENCY_CONFLICT",
            Self::AmountOverflow => "AMOUNT_OVERFLOW",
            Self::AmountUnderflow => "AMOUNT_UNDERFLOW",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::FailedUnknown { .. } => "FAILED_UNKNOWN",
            Self::Busy { .. } => "BUSY",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retriable_kinds() {
        assert!(CustodyError::ConcurrencyConflict { reason: "x".into() }.is_retriable());
        assert!(CustodyError::HsmUnavailable { reason: "x".into() }.is_retriable());
        assert!(!CustodyError::PolicyDenied { reason: "x".into() }.is_retriable());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(CustodyError::input_invalid("a", "b").error_code(), "INPUT_INVALID");
        assert_eq!(CustodyError::Busy { reason: "x".into() }.error_code(), "BUSY");
    }
}
