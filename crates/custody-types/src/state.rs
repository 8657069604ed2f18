//! State machine enums for the core's data model and its transitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a `TransactionIntent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntentState {
    Pending,
    AwaitingApproval,
    Approved,
    Executing,
    Success,
    Failed,
    Cancelled,
}

impl IntentState {
    /// Terminal states never transition further: `success`, `failed`,
    /// `cancelled`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for IntentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::AwaitingApproval => "awaiting_approval",
            Self::Approved => "approved",
            Self::Executing => "executing",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle state of an `EphemeralKey` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EphemeralKeyState {
    Allocated,
    Armed,
    Used,
    Destroyed,
    Expired,
}

impl EphemeralKeyState {
    /// Signing is permitted only in `armed`; the reference implementation
    /// folds `arm` into `sign-for-intent`, so `allocated` is also accepted
    /// as the pre-arm state.
    pub fn signable(self) -> bool {
        matches!(self, Self::Allocated | Self::Armed)
    }

    /// After `destroyed` or `expired`, no signing is ever possible again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Destroyed | Self::Expired)
    }
}

impl fmt::Display for EphemeralKeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Allocated => "allocated",
            Self::Armed => "armed",
            Self::Used => "used",
            Self::Destroyed => "destroyed",
            Self::Expired => "expired",
        };
        write!(f, "{s}")
    }
}
