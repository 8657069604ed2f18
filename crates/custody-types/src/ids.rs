//! Identity types for the custody core
//!
//! All identity types are strongly typed wrappers around UUIDs to prevent
//! accidental mixing of different ID types across component boundaries.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Macro to generate ID types with common implementations
macro_rules! define_id_type {
    ($name:ident, $prefix:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parse from a string (with or without prefix)
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                let s = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(s)?))
            }

            /// Get the inner UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Convert to prefixed string
            pub fn to_prefixed_string(&self) -> String {
                format!("{}_{}", $prefix, self.0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

// Custody-tenant / HSM identity types
define_id_type!(PartitionId, "partition", "HSM-internal isolation unit; one per custody tenant");
define_id_type!(KeyId, "key", "Identifier for a Key known to the HSM (master, cold, hot, ephemeral)");
define_id_type!(ReleaseId, "release", "Short-lived token authorizing exactly one `sign` call");

// Wallet / approver identity types
define_id_type!(WalletId, "wallet", "Logical binding between a tenant, a Key, and its tier policy");
define_id_type!(ApproverId, "approver", "One of the three fixed human approvers (CEO, CFO, CTO)");

// Payment workflow identity types
define_id_type!(IntentId, "intent", "Unique identifier for a TransactionIntent");
define_id_type!(ApprovalId, "approval", "Unique identifier for one approver's endorsement of an intent");
define_id_type!(ChallengeId, "challenge", "Unique identifier for an intent-bound challenge");
define_id_type!(EphemeralKeyId, "ephkey", "Unique identifier for an EphemeralKey lifecycle record");

/// The three fixed approver roles named in the custody core's scope.
///
/// Exactly one [`ApproverId`] is bound to each role per tenant; the set never
/// grows or shrinks (Non-goal: "general-purpose wallet management").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApproverRole {
    Ceo,
    Cfo,
    Cto,
}

impl fmt::Display for ApproverRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ceo => write!(f, "CEO"),
            Self::Cfo => write!(f, "CFO"),
            Self::Cto => write!(f, "CTO"),
        }
    }
}
