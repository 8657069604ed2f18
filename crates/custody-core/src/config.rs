//! Custody Core configuration: every field the core recognizes, grouped
//! by the component that consumes it, with a single `Default` impl using
//! sensible defaults. Never environment-coupled here - only `custody-cli`'s
//! own setup reads environment variables.

use custody_auth::AuthConfig;
use custody_db::DatabaseConfig;
use serde::{Deserialize, Serialize};

pub use custody_approval::ApprovalConfig;

/// Composes every component's configuration into the one structure a
/// deployment constructs and hands to [`crate::CustodyService::new`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustodyConfig {
    /// Tier thresholds, TTLs, timeouts, backpressure cap, network passphrase.
    pub approval: ApprovalConfig,
    /// TOTP parameters and lockout policy for the approver authenticator.
    pub auth: AuthConfig,
    /// Connection settings for the `postgres`-feature store; unused against
    /// the default `InMemoryStore`.
    pub database: DatabaseConfig,
}

impl Default for CustodyConfig {
    fn default() -> Self {
        Self { approval: ApprovalConfig::default(), auth: AuthConfig::default(), database: DatabaseConfig::default() }
    }
}
