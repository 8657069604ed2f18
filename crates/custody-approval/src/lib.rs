//! Custody Approval - the Approval Engine for the Stellar custody core
//!
//! Owns tier selection, challenge issuance, approval validation against the
//! TOTP authenticator and the HSM release, the atomic threshold state
//! machine, and the execution handoff to the Ledger Submitter.

pub mod audit;
pub mod challenge;
pub mod config;
pub mod engine;
pub mod error;
pub mod tier_policy;
pub mod types;

pub use config::ApprovalConfig;
pub use engine::{ApprovalEngine, ApprovalOutcome};
pub use error::{ApprovalError, ApprovalResult};
pub use tier_policy::select_tier;
pub use types::{ApprovalRecord, AuthenticatorMethod, ChallengeRecord, IntentRecord, WalletRecord};
