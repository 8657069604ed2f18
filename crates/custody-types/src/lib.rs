//! Custody Core Types - canonical domain types for the Stellar custody core
//!
//! This crate has zero dependencies on other custody crates. It defines the
//! identity, amount, and error types shared by every component described in
//! the custody CORE: the HSM Gateway, the Key Registry, the Ephemeral Key
//! Manager, the Approval Engine, and the Ledger Submitter.
//!
//! # Architectural invariants
//!
//! 1. Private key material never appears in any type in this crate — only
//!    identifiers and public keys cross component boundaries.
//! 2. Amounts are fixed-point integers in the ledger's minor unit (stroops)
//!    to avoid floating-point ambiguity in threshold comparisons.
//! 3. Every clock read goes through the [`Clock`] trait so expiry logic is
//!    deterministically testable.

pub mod amount;
pub mod clock;
pub mod error;
pub mod ids;
pub mod key_class;
pub mod state;
pub mod tier;

pub use amount::*;
pub use clock::*;
pub use error::*;
pub use ids::*;
pub use key_class::*;
pub use state::*;
pub use tier::*;

/// Version of the custody types schema
pub const TYPES_VERSION: &str = "0.1.0";
