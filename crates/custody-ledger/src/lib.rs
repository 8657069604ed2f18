//! Custody Ledger - the Ledger Submitter for the Stellar custody core
//!
//! Builds the unsigned ledger transaction from a payment intent, computes
//! its signing digest, accepts a signature produced elsewhere (by an
//! ephemeral key the HSM released for exactly this purpose), attaches it,
//! and submits with bounded retries. The submitter itself is stateless and
//! holds no key material.

pub mod client;
pub mod error;
pub mod submitter;
pub mod transaction;

pub use client::{FakeLedgerClient, LedgerClient, SubmitReceipt};
pub use error::{LedgerError, LedgerResult};
pub use submitter::{DigestSigner, LedgerSubmitter, SubmitRetryConfig};
pub use transaction::{AccountState, PaymentIntent, SignedTransaction, UnsignedTransaction};
