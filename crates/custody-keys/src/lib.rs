//! Custody Keys - Key Registry and Ephemeral Key Manager for the Stellar
//! custody core.
//!
//! The registry holds the public facts about every Key the HSM knows about;
//! the manager allocates, signs with, and destroys the fresh one-time
//! ephemeral keys that source every outgoing payment.

pub mod ephemeral;
pub mod registry;

pub use ephemeral::{EphemeralKeyManager, EphemeralKeyRecord, NextAddress};
pub use registry::{KeyRecord, KeyRegistry};
