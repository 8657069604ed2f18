//! Custody Crypto - the HSM boundary and signing primitives for the Stellar custody core
//!
//! This crate provides:
//! - Ed25519 key pairs and public keys (`keys`)
//! - Fixed-digest signing and verification (`signature`)
//! - Hashing utilities (`hash`)
//! - Hardened-only BIP32-like key derivation (`derivation`)
//! - Stellar strkey address encoding (`strkey`)
//! - The HSM Gateway trait and its in-process reference implementation (`hsm`)
//!
//! # Security Invariant
//!
//! **Private key material never leaves this crate.** Every layer above only
//! ever handles key-ids, public keys, release-ids and signatures.

pub mod derivation;
pub mod hash;
pub mod hsm;
pub mod keys;
pub mod signature;
pub mod strkey;

pub use hash::*;
pub use hsm::*;
pub use keys::*;
pub use signature::*;

use thiserror::Error;

/// Cryptographic and HSM Gateway errors.
#[derive(Debug, Error, Clone)]
pub enum CryptoError {
    #[error("key generation failed: {0}")]
    KeyGenerationFailed(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("verification failed: {0}")]
    VerificationFailed(String),

    #[error("invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("derivation path malformed: {0}")]
    PathMalformed(String),

    #[error("parent key not found")]
    ParentNotFound,

    #[error("key not found or destroyed")]
    UnknownKey,

    #[error("key has been destroyed")]
    KeyDestroyed,

    #[error("key derivation version mismatch")]
    VersionMismatch,

    #[error("ephemeral key already used")]
    EphemeralKeyUsed,

    #[error("one-time code invalid")]
    InvalidCode,

    #[error("one-time code already consumed")]
    CodeReplayed,

    #[error("release expired, consumed, or unknown")]
    ReleaseExpired,

    #[error("release does not authorize this key")]
    ReleaseWrongKey,

    #[error("HSM unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;

impl From<CryptoError> for custody_types::CustodyError {
    fn from(err: CryptoError) -> Self {
        use custody_types::CustodyError;
        match err {
            CryptoError::KeyGenerationFailed(reason) => CustodyError::HsmDenied { reason },
            CryptoError::SigningFailed(reason) => CustodyError::HsmDenied { reason },
            CryptoError::VerificationFailed(reason) => CustodyError::HsmDenied { reason },
            CryptoError::InvalidKeyFormat(reason) => CustodyError::input_invalid("public_key", reason),
            CryptoError::PathMalformed(reason) => CustodyError::input_invalid("path_suffix", reason),
            CryptoError::ParentNotFound => CustodyError::not_found("parent key"),
            CryptoError::UnknownKey => CustodyError::not_found("key"),
            CryptoError::KeyDestroyed => CustodyError::HsmDenied { reason: "key destroyed".into() },
            CryptoError::VersionMismatch => {
                CustodyError::HsmDenied { reason: "key derivation version mismatch".into() }
            }
            CryptoError::EphemeralKeyUsed => {
                CustodyError::HsmDenied { reason: "ephemeral key already used".into() }
            }
            CryptoError::InvalidCode => CustodyError::authn_failed("invalid one-time code"),
            CryptoError::CodeReplayed => CustodyError::authn_failed("one-time code already used"),
            CryptoError::ReleaseExpired => {
                CustodyError::HsmDenied { reason: "release expired, consumed, or unknown".into() }
            }
            CryptoError::ReleaseWrongKey => {
                CustodyError::HsmDenied { reason: "release does not authorize this key".into() }
            }
            CryptoError::Unavailable(reason) => CustodyError::HsmUnavailable { reason },
            CryptoError::Internal(message) => CustodyError::internal(message),
        }
    }
}
