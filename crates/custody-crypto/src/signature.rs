//! Ed25519 signatures over a 32-byte signing digest
//!
//! `sign(release-id, digest, key-id)` always signs a 32-byte digest (the
//! hash of the unsigned transaction, per the ledger's network passphrase —
//! see `custody-ledger`), never an arbitrary-length message. Keeping the
//! input fixed-size here is what makes `custody-crypto` unable to be
//! accidentally asked to sign attacker-controlled free-form bytes.

use crate::{CryptoError, CryptoResult, KeyPair, PublicKey};
use ed25519_dalek::{Signature as Ed25519Signature, Signer, Verifier};

/// A 64-byte Ed25519 signature over a signing digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    pub fn sign_digest(keypair: &KeyPair, digest: &[u8; 32]) -> Self {
        let sig: Ed25519Signature = keypair.signing_key().sign(digest);
        Self(sig.to_bytes())
    }

    pub fn verify_digest(&self, public_key: &PublicKey, digest: &[u8; 32]) -> CryptoResult<bool> {
        let verifying_key = public_key.to_verifying_key()?;
        let signature = Ed25519Signature::from_bytes(&self.0);
        match verifying_key.verify(digest, &signature) {
            Ok(()) => Ok(true),
            Err(_) => Ok(false),
        }
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        let decoded = hex::decode(s).map_err(|e| CryptoError::InvalidKeyFormat(e.to_string()))?;
        if decoded.len() != 64 {
            return Err(CryptoError::InvalidKeyFormat(
                "signature must be 64 bytes".to_string(),
            ));
        }
        let mut bytes = [0u8; 64];
        bytes.copy_from_slice(&decoded);
        Ok(Self(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sha256;

    #[test]
    fn test_sign_and_verify() {
        let keypair = KeyPair::generate();
        let digest = sha256(b"digest over unsigned transaction bytes");

        let signature = Signature::sign_digest(&keypair, &digest);
        assert!(signature.verify_digest(&keypair.public_key(), &digest).unwrap());
    }

    #[test]
    fn test_wrong_digest_fails() {
        let keypair = KeyPair::generate();
        let digest = sha256(b"correct");
        let wrong_digest = sha256(b"tampered");

        let signature = Signature::sign_digest(&keypair, &digest);
        assert!(!signature.verify_digest(&keypair.public_key(), &wrong_digest).unwrap());
    }

    #[test]
    fn test_wrong_key_fails() {
        let keypair1 = KeyPair::generate();
        let keypair2 = KeyPair::generate();
        let digest = sha256(b"payload");

        let signature = Signature::sign_digest(&keypair1, &digest);
        assert!(!signature.verify_digest(&keypair2.public_key(), &digest).unwrap());
    }

    #[test]
    fn test_hex_roundtrip() {
        let keypair = KeyPair::generate();
        let digest = sha256(b"payload");
        let signature = Signature::sign_digest(&keypair, &digest);

        let hex = signature.to_hex();
        let parsed = Signature::from_hex(&hex).unwrap();
        assert_eq!(signature, parsed);
    }
}
