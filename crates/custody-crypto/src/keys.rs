//! Ed25519 key pairs and public key references for the custody core

use crate::{strkey, CryptoError, CryptoResult};
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

/// A key pair for signing operations.
///
/// Only ever constructed inside the HSM boundary (`custody-crypto::hsm`);
/// nothing outside that module is allowed to call [`KeyPair::signing_key`].
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl KeyPair {
    /// Generate a new random key pair.
    pub fn generate() -> Self {
        let mut csprng = OsRng;
        let signing_key = SigningKey::generate(&mut csprng);
        let verifying_key = signing_key.verifying_key();
        Self { signing_key, verifying_key }
    }

    /// Derive deterministically from a 32-byte seed (the HSM's KDF output).
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let verifying_key = signing_key.verifying_key();
        Self { signing_key, verifying_key }
    }

    /// The signing key. Crate-private: private key material never leaves
    /// `custody-crypto`.
    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_bytes(self.verifying_key.to_bytes())
    }

    /// Raw signing key bytes, for secure backup only.
    #[cfg(feature = "export")]
    pub fn signing_key_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

/// A public key reference, safe to share outside the HSM boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey {
    bytes: [u8; 32],
}

impl PublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Stellar strkey `G...` address for this public key.
    pub fn to_stellar_address(&self) -> String {
        strkey::encode_public_key(&self.bytes)
    }

    pub fn to_verifying_key(&self) -> CryptoResult<VerifyingKey> {
        VerifyingKey::from_bytes(&self.bytes)
            .map_err(|e| CryptoError::InvalidKeyFormat(e.to_string()))
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_stellar_address())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_generation() {
        let keypair = KeyPair::generate();
        assert_eq!(keypair.public_key().as_bytes().len(), 32);
    }

    #[test]
    fn test_keypair_from_seed_deterministic() {
        let seed = [7u8; 32];
        let a = KeyPair::from_seed(&seed);
        let b = KeyPair::from_seed(&seed);
        assert_eq!(a.public_key(), b.public_key());
    }

    #[test]
    fn test_public_key_roundtrip() {
        let keypair = KeyPair::generate();
        let public = keypair.public_key();
        let verifying = public.to_verifying_key().unwrap();
        assert_eq!(verifying.to_bytes(), *public.as_bytes());
    }

    #[test]
    fn test_stellar_address_starts_with_g() {
        let keypair = KeyPair::generate();
        let address = keypair.public_key().to_stellar_address();
        assert!(address.starts_with('G'));
        assert_eq!(address.len(), 56);
    }
}
