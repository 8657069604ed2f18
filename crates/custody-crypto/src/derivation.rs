//! Deterministic key derivation
//!
//! "The KDF used for derivation (HMAC over parent-seed and path-suffix
//! string) must be stable across restarts and versions; changing it breaks
//! address-prediction. Version the derivation function and refuse to sign
//! for keys whose version does not match the current one."
//!
//! This is a reference, BIP32-like hardened-only derivation: each child seed
//! is `HMAC-SHA256(parent_seed, path_suffix_string)`. It is deterministic
//! (same parent + suffix always yields the same child seed and therefore the
//! same key pair and public key), and it never needs the parent's public
//! key, so it only ever produces hardened children.

use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Current derivation function version. Bump this if the KDF ever changes;
/// keys derived under an older version must refuse to sign (see
/// `hsm::FakeHsm::sign`).
pub const DERIVATION_VERSION: u32 = 1;

type HmacSha256 = Hmac<Sha256>;

/// Derive a child seed from a parent seed and a path suffix string (e.g.
/// `"0'"` or `"42'"`).
pub fn derive_child_seed(parent_seed: &[u8; 32], path_suffix: &str) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(parent_seed).expect("HMAC accepts any key length");
    mac.update(path_suffix.as_bytes());
    let result = mac.finalize().into_bytes();

    let mut seed = [0u8; 32];
    seed.copy_from_slice(&result);
    seed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let parent = [1u8; 32];
        let a = derive_child_seed(&parent, "0'");
        let b = derive_child_seed(&parent, "0'");
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_suffixes_diverge() {
        let parent = [1u8; 32];
        let a = derive_child_seed(&parent, "0'");
        let b = derive_child_seed(&parent, "1'");
        assert_ne!(a, b);
    }

    #[test]
    fn test_distinct_parents_diverge() {
        let a = derive_child_seed(&[1u8; 32], "0'");
        let b = derive_child_seed(&[2u8; 32], "0'");
        assert_ne!(a, b);
    }
}
