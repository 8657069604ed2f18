//! Key tree shape: classes and derivation paths
//!
//! The custody core roots a deterministic Ed25519 key tree inside the HSM:
//!
//! ```text
//! master (m)
//!   └── cold   (m/0')
//!         └── hot   (m/0'/0')
//!               └── ephemeral[N]  (m/0'/0'/N')
//! ```
//!
//! All indices are hardened (the trailing `'`), matching BIP32 practice for
//! keys that must never be derivable from a public key alone.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The class of a Key known to the HSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyClass {
    /// The single per-partition root, `m`.
    Master,
    /// The single cold wallet key, `m/0'`. Every outflow requires CRITICAL tier.
    Cold,
    /// The single hot wallet key, `m/0'/0'`. Source of all ephemeral children.
    Hot,
    /// A leaf, one-time-use signing key, `m/0'/0'/N'`.
    Ephemeral,
}

impl fmt::Display for KeyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Master => write!(f, "master"),
            Self::Cold => write!(f, "cold"),
            Self::Hot => write!(f, "hot"),
            Self::Ephemeral => write!(f, "ephemeral"),
        }
    }
}

/// A derivation path relative to the partition root, e.g. `m/0'/0'/42'`.
///
/// Stored as the list of hardened indices (the cold/hot legs are fixed `0`);
/// only the ephemeral leg's index varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DerivationPath {
    segments: [Option<u32>; 3],
}

impl DerivationPath {
    pub const fn master() -> Self {
        Self { segments: [None, None, None] }
    }

    pub const fn cold() -> Self {
        Self { segments: [Some(0), None, None] }
    }

    pub const fn hot() -> Self {
        Self { segments: [Some(0), Some(0), None] }
    }

    pub const fn ephemeral(index: u32) -> Self {
        Self { segments: [Some(0), Some(0), Some(index)] }
    }

    /// The ephemeral index this path names, if it is an ephemeral path.
    pub fn ephemeral_index(&self) -> Option<u32> {
        self.segments[2]
    }

    /// The class of key this path denotes.
    pub fn class(&self) -> KeyClass {
        match (self.segments[0], self.segments[1], self.segments[2]) {
            (None, None, None) => KeyClass::Master,
            (Some(_), None, None) => KeyClass::Cold,
            (Some(_), Some(_), None) => KeyClass::Hot,
            (Some(_), Some(_), Some(_)) => KeyClass::Ephemeral,
        }
    }

    /// The path suffix relative to its parent, as passed to the HSM's
    /// `derive-key`/`preview-public-key` operations.
    pub fn suffix_for_parent(&self) -> String {
        match self.class() {
            KeyClass::Master => String::new(),
            KeyClass::Cold => format!("{}'", self.segments[0].unwrap()),
            KeyClass::Hot => format!("{}'", self.segments[1].unwrap()),
            KeyClass::Ephemeral => format!("{}'", self.segments[2].unwrap()),
        }
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for seg in self.segments.iter().flatten() {
            write!(f, "/{}'", seg)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_display() {
        assert_eq!(DerivationPath::master().to_string(), "m");
        assert_eq!(DerivationPath::cold().to_string(), "m/0'");
        assert_eq!(DerivationPath::hot().to_string(), "m/0'/0'");
        assert_eq!(DerivationPath::ephemeral(42).to_string(), "m/0'/0'/42'");
    }

    #[test]
    fn test_path_class() {
        assert_eq!(DerivationPath::master().class(), KeyClass::Master);
        assert_eq!(DerivationPath::cold().class(), KeyClass::Cold);
        assert_eq!(DerivationPath::hot().class(), KeyClass::Hot);
        assert_eq!(DerivationPath::ephemeral(0).class(), KeyClass::Ephemeral);
    }

    #[test]
    fn test_ephemeral_index() {
        let path = DerivationPath::ephemeral(42);
        assert_eq!(path.ephemeral_index(), Some(42));
        assert_eq!(DerivationPath::hot().ephemeral_index(), None);
    }

    #[test]
    fn test_suffix_for_parent() {
        assert_eq!(DerivationPath::cold().suffix_for_parent(), "0'");
        assert_eq!(DerivationPath::hot().suffix_for_parent(), "0'");
        assert_eq!(DerivationPath::ephemeral(42).suffix_for_parent(), "42'");
    }
}
