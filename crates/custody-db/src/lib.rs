//! Custody DB - persistence for the Stellar custody core
//!
//! Every component above this crate (the Key Registry, the Ephemeral Key
//! Manager, the Approval Engine) stores its records as JSON blobs under a
//! namespaced key, through the [`CustodyStore`] trait. [`InMemoryStore`] is
//! the default, used in tests and single-process deployments; the
//! `postgres` feature adds [`PgStore`], backed by a single key/value table so
//! every caller's uniqueness and compare-and-swap semantics stay identical
//! across both implementations.

pub mod config;
pub mod error;
#[cfg(feature = "postgres")]
pub mod pg;

pub use config::DatabaseConfig;
pub use error::{DbError, DbResult};
#[cfg(feature = "postgres")]
pub use pg::PgStore;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Key namespaces, mirroring how each component names its records.
pub mod keys {
    pub const PARTITION: &str = "partition:";
    pub const WALLET: &str = "wallet:";
    /// `key_index:{hot-key-id}:{n}` -> key-id, enforcing one ephemeral child per index.
    pub const KEY_INDEX: &str = "key_index:";
    pub const EPHEMERAL_KEY: &str = "ephemeral_key:";
    pub const INTENT: &str = "intent:";
    pub const APPROVAL: &str = "approval:";
    /// `approval_claim:{intent-id}:{approver-id}`, enforcing at most one approval per approver.
    pub const APPROVAL_CLAIM: &str = "approval_claim:";
    pub const CHALLENGE: &str = "challenge:";
    /// `used_response:{challenge-id}:{response}`, the anti-replay set shared
    /// by approval challenge responses and HSM release codes.
    pub const USED_RESPONSE: &str = "used_response:";
    /// Role binding and active/inactive flag for one of the three fixed approvers.
    pub const APPROVER_ROSTER: &str = "approver_roster:";
}

/// A namespaced, versioned key/value store with the primitives every
/// component needs to honor its uniqueness and idempotency invariants
/// without each one re-inventing locking.
#[async_trait]
pub trait CustodyStore: Send + Sync {
    async fn put(&self, key: &str, value: Vec<u8>) -> DbResult<()>;

    async fn get(&self, key: &str) -> DbResult<Option<Vec<u8>>>;

    async fn delete(&self, key: &str) -> DbResult<()>;

    /// All entries whose key starts with `prefix`, for range scans such as
    /// "ephemeral keys expiring before T".
    async fn scan_prefix(&self, prefix: &str) -> DbResult<Vec<(String, Vec<u8>)>>;

    /// Atomically replace `key`'s value with `new_value` iff its current
    /// value equals `expected` (`None` means "must not exist yet").
    /// Returns `false` on a mismatch instead of erroring, so callers can
    /// retry or surface `concurrency-conflict` as they see fit.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new_value: Vec<u8>,
    ) -> DbResult<bool>;

    /// Claim a uniqueness key exactly once. Returns `false` if it was
    /// already claimed - the mechanism behind "exactly one hot child of
    /// cold", "one approval per approver per intent", and ephemeral-key
    /// one-time-use.
    async fn claim_unique(&self, key: &str) -> DbResult<bool>;
}

/// Convenience JSON (de)serialization on top of [`CustodyStore`]. A separate
/// trait because its generic methods would make `CustodyStore` itself
/// non-object-safe.
#[async_trait]
pub trait CustodyStoreExt: CustodyStore {
    async fn put_json<T: serde::Serialize + Sync>(&self, key: &str, value: &T) -> DbResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.put(key, bytes).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> DbResult<Option<T>> {
        match self.get(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl<T: CustodyStore + ?Sized> CustodyStoreExt for T {}

/// An in-process store backed by a single mutex-guarded map. The default
/// for tests and for single-node deployments that don't need a separate
/// database.
#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CustodyStore for InMemoryStore {
    async fn put(&self, key: &str, value: Vec<u8>) -> DbResult<()> {
        self.entries.write().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> DbResult<Option<Vec<u8>>> {
        Ok(self.entries.read().unwrap().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> DbResult<()> {
        self.entries.write().unwrap().remove(key);
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> DbResult<Vec<(String, Vec<u8>)>> {
        let entries = self.entries.read().unwrap();
        Ok(entries
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new_value: Vec<u8>,
    ) -> DbResult<bool> {
        let mut entries = self.entries.write().unwrap();
        let current = entries.get(key).map(|v| v.as_slice());
        if current != expected {
            return Ok(false);
        }
        entries.insert(key.to_string(), new_value);
        Ok(true)
    }

    async fn claim_unique(&self, key: &str) -> DbResult<bool> {
        let mut entries = self.entries.write().unwrap();
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), Vec::new());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_roundtrip() {
        let store = InMemoryStore::new();
        store.put("a", b"1".to_vec()).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(b"1".to_vec()));
    }

    #[tokio::test]
    async fn claim_unique_rejects_second_claim() {
        let store = InMemoryStore::new();
        assert!(store.claim_unique("k").await.unwrap());
        assert!(!store.claim_unique("k").await.unwrap());
    }

    #[tokio::test]
    async fn compare_and_swap_detects_conflict() {
        let store = InMemoryStore::new();
        store.put("k", b"v1".to_vec()).await.unwrap();
        assert!(!store
            .compare_and_swap("k", Some(b"wrong"), b"v2".to_vec())
            .await
            .unwrap());
        assert!(store
            .compare_and_swap("k", Some(b"v1"), b"v2".to_vec())
            .await
            .unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some(b"v2".to_vec()));
    }

    #[tokio::test]
    async fn scan_prefix_filters() {
        let store = InMemoryStore::new();
        store.put("intent:1", b"a".to_vec()).await.unwrap();
        store.put("intent:2", b"b".to_vec()).await.unwrap();
        store.put("wallet:1", b"c".to_vec()).await.unwrap();
        let results = store.scan_prefix("intent:").await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn json_roundtrip() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Rec { n: u32 }

        let store = InMemoryStore::new();
        store.put_json("r", &Rec { n: 7 }).await.unwrap();
        let got: Option<Rec> = store.get_json("r").await.unwrap();
        assert_eq!(got, Some(Rec { n: 7 }));
    }
}
