//! Key Registry: the public facts about every Key known to the HSM.
//!
//! Append-only except for the lifecycle transitions an [`crate::ephemeral`]
//! manager drives on `EphemeralKey` records. Backed by
//! [`custody_db::CustodyStore`] rather than a typed table, matching the rest
//! of this core's persistence boundary.

use custody_db::{keys, CustodyStore, CustodyStoreExt, DbResult};
use custody_types::{DerivationPath, KeyClass, KeyId, PartitionId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The registry's record of one Key's public facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyRecord {
    pub key_id: KeyId,
    pub parent_key_id: Option<KeyId>,
    pub path: DerivationPath,
    pub class: KeyClass,
    pub partition: PartitionId,
    pub public_key_bytes: [u8; 32],
    pub created_at_millis: i64,
    pub revoked: bool,
}

/// Read/write access to the Key Registry's public records, keyed by hot
/// wallet for the index uniqueness that backs ephemeral address rotation.
pub struct KeyRegistry {
    store: Arc<dyn CustodyStore>,
}

impl KeyRegistry {
    pub fn new(store: Arc<dyn CustodyStore>) -> Self {
        Self { store }
    }

    pub async fn put(&self, record: &KeyRecord) -> DbResult<()> {
        self.store.put_json(&key_entry(record.key_id), record).await
    }

    pub async fn get(&self, key_id: KeyId) -> DbResult<Option<KeyRecord>> {
        self.store.get_json(&key_entry(key_id)).await
    }

    pub async fn revoke(&self, key_id: KeyId) -> DbResult<()> {
        if let Some(mut record) = self.get(key_id).await? {
            record.revoked = true;
            self.put(&record).await?;
        }
        Ok(())
    }

    /// Highest ephemeral index already allocated under `hot_key_id`, or
    /// `None` if this hot wallet has no ephemeral children yet.
    pub async fn max_ephemeral_index(&self, hot_key_id: KeyId) -> DbResult<Option<u32>> {
        let prefix = index_prefix(hot_key_id);
        let entries = self.store.scan_prefix(&prefix).await?;
        Ok(entries
            .iter()
            .filter_map(|(k, _)| k.rsplit(':').next().and_then(|n| n.parse::<u32>().ok()))
            .max())
    }

    /// Reserve `index` as the next ephemeral child of `hot_key_id`. Returns
    /// `false` if another caller already reserved it - next-index per hot
    /// wallet is serialized.
    pub async fn claim_index(&self, hot_key_id: KeyId, index: u32) -> DbResult<bool> {
        let claim_key = format!("{}{}", index_prefix(hot_key_id), index);
        self.store.claim_unique(&claim_key).await
    }

    /// Undo a claim made by `claim_index`, when a later step in allocation
    /// fails - the index must not be consumed if the key backing it was
    /// never actually derived.
    pub async fn release_index(&self, hot_key_id: KeyId, index: u32) -> DbResult<()> {
        let claim_key = format!("{}{}", index_prefix(hot_key_id), index);
        self.store.delete(&claim_key).await
    }
}

const KEY_RECORD_PREFIX: &str = "key_record:";

fn key_entry(key_id: KeyId) -> String {
    format!("{KEY_RECORD_PREFIX}{key_id}")
}

fn index_prefix(hot_key_id: KeyId) -> String {
    format!("{}{}:", keys::KEY_INDEX, hot_key_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use custody_db::InMemoryStore;

    fn record(key_id: KeyId, parent: KeyId, path: DerivationPath) -> KeyRecord {
        KeyRecord {
            key_id,
            parent_key_id: Some(parent),
            path,
            class: path.class(),
            partition: PartitionId::new(),
            public_key_bytes: [0u8; 32],
            created_at_millis: 0,
            revoked: false,
        }
    }

    #[tokio::test]
    async fn put_get_roundtrip() {
        let registry = KeyRegistry::new(Arc::new(InMemoryStore::new()));
        let key_id = KeyId::new();
        let rec = record(key_id, KeyId::new(), DerivationPath::hot());
        registry.put(&rec).await.unwrap();
        let got = registry.get(key_id).await.unwrap().unwrap();
        assert_eq!(got.key_id, key_id);
    }

    #[tokio::test]
    async fn claim_index_is_exclusive() {
        let registry = KeyRegistry::new(Arc::new(InMemoryStore::new()));
        let hot = KeyId::new();
        assert!(registry.claim_index(hot, 0).await.unwrap());
        assert!(!registry.claim_index(hot, 0).await.unwrap());
        assert!(registry.claim_index(hot, 1).await.unwrap());
    }

    #[tokio::test]
    async fn max_ephemeral_index_tracks_claims() {
        let registry = KeyRegistry::new(Arc::new(InMemoryStore::new()));
        let hot = KeyId::new();
        assert_eq!(registry.max_ephemeral_index(hot).await.unwrap(), None);
        registry.claim_index(hot, 0).await.unwrap();
        registry.claim_index(hot, 1).await.unwrap();
        registry.claim_index(hot, 2).await.unwrap();
        assert_eq!(registry.max_ephemeral_index(hot).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn revoke_marks_flag() {
        let registry = KeyRegistry::new(Arc::new(InMemoryStore::new()));
        let key_id = KeyId::new();
        registry.put(&record(key_id, KeyId::new(), DerivationPath::cold())).await.unwrap();
        registry.revoke(key_id).await.unwrap();
        assert!(registry.get(key_id).await.unwrap().unwrap().revoked);
    }
}
