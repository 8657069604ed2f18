//! Ephemeral Key Manager
//!
//! Every outgoing payment signs with a fresh, one-time-use address derived
//! from the source wallet's hot branch, so `unique-addresses(window) /
//! outgoing-payments(window) == 1` for any payment that completes through
//! this path.

use custody_crypto::hsm::HsmGateway;
use custody_crypto::Signature;
use custody_db::{keys, CustodyStore, CustodyStoreExt, DbResult};
use custody_types::{
    Clock, CustodyError, DerivationPath, EphemeralKeyId, EphemeralKeyState, IntentId, KeyClass, KeyId, PartitionId,
    ReleaseId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::registry::KeyRegistry;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EphemeralKeyRecord {
    pub ephemeral_key_id: EphemeralKeyId,
    pub owning_intent: IntentId,
    pub hot_key_id: KeyId,
    pub partition: PartitionId,
    pub path: DerivationPath,
    pub public_key_bytes: [u8; 32],
    pub hsm_key_id: KeyId,
    pub state: EphemeralKeyState,
    pub created_at_millis: i64,
    pub expires_at_millis: i64,
    pub used_at_millis: Option<i64>,
    pub destroyed_at_millis: Option<i64>,
}

/// The next address an outgoing payment from `hot_key_id` would use, without
/// opening a release window.
#[derive(Debug, Clone, Copy)]
pub struct NextAddress {
    pub public_key_bytes: [u8; 32],
    pub path: DerivationPath,
    pub index: u32,
}

pub struct EphemeralKeyManager {
    hsm: Arc<dyn HsmGateway>,
    store: Arc<dyn CustodyStore>,
    registry: KeyRegistry,
    clock: Arc<dyn Clock>,
    ttl_millis: i64,
}

impl EphemeralKeyManager {
    pub fn new(hsm: Arc<dyn HsmGateway>, store: Arc<dyn CustodyStore>, clock: Arc<dyn Clock>, ttl_millis: i64) -> Self {
        let registry = KeyRegistry::new(store.clone());
        Self { hsm, store, registry, clock, ttl_millis }
    }

    /// Preview the next address without reserving it: no state change.
    pub async fn preview_next(&self, hot_key_id: KeyId) -> Result<NextAddress, CustodyError> {
        let next_index = self
            .registry
            .max_ephemeral_index(hot_key_id)
            .await
            .map_err(CustodyError::from)?
            .map(|n| n + 1)
            .unwrap_or(0);

        let path = DerivationPath::ephemeral(next_index);
        let public_key = self
            .hsm
            .preview_public_key(hot_key_id, &path.suffix_for_parent())
            .await
            .map_err(CustodyError::from)?;

        Ok(NextAddress { public_key_bytes: public_key.to_bytes(), path, index: next_index })
    }

    /// Reserves the next index under `hot_key_id`, derives the key in the
    /// HSM, and persists the record. If claiming the index fails, no HSM
    /// call is made; if deriving or persisting fails after the claim, the
    /// claim is rolled back so the index is not consumed.
    pub async fn allocate(
        &self,
        intent: IntentId,
        hot_key_id: KeyId,
        partition: PartitionId,
    ) -> Result<EphemeralKeyRecord, CustodyError> {
        loop {
            let next_index = self
                .registry
                .max_ephemeral_index(hot_key_id)
                .await
                .map_err(CustodyError::from)?
                .map(|n| n + 1)
                .unwrap_or(0);

            if !self
                .registry
                .claim_index(hot_key_id, next_index)
                .await
                .map_err(CustodyError::from)?
            {
                continue;
            }

            let path = DerivationPath::ephemeral(next_index);
            let derived = match self
                .hsm
                .derive_key(hot_key_id, &path.suffix_for_parent(), KeyClass::Ephemeral)
                .await
            {
                Ok(derived) => derived,
                Err(err) => {
                    self.registry.release_index(hot_key_id, next_index).await.map_err(CustodyError::from)?;
                    return Err(CustodyError::from(err));
                }
            };

            let now = self.clock.now_millis();
            let record = EphemeralKeyRecord {
                ephemeral_key_id: EphemeralKeyId::new(),
                owning_intent: intent,
                hot_key_id,
                partition,
                path,
                public_key_bytes: derived.public_key.to_bytes(),
                hsm_key_id: derived.key_id,
                state: EphemeralKeyState::Allocated,
                created_at_millis: now,
                expires_at_millis: now + self.ttl_millis,
                used_at_millis: None,
                destroyed_at_millis: None,
            };

            if let Err(err) = self.put(&record).await {
                self.registry.release_index(hot_key_id, next_index).await.map_err(CustodyError::from)?;
                return Err(CustodyError::from(err));
            }
            return Ok(record);
        }
    }

    /// One-shot. Requires the record to be `allocated`/`armed`; on success
    /// transitions to `used` then destroys the key, transitioning to
    /// `destroyed`.
    pub async fn sign_for_intent(
        &self,
        ephemeral_key_id: EphemeralKeyId,
        release_id: ReleaseId,
        digest: &[u8; 32],
    ) -> Result<Signature, CustodyError> {
        let mut record = self
            .get(ephemeral_key_id)
            .await
            .map_err(CustodyError::from)?
            .ok_or_else(|| CustodyError::not_found(format!("ephemeral key {ephemeral_key_id}")))?;

        if !record.state.signable() {
            return Err(CustodyError::InvalidState {
                reason: format!("ephemeral key {ephemeral_key_id} is {}", record.state),
            });
        }

        let signature = self
            .hsm
            .sign(release_id, digest, record.hsm_key_id)
            .await
            .map_err(CustodyError::from)?;

        let now = self.clock.now_millis();
        record.state = EphemeralKeyState::Used;
        record.used_at_millis = Some(now);
        self.put(&record).await.map_err(CustodyError::from)?;

        self.hsm.destroy(record.hsm_key_id).await.map_err(CustodyError::from)?;
        record.state = EphemeralKeyState::Destroyed;
        record.destroyed_at_millis = Some(self.clock.now_millis());
        self.put(&record).await.map_err(CustodyError::from)?;

        Ok(signature)
    }

    /// Destroys and marks `expired` any key past its TTL that was never
    /// used. Bounded per run by the caller via `limit`.
    pub async fn expire_sweep(&self, limit: usize) -> Result<usize, CustodyError> {
        let now = self.clock.now_millis();
        let entries = self.store.scan_prefix(keys::EPHEMERAL_KEY).await.map_err(CustodyError::from)?;

        let mut expired = 0;
        for (_, bytes) in entries {
            if expired >= limit {
                break;
            }
            let mut record: EphemeralKeyRecord = match serde_json::from_slice(&bytes) {
                Ok(r) => r,
                Err(_) => continue,
            };
            if record.state.is_terminal() || record.expires_at_millis > now {
                continue;
            }

            if self.hsm.destroy(record.hsm_key_id).await.map_err(CustodyError::from).is_ok() {
                record.state = EphemeralKeyState::Expired;
                record.destroyed_at_millis = Some(now);
                self.put(&record).await.map_err(CustodyError::from)?;
                expired += 1;
            }
        }
        Ok(expired)
    }

    pub async fn get(&self, ephemeral_key_id: EphemeralKeyId) -> DbResult<Option<EphemeralKeyRecord>> {
        self.store.get_json(&record_key(ephemeral_key_id)).await
    }

    async fn put(&self, record: &EphemeralKeyRecord) -> DbResult<()> {
        self.store.put_json(&record_key(record.ephemeral_key_id), record).await
    }
}

fn record_key(id: EphemeralKeyId) -> String {
    format!("{}{}", keys::EPHEMERAL_KEY, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use custody_crypto::hsm::{FakeHsm, ReleaseAuthenticator};
    use custody_db::InMemoryStore;
    use custody_types::{ApproverId, TestClock};
    use async_trait::async_trait;

    struct AlwaysValid;
    #[async_trait]
    impl ReleaseAuthenticator for AlwaysValid {
        async fn validate_and_consume(
            &self,
            _partition: PartitionId,
            _approver: ApproverId,
            _code: &str,
        ) -> custody_crypto::CryptoResult<()> {
            Ok(())
        }
    }

    async fn setup() -> (EphemeralKeyManager, Arc<dyn HsmGateway>, Arc<TestClock>, KeyId, PartitionId) {
        let (manager, hsm, clock, hot_key, partition, _store) = setup_with_store().await;
        (manager, hsm, clock, hot_key, partition)
    }

    async fn setup_with_store(
    ) -> (EphemeralKeyManager, Arc<dyn HsmGateway>, Arc<TestClock>, KeyId, PartitionId, Arc<dyn CustodyStore>) {
        let clock = Arc::new(TestClock::new(0));
        let hsm: Arc<dyn HsmGateway> = Arc::new(FakeHsm::new(clock.clone(), Arc::new(AlwaysValid), 300_000));
        let store: Arc<dyn CustodyStore> = Arc::new(InMemoryStore::new());
        let partition = PartitionId::new();
        let info = hsm.create_partition(partition).await.unwrap();
        let hot_key = hsm
            .derive_key(info.master_key_id, &DerivationPath::cold().suffix_for_parent(), KeyClass::Cold)
            .await
            .unwrap();
        let hot_key = hsm
            .derive_key(hot_key.key_id, &DerivationPath::hot().suffix_for_parent(), KeyClass::Hot)
            .await
            .unwrap();

        let manager = EphemeralKeyManager::new(hsm.clone(), store.clone(), clock.clone(), 3_600_000);
        (manager, hsm, clock, hot_key.key_id, partition, store)
    }

    #[tokio::test]
    async fn allocate_and_sign_destroys_key() {
        let (manager, hsm, clock, hot_key, partition) = setup().await;
        let intent = IntentId::new();
        let record = manager.allocate(intent, hot_key, partition).await.unwrap();
        assert_eq!(record.state, EphemeralKeyState::Allocated);

        let grant = hsm
            .authorize_release(partition, record.hsm_key_id, ApproverId::new(), "000000")
            .await
            .unwrap();
        let digest = [7u8; 32];
        manager.sign_for_intent(record.ephemeral_key_id, grant.release_id, &digest).await.unwrap();

        let after = manager.get(record.ephemeral_key_id).await.unwrap().unwrap();
        assert_eq!(after.state, EphemeralKeyState::Destroyed);
        let _ = clock.now_millis();
    }

    #[tokio::test]
    async fn preview_next_does_not_consume_index() {
        let (manager, _hsm, _clock, hot_key, _partition) = setup().await;
        let first = manager.preview_next(hot_key).await.unwrap();
        let second = manager.preview_next(hot_key).await.unwrap();
        assert_eq!(first.index, second.index);
        assert_eq!(first.public_key_bytes, second.public_key_bytes);
    }

    #[tokio::test]
    async fn allocate_consumes_sequential_indices() {
        let (manager, _hsm, _clock, hot_key, partition) = setup().await;
        let a = manager.allocate(IntentId::new(), hot_key, partition).await.unwrap();
        let b = manager.allocate(IntentId::new(), hot_key, partition).await.unwrap();
        assert_ne!(a.path, b.path);
    }

    #[tokio::test]
    async fn allocate_does_not_consume_index_on_derive_failure() {
        let (manager, hsm, _clock, hot_key, partition, store) = setup_with_store().await;
        hsm.destroy(hot_key).await.unwrap();

        let err = manager.allocate(IntentId::new(), hot_key, partition).await;
        assert!(err.is_err());

        let registry = KeyRegistry::new(store);
        assert_eq!(registry.max_ephemeral_index(hot_key).await.unwrap(), None);

        // A second failed attempt must also reserve index 0, proving the
        // first failure released its claim instead of burning it.
        let err2 = manager.allocate(IntentId::new(), hot_key, partition).await;
        assert!(err2.is_err());
        assert_eq!(registry.max_ephemeral_index(hot_key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn expire_sweep_destroys_unused_expired_keys() {
        let (manager, _hsm, clock, hot_key, partition) = setup().await;
        let record = manager.allocate(IntentId::new(), hot_key, partition).await.unwrap();
        clock.advance(3_600_001);

        let swept = manager.expire_sweep(10).await.unwrap();
        assert_eq!(swept, 1);
        let after = manager.get(record.ephemeral_key_id).await.unwrap().unwrap();
        assert_eq!(after.state, EphemeralKeyState::Expired);
    }
}
