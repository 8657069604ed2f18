//! The HSM Gateway boundary
//!
//! `HsmGateway` is the sole custodian of private key material. Everything
//! above this module — the Key Registry, the Ephemeral Key Manager, the
//! Approval Engine — only ever sees key-ids, public keys, release-ids and
//! signatures. `FakeHsm` is the in-process reference implementation used for
//! testing and local development; a real deployment swaps in an adapter that
//! speaks to an actual HSM without changing any caller.

use crate::{derivation, CryptoError, CryptoResult, KeyPair, PublicKey, Signature};
use async_trait::async_trait;
use custody_types::{Clock, DerivationPath, KeyClass, KeyId, PartitionId, ReleaseId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use zeroize::Zeroize;

/// Validates a one-time code bound to a partition and an approver, and
/// commits it to whatever anti-replay store backs it. Implemented outside
/// this crate (by `custody-auth`, against the approver's TOTP secret and the
/// shared used-response set) and injected into [`FakeHsm`] so the HSM
/// boundary never has to know how codes are generated.
#[async_trait]
pub trait ReleaseAuthenticator: Send + Sync {
    async fn validate_and_consume(
        &self,
        partition: PartitionId,
        approver: custody_types::ApproverId,
        one_time_code: &str,
    ) -> CryptoResult<()>;
}

/// A released, not-yet-spent grant to sign once with one key.
#[derive(Debug, Clone, Copy)]
pub struct ReleaseGrant {
    pub release_id: ReleaseId,
    pub expires_at_millis: i64,
}

/// Result of a successful key derivation.
#[derive(Debug, Clone, Copy)]
pub struct DerivedKey {
    pub key_id: KeyId,
    pub public_key: PublicKey,
}

/// Result of creating a partition: the partition's master key, ready to
/// derive children from.
#[derive(Debug, Clone, Copy)]
pub struct PartitionInfo {
    pub partition: PartitionId,
    pub master_key_id: KeyId,
    pub master_public_key: PublicKey,
}

/// The HSM Gateway contract. Object-safe so callers can hold a
/// `dyn HsmGateway` behind an `Arc`.
#[async_trait]
pub trait HsmGateway: Send + Sync {
    async fn create_partition(&self, partition: PartitionId) -> CryptoResult<PartitionInfo>;

    async fn derive_key(
        &self,
        parent_key_id: KeyId,
        path_suffix: &str,
        class: KeyClass,
    ) -> CryptoResult<DerivedKey>;

    async fn preview_public_key(
        &self,
        parent_key_id: KeyId,
        path_suffix: &str,
    ) -> CryptoResult<PublicKey>;

    async fn authorize_release(
        &self,
        partition: PartitionId,
        key_id: KeyId,
        approver: custody_types::ApproverId,
        one_time_code: &str,
    ) -> CryptoResult<ReleaseGrant>;

    async fn sign(
        &self,
        release_id: ReleaseId,
        digest: &[u8; 32],
        key_id: KeyId,
    ) -> CryptoResult<Signature>;

    async fn destroy(&self, key_id: KeyId) -> CryptoResult<()>;
}

struct PartitionState {
    master_seed: [u8; 32],
}

impl Drop for PartitionState {
    fn drop(&mut self) {
        self.master_seed.zeroize();
    }
}

struct KeyRecord {
    seed: [u8; 32],
    path: DerivationPath,
    class: KeyClass,
    partition: PartitionId,
    version: u32,
    destroyed: bool,
    ephemeral_used: bool,
}

impl Drop for KeyRecord {
    fn drop(&mut self) {
        self.seed.zeroize();
    }
}

struct ReleaseState {
    key_id: KeyId,
    expires_at_millis: i64,
    consumed: bool,
}

/// A reference, in-process HSM: real Ed25519 keys derived with the KDF in
/// [`derivation`], real lifecycle invariants, no network boundary. Suitable
/// for tests and local development; not a substitute for a real HSM in
/// production.
pub struct FakeHsm {
    clock: Arc<dyn Clock>,
    authenticator: Arc<dyn ReleaseAuthenticator>,
    release_ttl_millis: i64,
    partitions: RwLock<HashMap<PartitionId, PartitionState>>,
    keys: RwLock<HashMap<KeyId, KeyRecord>>,
    releases: RwLock<HashMap<ReleaseId, ReleaseState>>,
}

impl FakeHsm {
    pub fn new(
        clock: Arc<dyn Clock>,
        authenticator: Arc<dyn ReleaseAuthenticator>,
        release_ttl_millis: i64,
    ) -> Self {
        Self {
            clock,
            authenticator,
            release_ttl_millis,
            partitions: RwLock::new(HashMap::new()),
            keys: RwLock::new(HashMap::new()),
            releases: RwLock::new(HashMap::new()),
        }
    }

    /// Deterministic key-id for a (parent, path-suffix) pair, so repeated
    /// derive-key calls with the same inputs yield the same key-id and
    /// public key.
    fn deterministic_key_id(parent_key_id: KeyId, path_suffix: &str) -> KeyId {
        let digest = crate::hash::hash_all(&[parent_key_id.as_uuid().as_bytes(), path_suffix.as_bytes()]);
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        KeyId::from(uuid::Uuid::from_bytes(bytes))
    }

    fn parse_hardened_index(path_suffix: &str) -> CryptoResult<u32> {
        let digits = path_suffix
            .strip_suffix('\'')
            .ok_or_else(|| CryptoError::PathMalformed(path_suffix.to_string()))?;
        digits
            .parse::<u32>()
            .map_err(|_| CryptoError::PathMalformed(path_suffix.to_string()))
    }

    fn child_path(parent: &DerivationPath, class: KeyClass, index: u32) -> CryptoResult<DerivationPath> {
        let _ = parent;
        match class {
            KeyClass::Master => Err(CryptoError::PathMalformed(
                "cannot derive a master key".to_string(),
            )),
            KeyClass::Cold => Ok(DerivationPath::cold()),
            KeyClass::Hot => Ok(DerivationPath::hot()),
            KeyClass::Ephemeral => Ok(DerivationPath::ephemeral(index)),
        }
    }
}

#[async_trait]
impl HsmGateway for FakeHsm {
    async fn create_partition(&self, partition: PartitionId) -> CryptoResult<PartitionInfo> {
        // Idempotent: recreating an existing partition returns its existing master key.
        let already_exists = self.partitions.read().unwrap().contains_key(&partition);
        if already_exists {
            let master_key_id = Self::deterministic_key_id(KeyId::from(*partition.as_uuid()), "master");
            let keys = self.keys.read().unwrap();
            let record = keys.get(&master_key_id).ok_or_else(|| {
                CryptoError::Internal("partition exists without a master key record".to_string())
            })?;
            let public_key = KeyPair::from_seed(&record.seed).public_key();
            return Ok(PartitionInfo { partition, master_key_id, master_public_key: public_key });
        }

        let mut master_seed = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut master_seed);
        let master_key_id = Self::deterministic_key_id(KeyId::from(*partition.as_uuid()), "master");
        let master_public_key = KeyPair::from_seed(&master_seed).public_key();

        self.partitions
            .write()
            .unwrap()
            .insert(partition, PartitionState { master_seed });
        self.keys.write().unwrap().insert(
            master_key_id,
            KeyRecord {
                seed: master_seed,
                path: DerivationPath::master(),
                class: KeyClass::Master,
                partition,
                version: derivation::DERIVATION_VERSION,
                destroyed: false,
                ephemeral_used: false,
            },
        );

        Ok(PartitionInfo { partition, master_key_id, master_public_key })
    }

    async fn derive_key(
        &self,
        parent_key_id: KeyId,
        path_suffix: &str,
        class: KeyClass,
    ) -> CryptoResult<DerivedKey> {
        let index = Self::parse_hardened_index(path_suffix)?;

        let (parent_seed, parent_path, partition) = {
            let keys = self.keys.read().unwrap();
            let parent = keys
                .get(&parent_key_id)
                .ok_or(CryptoError::ParentNotFound)?;
            if parent.destroyed {
                return Err(CryptoError::KeyDestroyed);
            }
            (parent.seed, parent.path.clone(), parent.partition)
        };

        let child_seed = derivation::derive_child_seed(&parent_seed, path_suffix);
        let key_id = Self::deterministic_key_id(parent_key_id, path_suffix);
        let path = Self::child_path(&parent_path, class, index)?;
        let public_key = KeyPair::from_seed(&child_seed).public_key();

        let mut keys = self.keys.write().unwrap();
        keys.entry(key_id).or_insert_with(|| KeyRecord {
            seed: child_seed,
            path,
            class,
            partition,
            version: derivation::DERIVATION_VERSION,
            destroyed: false,
            ephemeral_used: false,
        });

        Ok(DerivedKey { key_id, public_key })
    }

    async fn preview_public_key(
        &self,
        parent_key_id: KeyId,
        path_suffix: &str,
    ) -> CryptoResult<PublicKey> {
        let _ = Self::parse_hardened_index(path_suffix)?;
        let parent_seed = {
            let keys = self.keys.read().unwrap();
            let parent = keys
                .get(&parent_key_id)
                .ok_or(CryptoError::ParentNotFound)?;
            if parent.destroyed {
                return Err(CryptoError::KeyDestroyed);
            }
            parent.seed
        };

        let child_seed = derivation::derive_child_seed(&parent_seed, path_suffix);
        Ok(KeyPair::from_seed(&child_seed).public_key())
    }

    async fn authorize_release(
        &self,
        partition: PartitionId,
        key_id: KeyId,
        approver: custody_types::ApproverId,
        one_time_code: &str,
    ) -> CryptoResult<ReleaseGrant> {
        {
            let keys = self.keys.read().unwrap();
            let key = keys.get(&key_id).ok_or(CryptoError::UnknownKey)?;
            if key.partition != partition {
                return Err(CryptoError::UnknownKey);
            }
            if key.destroyed {
                return Err(CryptoError::KeyDestroyed);
            }
        }

        self.authenticator
            .validate_and_consume(partition, approver, one_time_code)
            .await?;

        let release_id = ReleaseId::new();
        let expires_at_millis = self.clock.now_millis() + self.release_ttl_millis;
        self.releases.write().unwrap().insert(
            release_id,
            ReleaseState { key_id, expires_at_millis, consumed: false },
        );

        Ok(ReleaseGrant { release_id, expires_at_millis })
    }

    async fn sign(
        &self,
        release_id: ReleaseId,
        digest: &[u8; 32],
        key_id: KeyId,
    ) -> CryptoResult<Signature> {
        let now = self.clock.now_millis();

        let seed = {
            let mut releases = self.releases.write().unwrap();
            let release = releases.get_mut(&release_id).ok_or(CryptoError::ReleaseExpired)?;
            if release.consumed || now > release.expires_at_millis {
                return Err(CryptoError::ReleaseExpired);
            }
            if release.key_id != key_id {
                return Err(CryptoError::ReleaseWrongKey);
            }

            let mut keys = self.keys.write().unwrap();
            let key = keys.get_mut(&key_id).ok_or(CryptoError::KeyDestroyed)?;
            if key.destroyed {
                return Err(CryptoError::KeyDestroyed);
            }
            if key.version != derivation::DERIVATION_VERSION {
                return Err(CryptoError::VersionMismatch);
            }
            if key.class == KeyClass::Ephemeral {
                if key.ephemeral_used {
                    return Err(CryptoError::EphemeralKeyUsed);
                }
                key.ephemeral_used = true;
            }

            release.consumed = true;
            key.seed
        };

        let keypair = KeyPair::from_seed(&seed);
        Ok(Signature::sign_digest(&keypair, digest))
    }

    async fn destroy(&self, key_id: KeyId) -> CryptoResult<()> {
        let mut keys = self.keys.write().unwrap();
        if let Some(key) = keys.get_mut(&key_id) {
            key.destroyed = true;
            key.seed.zeroize();
        }
        // Missing key is treated as already destroyed: destroy is idempotent.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use custody_types::{ApproverId, SystemClock, TestClock};

    struct AlwaysValid;

    #[async_trait]
    impl ReleaseAuthenticator for AlwaysValid {
        async fn validate_and_consume(
            &self,
            _partition: PartitionId,
            _approver: ApproverId,
            _code: &str,
        ) -> CryptoResult<()> {
            Ok(())
        }
    }

    struct AlwaysInvalid;

    #[async_trait]
    impl ReleaseAuthenticator for AlwaysInvalid {
        async fn validate_and_consume(
            &self,
            _partition: PartitionId,
            _approver: ApproverId,
            _code: &str,
        ) -> CryptoResult<()> {
            Err(CryptoError::InvalidCode)
        }
    }

    fn hsm_with(auth: Arc<dyn ReleaseAuthenticator>) -> FakeHsm {
        FakeHsm::new(Arc::new(TestClock::new(0)), auth, 300_000)
    }

    #[tokio::test]
    async fn create_partition_is_idempotent() {
        let hsm = hsm_with(Arc::new(AlwaysValid));
        let partition = PartitionId::new();
        let a = hsm.create_partition(partition).await.unwrap();
        let b = hsm.create_partition(partition).await.unwrap();
        assert_eq!(a.master_key_id, b.master_key_id);
        assert_eq!(a.master_public_key, b.master_public_key);
    }

    #[tokio::test]
    async fn derive_key_is_deterministic() {
        let hsm = hsm_with(Arc::new(AlwaysValid));
        let partition = PartitionId::new();
        let info = hsm.create_partition(partition).await.unwrap();

        let a = hsm.derive_key(info.master_key_id, "0'", KeyClass::Cold).await.unwrap();
        let b = hsm.derive_key(info.master_key_id, "0'", KeyClass::Cold).await.unwrap();
        assert_eq!(a.key_id, b.key_id);
        assert_eq!(a.public_key, b.public_key);
    }

    #[tokio::test]
    async fn preview_matches_subsequent_derive() {
        let hsm = hsm_with(Arc::new(AlwaysValid));
        let partition = PartitionId::new();
        let info = hsm.create_partition(partition).await.unwrap();

        let previewed = hsm.preview_public_key(info.master_key_id, "5'").await.unwrap();
        let derived = hsm.derive_key(info.master_key_id, "5'", KeyClass::Hot).await.unwrap();
        assert_eq!(previewed, derived.public_key);
    }

    #[tokio::test]
    async fn derive_key_unknown_parent_fails() {
        let hsm = hsm_with(Arc::new(AlwaysValid));
        let bogus = KeyId::new();
        let err = hsm.derive_key(bogus, "0'", KeyClass::Cold).await.unwrap_err();
        assert!(matches!(err, CryptoError::ParentNotFound));
    }

    #[tokio::test]
    async fn authorize_release_rejects_invalid_code() {
        let hsm = hsm_with(Arc::new(AlwaysInvalid));
        let partition = PartitionId::new();
        let info = hsm.create_partition(partition).await.unwrap();
        let err = hsm
            .authorize_release(partition, info.master_key_id, ApproverId::new(), "000000")
            .await
            .unwrap_err();
        assert!(matches!(err, CryptoError::InvalidCode));
    }

    #[tokio::test]
    async fn sign_consumes_release_once() {
        let hsm = hsm_with(Arc::new(AlwaysValid));
        let partition = PartitionId::new();
        let info = hsm.create_partition(partition).await.unwrap();
        let key = hsm.derive_key(info.master_key_id, "0'", KeyClass::Hot).await.unwrap();

        let grant = hsm
            .authorize_release(partition, key.key_id, ApproverId::new(), "123456")
            .await
            .unwrap();
        let digest = crate::hash::sha256(b"unsigned tx bytes");

        hsm.sign(grant.release_id, &digest, key.key_id).await.unwrap();
        let err = hsm.sign(grant.release_id, &digest, key.key_id).await.unwrap_err();
        assert!(matches!(err, CryptoError::ReleaseExpired));
    }

    #[tokio::test]
    async fn sign_rejects_wrong_key() {
        let hsm = hsm_with(Arc::new(AlwaysValid));
        let partition = PartitionId::new();
        let info = hsm.create_partition(partition).await.unwrap();
        let key_a = hsm.derive_key(info.master_key_id, "0'", KeyClass::Hot).await.unwrap();
        let key_b = hsm.derive_key(info.master_key_id, "1'", KeyClass::Hot).await.unwrap();

        let grant = hsm
            .authorize_release(partition, key_a.key_id, ApproverId::new(), "123456")
            .await
            .unwrap();
        let digest = crate::hash::sha256(b"unsigned tx bytes");
        let err = hsm.sign(grant.release_id, &digest, key_b.key_id).await.unwrap_err();
        assert!(matches!(err, CryptoError::ReleaseWrongKey));
    }

    #[tokio::test]
    async fn release_expires_after_ttl() {
        let clock = Arc::new(TestClock::new(0));
        let hsm = FakeHsm::new(clock.clone(), Arc::new(AlwaysValid), 1_000);
        let partition = PartitionId::new();
        let info = hsm.create_partition(partition).await.unwrap();
        let key = hsm.derive_key(info.master_key_id, "0'", KeyClass::Hot).await.unwrap();

        let grant = hsm
            .authorize_release(partition, key.key_id, ApproverId::new(), "123456")
            .await
            .unwrap();
        clock.advance(2_000);
        let digest = crate::hash::sha256(b"unsigned tx bytes");
        let err = hsm.sign(grant.release_id, &digest, key.key_id).await.unwrap_err();
        assert!(matches!(err, CryptoError::ReleaseExpired));
    }

    #[tokio::test]
    async fn ephemeral_key_signs_once() {
        let hsm = hsm_with(Arc::new(AlwaysValid));
        let partition = PartitionId::new();
        let info = hsm.create_partition(partition).await.unwrap();
        let hot = hsm.derive_key(info.master_key_id, "0'", KeyClass::Hot).await.unwrap();
        let ephemeral = hsm.derive_key(hot.key_id, "7'", KeyClass::Ephemeral).await.unwrap();

        let digest = crate::hash::sha256(b"payment 1");
        let grant1 = hsm
            .authorize_release(partition, ephemeral.key_id, ApproverId::new(), "1")
            .await
            .unwrap();
        hsm.sign(grant1.release_id, &digest, ephemeral.key_id).await.unwrap();

        let grant2 = hsm
            .authorize_release(partition, ephemeral.key_id, ApproverId::new(), "2")
            .await
            .unwrap();
        let err = hsm.sign(grant2.release_id, &digest, ephemeral.key_id).await.unwrap_err();
        assert!(matches!(err, CryptoError::EphemeralKeyUsed));
    }

    #[tokio::test]
    async fn destroy_is_idempotent_and_blocks_further_signing() {
        let hsm = hsm_with(Arc::new(AlwaysValid));
        let partition = PartitionId::new();
        let info = hsm.create_partition(partition).await.unwrap();
        let key = hsm.derive_key(info.master_key_id, "0'", KeyClass::Hot).await.unwrap();

        hsm.destroy(key.key_id).await.unwrap();
        hsm.destroy(key.key_id).await.unwrap();

        let err = hsm
            .authorize_release(partition, key.key_id, ApproverId::new(), "123456")
            .await
            .unwrap_err();
        assert!(matches!(err, CryptoError::KeyDestroyed));
    }

    #[allow(dead_code)]
    fn _system_clock_compiles() -> Arc<dyn Clock> {
        Arc::new(SystemClock)
    }
}
