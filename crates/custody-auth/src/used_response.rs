//! Anti-replay set for one-time codes, shared between an approval
//! challenge response and a release-id authorization. Both are
//! "claim exactly once" problems, so both reduce to
//! [`custody_db::CustodyStore::claim_unique`] under their own key namespace.

use custody_db::{keys, CustodyStore};
use std::sync::Arc;

/// A namespaced anti-replay guard. Each caller picks its own prefix so the
/// Approval Engine's challenge-response claims never collide with the HSM
/// boundary's release-authorization claims, even when both are validating
/// the same underlying approver code.
pub struct UsedResponseSet {
    store: Arc<dyn CustodyStore>,
    namespace: &'static str,
}

impl UsedResponseSet {
    pub fn challenges(store: Arc<dyn CustodyStore>) -> Self {
        Self { store, namespace: keys::USED_RESPONSE }
    }

    pub fn release_authorizations(store: Arc<dyn CustodyStore>) -> Self {
        Self { store, namespace: "release_auth_claim:" }
    }

    /// Claim `(subject, response)` exactly once. Returns `false` if it was
    /// already claimed.
    pub async fn claim(&self, subject: &str, response: &str) -> custody_db::DbResult<bool> {
        let key = format!("{}{}:{}", self.namespace, subject, response);
        self.store.claim_unique(&key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use custody_db::InMemoryStore;

    #[tokio::test]
    async fn claim_rejects_replay() {
        let store: Arc<dyn CustodyStore> = Arc::new(InMemoryStore::new());
        let set = UsedResponseSet::challenges(store);
        assert!(set.claim("challenge-1", "123456").await.unwrap());
        assert!(!set.claim("challenge-1", "123456").await.unwrap());
    }

    #[tokio::test]
    async fn distinct_namespaces_do_not_collide() {
        let store: Arc<dyn CustodyStore> = Arc::new(InMemoryStore::new());
        let challenges = UsedResponseSet::challenges(store.clone());
        let releases = UsedResponseSet::release_authorizations(store);
        assert!(challenges.claim("x", "123456").await.unwrap());
        assert!(releases.claim("x", "123456").await.unwrap());
    }
}
