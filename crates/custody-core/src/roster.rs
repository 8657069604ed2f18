//! Approver roster: binds each of the three fixed roles (CEO/CFO/CTO) to
//! an `ApproverId` and tracks whether that approver is currently active,
//! backing the `policy-denied` "approver inactive" check that sits in
//! front of the Approval Engine.

use custody_db::{keys, CustodyStore, CustodyStoreExt, DbResult};
use custody_types::{ApproverId, ApproverRole};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproverRecord {
    pub approver_id: ApproverId,
    pub role: ApproverRole,
    pub contact: String,
    pub active: bool,
}

pub struct ApproverRoster {
    store: Arc<dyn CustodyStore>,
}

impl ApproverRoster {
    pub fn new(store: Arc<dyn CustodyStore>) -> Self {
        Self { store }
    }

    pub async fn enroll(&self, role: ApproverRole, approver_id: ApproverId, contact: impl Into<String>) -> DbResult<()> {
        let record = ApproverRecord { approver_id, role, contact: contact.into(), active: true };
        self.store.put_json(&entry_key(approver_id), &record).await
    }

    pub async fn get(&self, approver_id: ApproverId) -> DbResult<Option<ApproverRecord>> {
        self.store.get_json(&entry_key(approver_id)).await
    }

    pub async fn is_active(&self, approver_id: ApproverId) -> DbResult<bool> {
        Ok(self.get(approver_id).await?.map(|r| r.active).unwrap_or(false))
    }

    pub async fn set_active(&self, approver_id: ApproverId, active: bool) -> DbResult<()> {
        if let Some(mut record) = self.get(approver_id).await? {
            record.active = active;
            self.store.put_json(&entry_key(approver_id), &record).await?;
        }
        Ok(())
    }

    /// Every enrolled approver, active or not - used to fan a notification
    /// out to the whole roster when an intent starts awaiting approval.
    pub async fn all(&self) -> DbResult<Vec<ApproverRecord>> {
        let entries = self.store.scan_prefix(keys::APPROVER_ROSTER).await?;
        let mut records = Vec::with_capacity(entries.len());
        for (_, bytes) in entries {
            if let Ok(record) = serde_json::from_slice(&bytes) {
                records.push(record);
            }
        }
        Ok(records)
    }
}

fn entry_key(approver_id: ApproverId) -> String {
    format!("{}{}", keys::APPROVER_ROSTER, approver_id)
}
