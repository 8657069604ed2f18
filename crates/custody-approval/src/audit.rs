//! Audit trail for denied/failed approval attempts, recorded as a
//! failed-approval audit event.

use custody_types::{ApproverId, IntentId};
use std::sync::RwLock;

#[derive(Debug, Clone)]
pub enum AuditEvent {
    PolicyDenied { intent_id: IntentId, reason: String },
    AuthnFailed { intent_id: IntentId, approver: ApproverId, reason: String },
    ApproverLockedOut { approver: ApproverId },
    IntentSucceeded { intent_id: IntentId },
    IntentFailed { intent_id: IntentId, reason: String },
    IntentCancelled { intent_id: IntentId, reason: String },
}

/// A sink for audit events. Implementations are free to fan these out to a
/// durable log; the in-memory default exists so property tests have
/// something concrete to assert against.
pub trait AuditLog: Send + Sync {
    fn record(&self, event: AuditEvent);
}

#[derive(Default)]
pub struct InMemoryAuditLog {
    events: RwLock<Vec<AuditEvent>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.read().unwrap().clone()
    }
}

impl AuditLog for InMemoryAuditLog {
    fn record(&self, event: AuditEvent) {
        self.events.write().unwrap().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_events_in_order() {
        let log = InMemoryAuditLog::new();
        let intent = IntentId::new();
        log.record(AuditEvent::IntentSucceeded { intent_id: intent });
        log.record(AuditEvent::IntentFailed { intent_id: intent, reason: "x".to_string() });
        assert_eq!(log.events().len(), 2);
    }
}
