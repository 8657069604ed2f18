//! Notification interface, outbound only: a single method that tells an
//! approver a challenge is waiting. The core never waits on delivery and a
//! failed notification never blocks the state machine - `notify_approver`
//! has no `Result` to propagate for exactly that reason; an implementation
//! that talks to a flaky outbound channel is responsible for swallowing and
//! logging its own errors.

use async_trait::async_trait;
use custody_types::{Amount, ApproverId, IntentId};

/// One pending approval, as surfaced to whatever notifies the approver.
#[derive(Debug, Clone)]
pub struct ApprovalNotice<'a> {
    pub approver: ApproverId,
    pub intent_id: IntentId,
    pub amount: Amount,
    pub destination: &'a str,
    pub display_digest: &'a str,
    pub approval_url: &'a str,
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify_approver(&self, notice: ApprovalNotice<'_>);
}

/// Reference implementation: logs the notice at `info` instead of calling
/// out to an email/SMS/push provider. Suitable for the demo CLI and for any
/// deployment that tails its own logs for pending approvals.
#[derive(Debug, Default)]
pub struct LoggingNotificationSink;

#[async_trait]
impl NotificationSink for LoggingNotificationSink {
    async fn notify_approver(&self, notice: ApprovalNotice<'_>) {
        tracing::info!(
            approver = %notice.approver,
            intent_id = %notice.intent_id,
            amount_stroops = notice.amount.stroops(),
            destination = notice.destination,
            display_digest = notice.display_digest,
            approval_url = notice.approval_url,
            "approval requested"
        );
    }
}
