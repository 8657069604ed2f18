//! Progressive lockout after repeated bad TOTP codes from one approver.
//!
//! Tracked per [`ApproverId`] rather than per-session, since an approver's
//! only interaction with this layer is the one-time code itself.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::config::LockoutConfig;
use crate::error::{AuthError, AuthResult};
use custody_types::{ApproverId, Clock};

#[derive(Debug, Clone, Copy)]
struct ApproverAttempts {
    failed_count: u32,
    lockout_secs: u64,
    locked_until_millis: Option<i64>,
}

/// In-process lockout tracker. One instance is shared across the process;
/// state does not survive a restart, which is acceptable since a restart
/// also invalidates any in-flight release grants.
pub struct LockoutTracker {
    clock: Arc<dyn Clock>,
    config: LockoutConfig,
    attempts: RwLock<HashMap<ApproverId, ApproverAttempts>>,
}

impl LockoutTracker {
    pub fn new(clock: Arc<dyn Clock>, config: LockoutConfig) -> Self {
        Self {
            clock,
            config,
            attempts: RwLock::new(HashMap::new()),
        }
    }

    /// Returns an error if `approver` is currently locked out.
    pub fn check(&self, approver: ApproverId) -> AuthResult<()> {
        let attempts = self.attempts.read().unwrap();
        if let Some(info) = attempts.get(&approver) {
            if let Some(locked_until) = info.locked_until_millis {
                let now = self.clock.now_millis();
                if now < locked_until {
                    let remaining = ((locked_until - now) as u64).div_ceil(1000);
                    return Err(AuthError::locked_out(
                        approver.to_string(),
                        std::time::Duration::from_secs(remaining),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Record a bad code, locking the approver out once `max_attempts` is
    /// reached. Each subsequent lockout doubles (`lockout_multiplier`) up to
    /// `max_lockout_secs`.
    pub fn record_failure(&self, approver: ApproverId) {
        let now = self.clock.now_millis();
        let mut attempts = self.attempts.write().unwrap();
        let entry = attempts.entry(approver).or_insert(ApproverAttempts {
            failed_count: 0,
            lockout_secs: self.config.base_lockout_secs,
            locked_until_millis: None,
        });

        entry.failed_count += 1;

        if entry.failed_count >= self.config.max_attempts {
            let lockout_secs = entry.lockout_secs.min(self.config.max_lockout_secs);
            entry.locked_until_millis = Some(now + (lockout_secs as i64) * 1000);
            entry.lockout_secs = ((entry.lockout_secs as f64) * self.config.lockout_multiplier)
                .min(self.config.max_lockout_secs as f64) as u64;

            tracing::warn!(%approver, lockout_secs, "approver locked out after repeated invalid codes");
        }
    }

    /// Clear an approver's failure history after a correct code.
    pub fn record_success(&self, approver: ApproverId) {
        self.attempts.write().unwrap().remove(&approver);
    }
}
