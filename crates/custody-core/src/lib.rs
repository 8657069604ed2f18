//! Custody Core - facade wiring for the Stellar custody core
//!
//! Composes the HSM Gateway, Key Registry, Ephemeral Key Manager, approver
//! authenticator, Ledger Submitter and Approval Engine behind a single
//! [`CustodyService`], adds the approver roster and notification interface
//! the lower crates don't know about, and exposes the one configuration
//! structure a deployment needs to construct it.

pub mod config;
pub mod notification;
pub mod roster;
pub mod service;

pub use config::CustodyConfig;
pub use custody_types::{CustodyError, Result};
pub use notification::{ApprovalNotice, LoggingNotificationSink, NotificationSink};
pub use roster::{ApproverRecord, ApproverRoster};
pub use service::{CustodyService, ProvisionedWallets};
