//! Approver authentication for the Stellar custody core.
//!
//! The only human-facing authentication surface this crate covers is the
//! fixed set of three approvers (CEO/CFO/CTO) proving possession of a TOTP
//! device, against both a challenge response and a release-id
//! authorization.

pub mod authenticator;
pub mod config;
pub mod error;
pub mod lockout;
pub mod totp;
pub mod used_response;

pub use authenticator::ApproverAuthenticator;
pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use totp::{TotpSecret, TotpService};
