//! Approver authentication configuration: `approver-totp-step-seconds`,
//! `approver-totp-tolerance-steps`.

use serde::{Deserialize, Serialize};

/// TOTP parameters for approver challenge-response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotpConfig {
    /// Issuer name, surfaced only in provisioning URIs.
    pub issuer: String,
    /// Number of digits in the code (6 or 8).
    pub digits: u32,
    /// Time step in seconds.
    pub step_seconds: u64,
    /// Accepted clock skew, in steps before/after the current one.
    pub skew_steps: u32,
}

impl Default for TotpConfig {
    fn default() -> Self {
        Self {
            issuer: "Custody Core".to_string(),
            digits: 6,
            step_seconds: 30,
            skew_steps: 1,
        }
    }
}

/// Progressive lockout after repeated bad codes from the same approver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockoutConfig {
    pub max_attempts: u32,
    pub base_lockout_secs: u64,
    pub lockout_multiplier: f64,
    pub max_lockout_secs: u64,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_lockout_secs: 60,
            lockout_multiplier: 2.0,
            max_lockout_secs: 3_600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    pub totp: TotpConfig,
    pub lockout: LockoutConfig,
}

impl AuthConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(issuer) = std::env::var("CUSTODY_TOTP_ISSUER") {
            config.totp.issuer = issuer;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_six_digit_thirty_second_totp() {
        let config = AuthConfig::default();
        assert_eq!(config.totp.digits, 6);
        assert_eq!(config.totp.step_seconds, 30);
    }
}
