//! TOTP approver authentication (RFC 6238), used as the one-time code behind
//! both an approval challenge response and a release-id authorization. Time
//! comes from an injected millisecond timestamp rather than the system
//! clock, so tests can drive it deterministically.

use crate::config::TotpConfig;
use crate::error::{AuthError, AuthResult};
use base32::{decode as base32_decode, encode as base32_encode, Alphabet};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha1::Sha1;
use subtle::ConstantTimeEq;

/// A freshly generated approver secret, base32-encoded for manual entry or
/// an `otpauth://` provisioning URI.
#[derive(Debug, Clone)]
pub struct TotpSecret {
    pub secret: String,
    pub provisioning_uri: String,
}

#[derive(Clone)]
pub struct TotpService {
    config: TotpConfig,
}

impl TotpService {
    pub fn new(config: TotpConfig) -> Self {
        Self { config }
    }

    /// Generate a new 20-byte secret for an approver account.
    pub fn generate_secret(&self, account_name: &str) -> TotpSecret {
        let mut secret_bytes = vec![0u8; 20];
        rand::rngs::OsRng.fill_bytes(&mut secret_bytes);
        let secret = base32_encode(Alphabet::RFC4648 { padding: false }, &secret_bytes);
        let provisioning_uri = self.provisioning_uri(&secret, account_name);
        TotpSecret { secret, provisioning_uri }
    }

    /// Verify `code` against `secret` at `now_millis`, allowing
    /// `skew_steps` periods of drift in either direction.
    pub fn verify_code(&self, secret: &str, code: &str, now_millis: i64) -> AuthResult<bool> {
        let secret_bytes = base32_decode(Alphabet::RFC4648 { padding: false }, secret)
            .ok_or_else(|| AuthError::Internal("invalid TOTP secret encoding".to_string()))?;

        let counter = self.counter_for(now_millis);

        for i in 0..=self.config.skew_steps as i64 {
            if i > 0 {
                let past = self.generate_code_for_counter(&secret_bytes, counter - i)?;
                if constant_time_compare(code, &past) {
                    return Ok(true);
                }
            }
            let candidate = self.generate_code_for_counter(&secret_bytes, counter + i)?;
            if constant_time_compare(code, &candidate) {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// The code for the current step, for tests and operator tooling.
    pub fn generate_current_code(&self, secret: &str, now_millis: i64) -> AuthResult<String> {
        let secret_bytes = base32_decode(Alphabet::RFC4648 { padding: false }, secret)
            .ok_or_else(|| AuthError::Internal("invalid TOTP secret encoding".to_string()))?;
        self.generate_code_for_counter(&secret_bytes, self.counter_for(now_millis))
    }

    fn counter_for(&self, now_millis: i64) -> i64 {
        (now_millis / 1000) / self.config.step_seconds as i64
    }

    fn provisioning_uri(&self, secret: &str, account_name: &str) -> String {
        let issuer_encoded = urlencoding::encode(&self.config.issuer);
        let account_encoded = urlencoding::encode(account_name);
        format!(
            "otpauth://totp/{}:{}?secret={}&issuer={}&algorithm=SHA1&digits={}&period={}",
            issuer_encoded, account_encoded, secret, issuer_encoded, self.config.digits, self.config.step_seconds,
        )
    }

    fn generate_code_for_counter(&self, secret: &[u8], counter: i64) -> AuthResult<String> {
        let counter_bytes = (counter as u64).to_be_bytes();

        let mut mac = Hmac::<Sha1>::new_from_slice(secret)
            .map_err(|_| AuthError::Internal("invalid HMAC key length".to_string()))?;
        mac.update(&counter_bytes);
        let hash = mac.finalize().into_bytes();

        let offset = (hash[hash.len() - 1] & 0x0f) as usize;
        let binary = ((hash[offset] & 0x7f) as u32) << 24
            | (hash[offset + 1] as u32) << 16
            | (hash[offset + 2] as u32) << 8
            | (hash[offset + 3] as u32);

        let modulo = 10u32.pow(self.config.digits);
        let code = binary % modulo;

        Ok(format!("{:0width$}", code, width = self.config.digits as usize))
    }
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> TotpConfig {
        TotpConfig {
            issuer: "Custody Core Test".to_string(),
            digits: 6,
            step_seconds: 30,
            skew_steps: 1,
        }
    }

    #[test]
    fn generate_secret_is_base32_and_round_trips() {
        let service = TotpService::new(test_config());
        let secret = service.generate_secret("approver-1");
        assert!(!secret.secret.is_empty());
        assert!(secret.provisioning_uri.starts_with("otpauth://totp/"));
        assert!(secret.provisioning_uri.contains(&secret.secret));
    }

    #[test]
    fn current_code_verifies_at_the_same_instant() {
        let service = TotpService::new(test_config());
        let secret = service.generate_secret("approver-1");
        let now = 1_700_000_000_000i64;
        let code = service.generate_current_code(&secret.secret, now).unwrap();
        assert_eq!(code.len(), 6);
        assert!(service.verify_code(&secret.secret, &code, now).unwrap());
    }

    #[test]
    fn wrong_code_does_not_verify() {
        let service = TotpService::new(test_config());
        let secret = service.generate_secret("approver-1");
        let now = 1_700_000_000_000i64;
        assert!(!service.verify_code(&secret.secret, "000000", now).unwrap());
    }

    #[test]
    fn code_verifies_within_skew_but_not_beyond() {
        let service = TotpService::new(test_config());
        let secret = service.generate_secret("approver-1");
        let now = 1_700_000_000_000i64;
        let code = service.generate_current_code(&secret.secret, now).unwrap();

        let one_step_later = now + 30_000;
        assert!(service.verify_code(&secret.secret, &code, one_step_later).unwrap());

        let far_later = now + 300_000;
        assert!(!service.verify_code(&secret.secret, &code, far_later).unwrap());
    }
}
