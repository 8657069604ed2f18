//! Challenge generation
//!
//! Material = intent id || amount || destination || source wallet id ||
//! timestamp || 128-bit nonce. The display digest shown to the approver is
//! the first 64 bits of SHA-256(material), base32-encoded; encoding 8 bytes
//! with RFC4648 padding happens to produce exactly 16 characters (one full
//! 5-byte block plus a padded 3-byte remainder), matching the required
//! exactly 16 visible characters.

use base32::Alphabet;
use custody_crypto::hash::hash_all;
use custody_types::{Amount, ChallengeId, IntentId, WalletId};
use rand::RngCore;

use crate::types::ChallengeRecord;

/// Build a fresh Challenge for an intent entering `awaiting_approval`.
pub fn generate(
    intent_id: IntentId,
    amount: Amount,
    destination: &str,
    source_wallet: WalletId,
    now_millis: i64,
    ttl_millis: i64,
) -> ChallengeRecord {
    let mut nonce = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let material = hash_all(&[
        intent_id.as_uuid().as_bytes(),
        &amount.stroops().to_be_bytes(),
        destination.as_bytes(),
        source_wallet.as_uuid().as_bytes(),
        &now_millis.to_be_bytes(),
        &nonce,
    ]);

    let display_digest = base32::encode(Alphabet::RFC4648 { padding: true }, &material[..8]);
    debug_assert_eq!(display_digest.len(), 16);

    ChallengeRecord {
        challenge_id: ChallengeId::new(),
        intent_id,
        display_digest,
        created_at_millis: now_millis,
        expires_at_millis: now_millis + ttl_millis,
    }
}
