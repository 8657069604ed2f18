//! Stellar strkey address encoding
//!
//! The custody core's own documentation only describes the ledger address
//! as a 55-char string shaped like `G...ABC`, without specifying the exact
//! encoding. Stellar's actual
//! strkey format (SEP-0023) is: version byte `6 << 3` for an `ED25519_PUBLIC_KEY`,
//! followed by the 32-byte public key, followed by a 2-byte CRC16/XModem
//! checksum over the version byte and payload, all base32-encoded with no
//! padding. The result is 56 characters starting with `G`.

use base32::{decode as base32_decode, encode as base32_encode, Alphabet};

const VERSION_BYTE_ED25519_PUBLIC_KEY: u8 = 6 << 3;

fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Encode a raw Ed25519 public key as a Stellar `G...` strkey address.
pub fn encode_public_key(public_key: &[u8; 32]) -> String {
    let mut payload = Vec::with_capacity(35);
    payload.push(VERSION_BYTE_ED25519_PUBLIC_KEY);
    payload.extend_from_slice(public_key);

    let checksum = crc16_xmodem(&payload);
    payload.extend_from_slice(&checksum.to_le_bytes());

    base32_encode(Alphabet::RFC4648 { padding: false }, &payload)
}

/// Decode a Stellar `G...` strkey address back to a raw Ed25519 public key.
pub fn decode_public_key(address: &str) -> Option<[u8; 32]> {
    let payload = base32_decode(Alphabet::RFC4648 { padding: false }, address)?;
    if payload.len() != 35 || payload[0] != VERSION_BYTE_ED25519_PUBLIC_KEY {
        return None;
    }

    let (body, checksum_bytes) = payload.split_at(33);
    let expected = crc16_xmodem(body);
    let actual = u16::from_le_bytes([checksum_bytes[0], checksum_bytes[1]]);
    if expected != actual {
        return None;
    }

    let mut key = [0u8; 32];
    key.copy_from_slice(&body[1..]);
    Some(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let key = [42u8; 32];
        let address = encode_public_key(&key);
        assert!(address.starts_with('G'));
        assert_eq!(address.len(), 56);

        let decoded = decode_public_key(&address).unwrap();
        assert_eq!(decoded, key);
    }

    #[test]
    fn test_tampered_checksum_rejected() {
        let key = [1u8; 32];
        let mut address = encode_public_key(&key);
        // Flip the last character; the checksum must catch it.
        let last = address.pop().unwrap();
        let replacement = if last == 'A' { 'B' } else { 'A' };
        address.push(replacement);

        assert!(decode_public_key(&address).is_none());
    }

    #[test]
    fn test_wrong_version_byte_rejected() {
        // A well-formed base32 string of the right length but wrong version.
        let mut payload = vec![0u8; 35];
        payload[0] = 1 << 3; // some other strkey type
        let checksum = crc16_xmodem(&payload[..33]);
        payload[33..].copy_from_slice(&checksum.to_le_bytes());
        let address = base32_encode(Alphabet::RFC4648 { padding: false }, &payload);

        assert!(decode_public_key(&address).is_none());
    }
}
