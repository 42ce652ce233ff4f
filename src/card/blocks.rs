//! Binary block layouts
//!
//! Pure conversions between 16-byte block contents and structured records:
//! sector trailers, and the two setup blocks (60/61) that encode a physical
//! lock's configuration. No I/O happens here.

use std::fmt;

use super::{MifareKey, BLOCK_SIZE};
use crate::error::CardError;

/// The 4 access-control bytes of a sector trailer
///
/// Textually exactly 8 hex characters. Treated as an opaque value; the
/// per-block permission matrix it encodes is the card's business.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessBits([u8; 4]);

impl AccessBits {
    /// Parse access bits from an 8-hex-character string
    pub fn from_hex(s: &str) -> Result<Self, CardError> {
        let s = s.trim().to_uppercase();
        if s.len() != 8 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CardError::Validation(format!(
                "access bits must be exactly 8 hex characters, got {:?}",
                s
            )));
        }
        let mut bits = [0u8; 4];
        hex::decode_to_slice(&s, &mut bits)
            .map_err(|e| CardError::Validation(format!("invalid access bits hex: {}", e)))?;
        Ok(Self(bits))
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl From<[u8; 4]> for AccessBits {
    fn from(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for AccessBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.0))
    }
}

/// Decoded sector trailer: key A, access bits, key B
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailerBlock {
    pub key_a: MifareKey,
    pub access_bits: AccessBits,
    pub key_b: MifareKey,
}

impl TrailerBlock {
    pub fn new(key_a: MifareKey, access_bits: AccessBits, key_b: MifareKey) -> Self {
        Self {
            key_a,
            access_bits,
            key_b,
        }
    }

    /// Split a 16-byte trailer into keyA[0..6], access[6..10], keyB[10..16]
    pub fn from_bytes(bytes: &[u8; BLOCK_SIZE]) -> Self {
        let mut key_a = [0u8; 6];
        let mut access = [0u8; 4];
        let mut key_b = [0u8; 6];
        key_a.copy_from_slice(&bytes[0..6]);
        access.copy_from_slice(&bytes[6..10]);
        key_b.copy_from_slice(&bytes[10..16]);
        Self {
            key_a: key_a.into(),
            access_bits: access.into(),
            key_b: key_b.into(),
        }
    }

    /// Concatenate the three fields back into block form
    pub fn to_bytes(&self) -> [u8; BLOCK_SIZE] {
        let mut out = [0u8; BLOCK_SIZE];
        out[0..6].copy_from_slice(self.key_a.as_bytes());
        out[6..10].copy_from_slice(self.access_bits.as_bytes());
        out[10..16].copy_from_slice(self.key_b.as_bytes());
        out
    }
}

/// Fixed identifier template written to block 60 in both setup modes
///
/// "HN19M-1" padded with zeros.
pub fn identifier_block() -> [u8; BLOCK_SIZE] {
    [
        0x48, 0x4E, 0x31, 0x39, 0x4D, 0x2D, 0x31, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00,
    ]
}

/// Encode the normal-mode setup record for block 61
///
/// Flags byte: bits 4 and 5 always set, sound mode in the low bits, alarm
/// mode in the high bits. The lock number is stored little-endian across
/// two bytes; out-of-range values wrap silently.
pub fn encode_setup_normal(
    lock_no: u16,
    wait_time: u8,
    sound_mode: u8,
    alarm_mode: u8,
    password: &MifareKey,
) -> [u8; BLOCK_SIZE] {
    let mut flags: u8 = 0x30;
    flags |= match sound_mode {
        1 => 0x02,
        2 => 0x01,
        3 => 0x03,
        _ => 0x00,
    };
    flags |= match alarm_mode {
        1 => 0x80,
        2 => 0xC0,
        _ => 0x00,
    };

    let mut out = [0u8; BLOCK_SIZE];
    out[0] = 0xAA;
    out[1] = flags;
    out[2] = 0xAA;
    out[3] = 0x00; // lock mode: normal
    out[4] = wait_time;
    out[5] = 0x00;
    out[6] = (lock_no & 0xFF) as u8;
    out[7] = (lock_no >> 8) as u8;
    out[8..14].copy_from_slice(password.as_bytes());
    // bytes 14..16 stay zero (reserved)
    out
}

/// Encode the special-mode setup record for block 61
///
/// Fixed template with only the lock-number byte substituted. The 8-byte
/// tail is opaque vendor data, carried verbatim.
pub fn encode_setup_special(lock_no: u8) -> [u8; BLOCK_SIZE] {
    [
        0xAA, 0x32, 0xAA, 0x02, 0x06, 0x00, lock_no, 0x00, 0x9F, 0x79, 0x20, 0x63, 0xF2, 0x4B,
        0x3E, 0x00,
    ]
}
