//! MIFARE Classic 1K card model
//!
//! Geometry constants, key handling, and the binary block layouts used by
//! the setup-card operations.

pub mod blocks;

pub use blocks::{
    encode_setup_normal, encode_setup_special, identifier_block, AccessBits, TrailerBlock,
};

use std::fmt;

use crate::error::CardError;

/// Number of sectors on a MIFARE Classic 1K card
pub const SECTOR_COUNT: u8 = 16;
/// Blocks per sector
pub const BLOCKS_PER_SECTOR: u8 = 4;
/// Total addressable blocks
pub const BLOCK_COUNT: u8 = SECTOR_COUNT * BLOCKS_PER_SECTOR;
/// Bytes per block
pub const BLOCK_SIZE: usize = 16;

/// Fixed identifier block written by setup-card operations
pub const IDENTIFIER_BLOCK: u8 = 60;
/// Setup record block (lock number, wait time, sound/alarm flags)
pub const SETUP_BLOCK: u8 = 61;
/// Block holding the last-closed lock number at byte offset 4
pub const LOCK_NUMBER_BLOCK: u8 = 62;

/// First block of a sector; the authenticate command addresses the sector
/// through this block.
pub fn sector_base(sector: u8) -> u8 {
    sector * BLOCKS_PER_SECTOR
}

/// Sector containing a block
pub fn sector_of(block: u8) -> u8 {
    block / BLOCKS_PER_SECTOR
}

/// Trailer block (key A, access bits, key B) of a sector
pub fn trailer_of(sector: u8) -> u8 {
    sector * BLOCKS_PER_SECTOR + (BLOCKS_PER_SECTOR - 1)
}

/// Whether a block is a sector trailer
pub fn is_trailer(block: u8) -> bool {
    block % BLOCKS_PER_SECTOR == BLOCKS_PER_SECTOR - 1
}

/// MIFARE key slot selector
///
/// The discriminants are the key-type bytes of the general-authenticate
/// command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    A = 0x60,
    B = 0x61,
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyType::A => write!(f, "A"),
            KeyType::B => write!(f, "B"),
        }
    }
}

/// An opaque 6-byte MIFARE sector key
///
/// Textually a key is exactly 12 hex characters, rendered uppercase with no
/// separators. Keys are never derived or inspected, only loaded into the
/// reader and written into trailer blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MifareKey([u8; 6]);

/// The transport key every blank card ships with
pub const DEFAULT_KEY: MifareKey = MifareKey([0xFF; 6]);

impl MifareKey {
    /// Parse a key from a 12-hex-character string
    ///
    /// Surrounding whitespace is stripped and lowercase digits accepted;
    /// anything else is a validation error.
    pub fn from_hex(s: &str) -> Result<Self, CardError> {
        let s = s.trim().to_uppercase();
        if s.len() != 12 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CardError::Validation(format!(
                "key must be exactly 12 hex characters, got {:?}",
                s
            )));
        }
        let mut key = [0u8; 6];
        hex::decode_to_slice(&s, &mut key)
            .map_err(|e| CardError::Validation(format!("invalid key hex: {}", e)))?;
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl From<[u8; 6]> for MifareKey {
    fn from(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for MifareKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.0))
    }
}

/// Render a byte slice as uppercase hex with single-space separators, the
/// way dump logs print block contents.
pub fn to_hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
