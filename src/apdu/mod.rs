//! Reader command (pseudo-APDU) handling
//!
//! Builders for the PC/SC pseudo-APDUs understood by ACR122U-class
//! contactless readers, plus the [`Response`] wrapper for the raw buffers
//! they return. All MIFARE traffic goes through five commands: load key,
//! general authenticate, read binary, update binary, and get UID.
//!
//! # Example
//! ```
//! use lockcard::apdu::{commands, Response};
//! use lockcard::card::KeyType;
//!
//! let cmd = commands::authenticate(4, KeyType::A);
//! assert_eq!(cmd, vec![0xFF, 0x86, 0x00, 0x00, 0x05, 0x01, 0x00, 0x04, 0x60, 0x00]);
//!
//! let response = Response::from_raw(&[0x90, 0x00]).unwrap();
//! assert!(response.is_okay());
//! ```

mod response;
mod status;

pub use response::Response;
pub use status::SW;

use thiserror::Error;

use crate::card::{KeyType, MifareKey, BLOCK_SIZE};

/// Errors that can occur while handling reader responses
#[derive(Debug, Error, PartialEq, Eq)]
pub enum APDUError {
    #[error("response too short: expected at least 2 status bytes, got {0}")]
    TooShort(usize),
}

/// Pseudo-APDU command builders
///
/// Byte patterns follow the ACS reader command set; the reader answers each
/// of these with data (possibly empty) followed by SW1/SW2.
pub mod commands {
    use super::*;

    /// Load a 6-byte key into the reader's volatile key slot
    ///
    /// `FF 82 00 00 06` + key
    pub fn load_key(key: &MifareKey) -> Vec<u8> {
        let mut cmd = vec![0xFF, 0x82, 0x00, 0x00, 0x06];
        cmd.extend_from_slice(key.as_bytes());
        cmd
    }

    /// General authenticate against the sector containing `block`
    ///
    /// `FF 86 00 00 05 01 00 <block> <keyType> 00`, referencing the key
    /// previously staged by [`load_key`].
    pub fn authenticate(block: u8, key_type: KeyType) -> Vec<u8> {
        vec![
            0xFF,
            0x86,
            0x00,
            0x00,
            0x05,
            0x01,
            0x00,
            block,
            key_type as u8,
            0x00,
        ]
    }

    /// Read 16 bytes from `block`
    ///
    /// `FF B0 00 <block> 10`
    pub fn read_block(block: u8) -> Vec<u8> {
        vec![0xFF, 0xB0, 0x00, block, BLOCK_SIZE as u8]
    }

    /// Write 16 bytes to `block`
    ///
    /// `FF D6 00 <block> 10` + data
    pub fn write_block(block: u8, data: &[u8; BLOCK_SIZE]) -> Vec<u8> {
        let mut cmd = vec![0xFF, 0xD6, 0x00, block, BLOCK_SIZE as u8];
        cmd.extend_from_slice(data);
        cmd
    }

    /// Read the card UID
    ///
    /// `FF CA 00 00 00`
    pub fn get_uid() -> Vec<u8> {
        vec![0xFF, 0xCA, 0x00, 0x00, 0x00]
    }
}
