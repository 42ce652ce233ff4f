//! Error taxonomy for card operations

use thiserror::Error;

/// Errors produced by the card access layer
///
/// Validation errors are raised before any transport I/O happens; the
/// transport variants carry whatever context the reader gave us.
#[derive(Debug, Error)]
pub enum CardError {
    /// No reader was selected or the named reader is not present
    #[error("reader not found: {0}")]
    NoReader(String),

    /// Establishing or driving the PC/SC connection failed
    #[error("connection error: {0}")]
    Connection(String),

    /// Every candidate key in the fallback list failed for a sector
    #[error("authentication failed for sector {sector}: all candidate keys exhausted")]
    AuthExhausted { sector: u8 },

    /// A reader command returned a non-success status word
    #[error("command failed with status {sw1:02X} {sw2:02X}")]
    Transmission { sw1: u8, sw2: u8 },

    /// The card returned fewer bytes than the operation needs
    #[error("short read from block {block}: got {len} bytes")]
    ShortRead { block: u8, len: usize },

    /// Malformed caller input (hex lengths, block choice, numeric fields)
    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Pcsc(#[from] pcsc::Error),

    #[error(transparent)]
    Apdu(#[from] crate::apdu::APDUError),
}

impl CardError {
    /// Build a transmission error from a split status word pair
    pub fn transmission(sw1: u8, sw2: u8) -> Self {
        Self::Transmission { sw1, sw2 }
    }
}

pub type Result<T> = std::result::Result<T, CardError>;
