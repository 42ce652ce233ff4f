//! Reader response handling
//!
//! A Response contains data bytes plus SW1/SW2 status words, split off the
//! raw buffer returned by a transmit call.

use super::status::SW;
use super::APDUError;

/// A reader response
///
/// The last two bytes of every transmit buffer are the status words; the
/// rest is payload. `is_okay()` checks for the 0x9000 success status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response data (without status words)
    pub data: Vec<u8>,
    /// Status word 1 (SW1)
    pub sw1: u8,
    /// Status word 2 (SW2)
    pub sw2: u8,
}

impl Response {
    /// Create a new response with data and status word
    pub fn new(data: Vec<u8>, sw: u16) -> Self {
        Self {
            data,
            sw1: (sw >> 8) as u8,
            sw2: sw as u8,
        }
    }

    /// Split a raw transmit buffer into data + status words
    ///
    /// Fails if the buffer is shorter than the two mandatory status bytes.
    pub fn from_raw(raw: &[u8]) -> Result<Self, APDUError> {
        if raw.len() < 2 {
            return Err(APDUError::TooShort(raw.len()));
        }
        let (data, sw) = raw.split_at(raw.len() - 2);
        Ok(Self {
            data: data.to_vec(),
            sw1: sw[0],
            sw2: sw[1],
        })
    }

    /// Create a success response (0x9000) with data
    pub fn success(data: Vec<u8>) -> Self {
        Self::new(data, SW::SUCCESS)
    }

    /// Create an empty success response (0x9000)
    pub fn ok() -> Self {
        Self::success(Vec::new())
    }

    /// Create an error response (no data)
    pub fn error(sw: u16) -> Self {
        Self::new(Vec::new(), sw)
    }

    /// Check if the response reports success (0x9000)
    pub fn is_okay(&self) -> bool {
        self.sw1 == 0x90 && self.sw2 == 0x00
    }

    /// Get the combined status word as u16
    pub fn sw(&self) -> u16 {
        ((self.sw1 as u16) << 8) | (self.sw2 as u16)
    }

    /// Convert to raw bytes (data + SW1 + SW2)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(self.data.len() + 2);
        result.extend_from_slice(&self.data);
        result.push(self.sw1);
        result.push(self.sw2);
        result
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::ok()
    }
}
