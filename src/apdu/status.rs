//! Status Word (SW) constants for reader responses
//!
//! PC/SC pseudo-APDU status words returned by contactless readers.

/// Status Word constants
#[allow(dead_code)]
pub struct SW;

#[allow(dead_code)]
impl SW {
    // Success
    pub const SUCCESS: u16 = 0x9000;

    // Generic failure reported by ACR-class readers for pseudo-APDUs
    pub const OPERATION_FAILED: u16 = 0x6300;

    // Checking errors
    pub const WRONG_LENGTH: u16 = 0x6700;
    pub const SECURITY_STATUS_NOT_SATISFIED: u16 = 0x6982;
    pub const WRONG_DATA: u16 = 0x6A80;
    pub const FUNCTION_NOT_SUPPORTED: u16 = 0x6A81;
    pub const INS_NOT_SUPPORTED: u16 = 0x6D00;
    pub const CLA_NOT_SUPPORTED: u16 = 0x6E00;
    pub const UNKNOWN_ERROR: u16 = 0x6F00;

    /// Check if a status word indicates success (9000)
    #[inline]
    pub fn is_success(sw: u16) -> bool {
        sw == Self::SUCCESS
    }
}
