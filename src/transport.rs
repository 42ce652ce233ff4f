//! Reader transport
//!
//! The [`Transport`] trait is the seam between the card operations and the
//! PC/SC stack: one logical connection to one named reader, exchanging raw
//! command/response buffers. [`PcscTransport`] is the real implementation;
//! tests drive the operations through a scripted mock instead.

use std::ffi::CString;

use log::{debug, warn};
use pcsc::{Attribute, Context, Protocols, Scope, ShareMode, MAX_ATR_SIZE, MAX_BUFFER_SIZE};

use crate::apdu::{commands, Response};
use crate::error::{CardError, Result};

/// A connected card session
///
/// Implementors own the connection for the duration of one operation and
/// release it when dropped.
pub trait Transport {
    /// Send a command and return the split response
    fn transmit(&mut self, command: &[u8]) -> Result<Response>;

    /// The card's Answer To Reset, used as a UID fallback
    fn atr(&self) -> Result<Vec<u8>>;
}

/// List the names of all readers known to the PC/SC service
pub fn list_readers() -> Result<Vec<String>> {
    let ctx = Context::establish(Scope::User)?;
    let mut buf = [0u8; 2048];
    let readers = ctx.list_readers(&mut buf)?;
    Ok(readers
        .map(|r| r.to_string_lossy().into_owned())
        .collect())
}

/// PC/SC-backed transport for one named reader
pub struct PcscTransport {
    card: pcsc::Card,
}

impl PcscTransport {
    /// Connect to the card currently on the named reader
    ///
    /// Fails with [`CardError::NoReader`] when the name is empty or not
    /// among the readers the PC/SC service reports.
    pub fn connect(reader_name: &str) -> Result<Self> {
        if reader_name.is_empty() {
            return Err(CardError::NoReader("no reader selected".into()));
        }
        let ctx = Context::establish(Scope::User)?;
        let mut buf = [0u8; 2048];
        let readers = ctx.list_readers(&mut buf)?;
        let reader = readers
            .into_iter()
            .find(|r| r.to_string_lossy() == reader_name)
            .ok_or_else(|| CardError::NoReader(reader_name.to_owned()))?;
        let reader = CString::from(reader);

        debug!("connecting to reader {:?}", reader);
        let card = ctx
            .connect(&reader, ShareMode::Shared, Protocols::ANY)
            .map_err(|e| CardError::Connection(e.to_string()))?;
        Ok(Self { card })
    }
}

impl Transport for PcscTransport {
    fn transmit(&mut self, command: &[u8]) -> Result<Response> {
        let mut recv = [0u8; MAX_BUFFER_SIZE];
        let raw = self.card.transmit(command, &mut recv)?;
        let response = Response::from_raw(raw)?;
        debug!(
            "transmit {:02X?} -> sw {:02X} {:02X}",
            &command[..command.len().min(5)],
            response.sw1,
            response.sw2
        );
        Ok(response)
    }

    fn atr(&self) -> Result<Vec<u8>> {
        let mut buf = [0u8; MAX_ATR_SIZE];
        let atr = self.card.get_attribute(Attribute::AtrString, &mut buf)?;
        Ok(atr.to_vec())
    }
}

/// Read the card identifier as uppercase hex
///
/// Tries the direct Get UID pseudo-APDU first; when the reader rejects it,
/// falls back to carving a plausible identifier out of the ATR.
pub fn read_uid<T: Transport>(transport: &mut T) -> Result<String> {
    match transport.transmit(&commands::get_uid()) {
        Ok(response) if response.is_okay() && !response.data.is_empty() => {
            return Ok(hex::encode_upper(&response.data));
        }
        Ok(response) => {
            warn!(
                "direct UID read failed with sw {:02X} {:02X}, using ATR fallback",
                response.sw1, response.sw2
            );
        }
        Err(e) => {
            warn!("direct UID read failed ({}), using ATR fallback", e);
        }
    }
    let atr = transport.atr()?;
    uid_from_atr(&atr).ok_or_else(|| CardError::Connection("card returned an empty ATR".into()))
}

/// Derive a card identifier from ATR bytes
///
/// The most likely UID positions are bytes 1..5, then 4..8; all-zero and
/// all-FF candidates are skipped. Short ATRs fall back to their last four
/// bytes.
pub fn uid_from_atr(atr: &[u8]) -> Option<String> {
    if atr.is_empty() {
        return None;
    }
    if atr.len() >= 8 {
        let candidates = [
            hex::encode_upper(&atr[1..5]),
            hex::encode_upper(&atr[4..8]),
        ];
        for candidate in &candidates {
            if candidate != "00000000" && candidate != "FFFFFFFF" {
                return Some(candidate.clone());
            }
        }
        return Some(candidates[0].clone());
    }
    let hex = hex::encode_upper(atr);
    if hex.len() >= 8 {
        Some(hex[hex.len() - 8..].to_owned())
    } else {
        Some(hex)
    }
}
