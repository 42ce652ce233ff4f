//! Sector authentication
//!
//! A single authentication is a two-step exchange: load the key into the
//! reader's volatile slot, then issue general-authenticate against the
//! sector's first block. Operations never try a single key; they walk an
//! ordered candidate list and stop at the first success.

use log::debug;

use crate::apdu::commands;
use crate::card::{sector_base, KeyType, MifareKey, DEFAULT_KEY};
use crate::config::Config;
use crate::error::{CardError, Result};
use crate::transport::Transport;

/// One (key type, key) pair in a fallback list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthCandidate {
    pub key_type: KeyType,
    pub key: MifareKey,
}

impl AuthCandidate {
    pub fn new(key_type: KeyType, key: MifareKey) -> Self {
        Self { key_type, key }
    }
}

/// Authenticate a sector with a single key
///
/// Returns false when the reader rejects either the key load or the
/// authenticate command; a failed candidate leaks no state into the next
/// attempt because every call stages its own key.
pub fn authenticate<T: Transport>(
    transport: &mut T,
    sector: u8,
    key_type: KeyType,
    key: &MifareKey,
) -> Result<bool> {
    let load = transport.transmit(&commands::load_key(key))?;
    if !load.is_okay() {
        debug!("key load rejected for sector {}: sw {:04X}", sector, load.sw());
        return Ok(false);
    }
    let auth = transport.transmit(&commands::authenticate(sector_base(sector), key_type))?;
    Ok(auth.is_okay())
}

/// Try candidates front-to-back, returning the first that authenticates
///
/// Exhausting the list is an [`CardError::AuthExhausted`] for this sector.
pub fn authenticate_any<T: Transport>(
    transport: &mut T,
    sector: u8,
    candidates: &[AuthCandidate],
) -> Result<AuthCandidate> {
    for candidate in candidates {
        if authenticate(transport, sector, candidate.key_type, &candidate.key)? {
            return Ok(*candidate);
        }
    }
    Err(CardError::AuthExhausted { sector })
}

/// Fallback list for reads and dumps: key A then key B, fixed key before
/// the configured one.
pub fn read_candidates(config: &Config) -> Result<Vec<AuthCandidate>> {
    Ok(vec![
        AuthCandidate::new(KeyType::A, DEFAULT_KEY),
        AuthCandidate::new(KeyType::A, config.key_a()?),
        AuthCandidate::new(KeyType::B, DEFAULT_KEY),
        AuthCandidate::new(KeyType::B, config.key_b()?),
    ])
}

/// Fallback list for data-block writes and key rotation: fixed key first
pub fn write_candidates(config: &Config) -> Result<Vec<AuthCandidate>> {
    Ok(vec![
        AuthCandidate::new(KeyType::A, DEFAULT_KEY),
        AuthCandidate::new(KeyType::A, config.key_a()?),
    ])
}

/// Fallback list for key restoration: the configured key is expected to be
/// on the card, so it goes first.
pub fn restore_candidates(config: &Config) -> Result<Vec<AuthCandidate>> {
    Ok(vec![
        AuthCandidate::new(KeyType::A, config.key_a()?),
        AuthCandidate::new(KeyType::A, DEFAULT_KEY),
    ])
}
