//! MIFARE Classic 1K setup-card programmer
//!
//! Programs contactless cards through a PC/SC reader: authenticates memory
//! sectors with candidate keys, dumps card data, zero-wipes data blocks,
//! rotates or restores sector trailer keys, and writes or clears the two
//! fixed setup blocks that encode a physical lock's configuration (lock
//! number, wait time, sound/alarm behavior).
//!
//! The crate is split along the card-access protocol:
//! - [`apdu`]: the pseudo-APDU command set and status-word handling
//! - [`card`]: card geometry, keys, and the binary block layouts
//! - [`transport`]: the PC/SC connection behind the [`Transport`] trait
//! - [`auth`]: the key-fallback authentication algorithm
//! - [`ops`]: the seven high-level operations with their failure policies
//! - [`config`]: the persisted default keys and target-block choice
//!
//! Keys are opaque 6-byte values supplied by the caller or defaults; the
//! card's stream cipher is entirely the reader's business.

pub mod apdu;
pub mod auth;
pub mod card;
pub mod config;
pub mod error;
pub mod ops;
pub mod transport;

pub use config::Config;
pub use error::{CardError, Result};
pub use ops::{OperationResult, OperationStatus, SetupParams};
pub use transport::{list_readers, read_uid, PcscTransport, Transport};
