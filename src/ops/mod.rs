//! Card operations
//!
//! The orchestrator: composes the transport, the authenticator, and the
//! block codecs into the seven public operations. Every operation follows
//! the same skeleton: connect, then per unit authenticate-with-fallback and
//! read/write, then disconnect. The transport is owned by the operation
//! scope, so disconnect happens on every exit path.
//!
//! Dump and data-wipe are best-effort: a unit that fails is logged and the
//! loop moves on. Key rotation/restoration and the setup-block operations
//! are fail-fast: the first hard error aborts and becomes the result's
//! error message. No operation lets an error escape its boundary.

mod result;

pub use result::{OperationResult, OperationStatus};

use log::info;

use crate::apdu::commands;
use crate::auth::{
    authenticate, authenticate_any, read_candidates, restore_candidates, write_candidates,
    AuthCandidate,
};
use crate::card::{
    self, encode_setup_normal, encode_setup_special, identifier_block, is_trailer, sector_of,
    to_hex_string, KeyType, TrailerBlock, BLOCK_COUNT, BLOCK_SIZE, DEFAULT_KEY, IDENTIFIER_BLOCK,
    LOCK_NUMBER_BLOCK, SECTOR_COUNT, SETUP_BLOCK,
};
use crate::config::Config;
use crate::error::{CardError, Result};
use crate::transport::{PcscTransport, Transport};

/// How an operation reacts to a failed unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log the failure, count it, continue with the next unit
    BestEffort,
    /// Abort the operation on the first hard error
    FailFast,
}

/// Whether an error is confined to one unit of work
///
/// Auth exhaustion and a rejected command only spoil the current block or
/// sector; everything else (lost connection, short response) is fatal even
/// for best-effort operations.
fn is_unit_error(err: &CardError) -> bool {
    matches!(
        err,
        CardError::AuthExhausted { .. } | CardError::Transmission { .. }
    )
}

/// Apply the operation's failure policy to a per-unit error
fn apply_policy(
    policy: FailurePolicy,
    result: &mut OperationResult,
    context: &str,
    err: CardError,
) -> Result<()> {
    if !is_unit_error(&err) {
        return Err(err);
    }
    match policy {
        FailurePolicy::BestEffort => {
            result.log(format!("{}: {}", context, err));
            *result.failed.get_or_insert(0) += 1;
            Ok(())
        }
        FailurePolicy::FailFast => Err(err),
    }
}

/// Read one 16-byte block; a non-success status is a transmission error
fn read_block<T: Transport>(transport: &mut T, block: u8) -> Result<Vec<u8>> {
    let response = transport.transmit(&commands::read_block(block))?;
    if !response.is_okay() {
        return Err(CardError::transmission(response.sw1, response.sw2));
    }
    Ok(response.data)
}

/// Write one 16-byte block; a non-success status is a transmission error
fn write_block<T: Transport>(transport: &mut T, block: u8, data: &[u8; BLOCK_SIZE]) -> Result<()> {
    let response = transport.transmit(&commands::write_block(block, data))?;
    if !response.is_okay() {
        return Err(CardError::transmission(response.sw1, response.sw2));
    }
    Ok(())
}

/// Authenticate and zero one block under the operation's failure policy
///
/// Shared by the data wipe (best-effort) and the setup clear (fail-fast).
fn zero_block<T: Transport>(
    transport: &mut T,
    result: &mut OperationResult,
    candidates: &[AuthCandidate],
    block: u8,
    policy: FailurePolicy,
) -> Result<()> {
    let context = format!("Block {}", block);
    match authenticate_any(transport, sector_of(block), candidates) {
        Ok(used) => result.log(format!(
            "Authentication for block {} succeeded ({})",
            block, used.key
        )),
        Err(err) => return apply_policy(policy, result, &context, err),
    }
    match write_block(transport, block, &[0u8; BLOCK_SIZE]) {
        Ok(()) => {
            result.log(format!("Block {} cleared", block));
            *result.cleared.get_or_insert(0) += 1;
            Ok(())
        }
        Err(err) => apply_policy(policy, result, &context, err),
    }
}

/// Connect to the named reader and run one operation against it
///
/// The transport is dropped (and the connection released) whichever way
/// the operation ends.
fn run<F>(reader: &str, op: F) -> OperationResult
where
    F: FnOnce(&mut PcscTransport) -> OperationResult,
{
    match PcscTransport::connect(reader) {
        Ok(mut transport) => op(&mut transport),
        Err(e) => OperationResult::new().fail(format!("failed to connect to reader: {}", e)),
    }
}

/// Dump all 64 blocks of the card
///
/// Each sector is authenticated with the read fallback list; sectors where
/// every candidate fails are recorded as unread and the dump continues.
pub fn dump_card(reader: &str, config: &Config) -> OperationResult {
    run(reader, |t| dump_card_with(t, config))
}

pub fn dump_card_with<T: Transport>(transport: &mut T, config: &Config) -> OperationResult {
    let mut result = OperationResult::new();
    match dump_inner(transport, config, &mut result) {
        Ok(()) => result,
        Err(e) => result.fail(e),
    }
}

fn dump_inner<T: Transport>(
    transport: &mut T,
    config: &Config,
    result: &mut OperationResult,
) -> Result<()> {
    let candidates = read_candidates(config)?;
    let mut dump: Vec<Option<String>> = vec![None; BLOCK_COUNT as usize];

    for sector in 0..SECTOR_COUNT {
        result.log(format!("--- Sector {} ---", sector));
        let used = match authenticate_any(transport, sector, &candidates) {
            Ok(candidate) => candidate,
            Err(err) => {
                apply_policy(
                    FailurePolicy::BestEffort,
                    result,
                    &format!("sector {}", sector),
                    err,
                )?;
                // all four blocks of this sector stay unread
                continue;
            }
        };
        result.log(format!(
            "Authenticated with key {} ({})",
            used.key_type, used.key
        ));

        for offset in 0..card::BLOCKS_PER_SECTOR {
            let block = sector * card::BLOCKS_PER_SECTOR + offset;
            match read_block(transport, block) {
                Ok(data) => {
                    let hex = to_hex_string(&data);
                    result.log(format!("Block {:02}: {}", block, hex));
                    if is_trailer(block) && data.len() == BLOCK_SIZE {
                        let mut bytes = [0u8; BLOCK_SIZE];
                        bytes.copy_from_slice(&data);
                        let trailer = TrailerBlock::from_bytes(&bytes);
                        result.log(format!("  Key A: {}", trailer.key_a));
                        result.log(format!("  Access bits: {}", trailer.access_bits));
                        result.log(format!("  Key B: {}", trailer.key_b));
                    }
                    dump[block as usize] = Some(hex);
                }
                Err(err) => apply_policy(
                    FailurePolicy::BestEffort,
                    result,
                    &format!("Block {:02}", block),
                    err,
                )?,
            }
        }
    }
    result.log("--- Dump complete ---".to_owned());
    result.dump = Some(dump);
    Ok(())
}

/// Overwrite every data block with zeros
///
/// Trailer blocks (index % 4 == 3) are never touched. Per-block failures
/// are tallied and the wipe continues.
pub fn clear_data_blocks(reader: &str, config: &Config) -> OperationResult {
    run(reader, |t| clear_data_blocks_with(t, config))
}

pub fn clear_data_blocks_with<T: Transport>(
    transport: &mut T,
    config: &Config,
) -> OperationResult {
    let mut result = OperationResult::new();
    match clear_data_inner(transport, config, &mut result) {
        Ok(()) => result,
        Err(e) => result.fail(e),
    }
}

fn clear_data_inner<T: Transport>(
    transport: &mut T,
    config: &Config,
    result: &mut OperationResult,
) -> Result<()> {
    let candidates = write_candidates(config)?;
    result.log("Starting wipe of all data blocks".to_owned());
    result.log(format!("Fill pattern: {}", to_hex_string(&[0u8; BLOCK_SIZE])));
    result.cleared = Some(0);
    result.failed = Some(0);

    for block in 0..BLOCK_COUNT {
        if is_trailer(block) {
            result.log(format!(
                "Skipped trailer block {} (sector {})",
                block,
                sector_of(block)
            ));
            continue;
        }
        zero_block(
            transport,
            result,
            &candidates,
            block,
            FailurePolicy::BestEffort,
        )?;
    }
    result.log(format!(
        "Wipe finished. Cleared: {}, errors: {}",
        result.cleared.unwrap_or(0),
        result.failed.unwrap_or(0)
    ));
    Ok(())
}

/// Write the configured keys and access bits into the target trailer block
///
/// The target sector comes from the configured default block (33 or 62).
/// After a successful write the new key A is checked with a fresh
/// authentication; a failed check is reported as a warning only, since the
/// write itself already succeeded.
pub fn rotate_trailer_key(reader: &str, config: &Config) -> OperationResult {
    run(reader, |t| rotate_trailer_key_with(t, config))
}

pub fn rotate_trailer_key_with<T: Transport>(
    transport: &mut T,
    config: &Config,
) -> OperationResult {
    let mut result = OperationResult::new();
    match rotate_inner(transport, config, &mut result) {
        Ok(()) => result,
        Err(e) => result.fail(e),
    }
}

fn rotate_inner<T: Transport>(
    transport: &mut T,
    config: &Config,
    result: &mut OperationResult,
) -> Result<()> {
    let (sector, trailer_block) = config.rotation_target()?;
    let key_a = config.key_a()?;
    let key_b = config.key_b()?;
    let access_bits = config.access_bits()?;
    let data = TrailerBlock::new(key_a, access_bits, key_b).to_bytes();

    result.log(format!(
        "Writing trailer block {} (sector {})",
        trailer_block, sector
    ));
    result.log(format!("Data: {}", to_hex_string(&data)));
    result.log(format!("New key A: {}", key_a));

    let used = authenticate_any(transport, sector, &write_candidates(config)?)?;
    result.log(format!("Authenticated with key ({})", used.key));

    write_block(transport, trailer_block, &data)?;
    result.log(format!("Trailer written to block {}", trailer_block));
    result.log(format!("Key A: {}", key_a));
    result.log(format!("Access bits: {}", access_bits));
    result.log(format!("Key B: {}", key_b));

    // The write stuck even if this check fails, so it is only a warning.
    if authenticate(transport, sector, KeyType::A, &key_a)? {
        result.log("New key verified for authentication".to_owned());
        info!("sector {} rotated to configured key", sector);
    } else {
        result.log("WARNING: new key does not authenticate".to_owned());
    }
    Ok(())
}

/// Restore the well-known FFFFFFFFFFFF key pair on the target trailer
///
/// Mirror image of [`rotate_trailer_key`]: the configured key is expected
/// on the card, so it is tried first, and verification uses the fixed key.
pub fn restore_trailer_key(reader: &str, config: &Config) -> OperationResult {
    run(reader, |t| restore_trailer_key_with(t, config))
}

pub fn restore_trailer_key_with<T: Transport>(
    transport: &mut T,
    config: &Config,
) -> OperationResult {
    let mut result = OperationResult::new();
    match restore_inner(transport, config, &mut result) {
        Ok(()) => result,
        Err(e) => result.fail(e),
    }
}

fn restore_inner<T: Transport>(
    transport: &mut T,
    config: &Config,
    result: &mut OperationResult,
) -> Result<()> {
    let (sector, trailer_block) = config.rotation_target()?;
    let access_bits = config.access_bits()?;
    let data = TrailerBlock::new(DEFAULT_KEY, access_bits, DEFAULT_KEY).to_bytes();

    result.log(format!(
        "Restoring factory keys in block {} (sector {})",
        trailer_block, sector
    ));
    result.log(format!("Data: {}", to_hex_string(&data)));

    let used = authenticate_any(transport, sector, &restore_candidates(config)?)?;
    result.log(format!("Authenticated with key ({})", used.key));

    write_block(transport, trailer_block, &data)?;
    result.log(format!("Factory keys written to block {}", trailer_block));
    result.log(format!("Key A: {}", DEFAULT_KEY));
    result.log(format!("Access bits: {}", access_bits));
    result.log(format!("Key B: {}", DEFAULT_KEY));

    if authenticate(transport, sector, KeyType::A, &DEFAULT_KEY)? {
        result.log("Factory key verified for authentication".to_owned());
    } else {
        result.log("WARNING: factory key does not authenticate".to_owned());
    }
    Ok(())
}

/// Parameters for [`write_setup_card`]
#[derive(Debug, Clone, Copy)]
pub struct SetupParams {
    pub lock_no: u32,
    pub wait_time: u8,
    /// 0 none, 1..3 select the sound bit patterns
    pub sound_mode: u8,
    /// 0 none, 1..2 select the alarm bit patterns
    pub alarm_mode: u8,
    /// 0 writes the normal-mode record, anything else the special template
    pub lock_mode: u8,
    /// When set, the result carries lock_no + 1 as the next value
    pub auto_increment: bool,
}

/// Write the two setup blocks encoding a physical lock configuration
///
/// Block 61 carries the packed record (normal mode) or the fixed special
/// template; block 60 carries the identifier template. Each write gets its
/// own authentication of sector 15, and the first failure aborts.
pub fn write_setup_card(reader: &str, config: &Config, params: SetupParams) -> OperationResult {
    run(reader, |t| write_setup_card_with(t, config, params))
}

pub fn write_setup_card_with<T: Transport>(
    transport: &mut T,
    config: &Config,
    params: SetupParams,
) -> OperationResult {
    let mut result = OperationResult::new();
    match write_setup_inner(transport, config, params, &mut result) {
        Ok(()) => result,
        Err(e) => result.fail(e),
    }
}

fn write_setup_inner<T: Transport>(
    transport: &mut T,
    config: &Config,
    params: SetupParams,
    result: &mut OperationResult,
) -> Result<()> {
    // Setup cards always use the fixed transport key as their password.
    let password = DEFAULT_KEY;
    result.log(format!("Using fixed password: {}", password));

    let block_61 = if params.lock_mode == 0 {
        let record = encode_setup_normal(
            (params.lock_no & 0xFFFF) as u16,
            params.wait_time,
            params.sound_mode,
            params.alarm_mode,
            &password,
        );
        result.log(format!(
            "Normal mode record for block {}: {}",
            SETUP_BLOCK,
            to_hex_string(&record)
        ));
        record
    } else {
        let record = encode_setup_special((params.lock_no & 0xFF) as u8);
        result.log(format!(
            "Special mode record for block {}: {}",
            SETUP_BLOCK,
            to_hex_string(&record)
        ));
        record
    };
    let block_60 = identifier_block();
    result.log(format!(
        "Identifier block {}: {}",
        IDENTIFIER_BLOCK,
        to_hex_string(&block_60)
    ));

    // Each write is a separate transmit, so each gets its own auth even
    // though both blocks share the sector 15 trailer.
    let candidates = write_candidates(config)?;
    for (block, data) in [(SETUP_BLOCK, block_61), (IDENTIFIER_BLOCK, block_60)] {
        authenticate_any(transport, sector_of(block), &candidates)?;
        result.log(format!("Authentication for block {} succeeded", block));
        write_block(transport, block, &data)?;
        result.log(format!("Block {} written", block));
    }

    result.log(format!("Setup card written, lock {}", params.lock_no));
    if params.auto_increment {
        result.next_lock_no = Some(params.lock_no + 1);
    }
    Ok(())
}

/// Zero both setup blocks
///
/// The configured key is tried before the fixed key for each block; the
/// first failure aborts.
pub fn clear_setup_blocks(reader: &str, config: &Config) -> OperationResult {
    run(reader, |t| clear_setup_blocks_with(t, config))
}

pub fn clear_setup_blocks_with<T: Transport>(
    transport: &mut T,
    config: &Config,
) -> OperationResult {
    let mut result = OperationResult::new();
    match clear_setup_inner(transport, config, &mut result) {
        Ok(()) => result,
        Err(e) => result.fail(e),
    }
}

fn clear_setup_inner<T: Transport>(
    transport: &mut T,
    config: &Config,
    result: &mut OperationResult,
) -> Result<()> {
    let candidates = restore_candidates(config)?;
    result.log(format!(
        "Clearing blocks {} and {}",
        SETUP_BLOCK, IDENTIFIER_BLOCK
    ));
    result.log(format!("Fill pattern: {}", to_hex_string(&[0u8; BLOCK_SIZE])));

    for block in [SETUP_BLOCK, IDENTIFIER_BLOCK] {
        zero_block(transport, result, &candidates, block, FailurePolicy::FailFast)?;
    }
    Ok(())
}

/// Read the lock number stored at byte offset 4 of block 62
pub fn read_lock_number(reader: &str, config: &Config) -> OperationResult {
    run(reader, |t| read_lock_number_with(t, config))
}

pub fn read_lock_number_with<T: Transport>(
    transport: &mut T,
    config: &Config,
) -> OperationResult {
    let mut result = OperationResult::new();
    match read_lock_inner(transport, config, &mut result) {
        Ok(()) => result,
        Err(e) => result.fail(e),
    }
}

fn read_lock_inner<T: Transport>(
    transport: &mut T,
    config: &Config,
    result: &mut OperationResult,
) -> Result<()> {
    result.log(format!("Reading lock number from block {}", LOCK_NUMBER_BLOCK));
    let sector = sector_of(LOCK_NUMBER_BLOCK);
    let used = authenticate_any(transport, sector, &write_candidates(config)?)?;
    result.log(format!("Authenticated with key ({})", used.key));

    let data = read_block(transport, LOCK_NUMBER_BLOCK)?;
    result.log(format!(
        "Block {} data: {}",
        LOCK_NUMBER_BLOCK,
        to_hex_string(&data)
    ));
    if data.len() < 5 {
        return Err(CardError::ShortRead {
            block: LOCK_NUMBER_BLOCK,
            len: data.len(),
        });
    }
    let lock_no = data[4];
    result.log(format!("Lock number (byte 4): {}", lock_no));
    result.log(format!("  Byte: 0x{:02X} ({})", lock_no, lock_no));
    result.lock_no = Some(lock_no);
    Ok(())
}
