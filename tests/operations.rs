//! Operation-level tests against a scripted in-memory card
//!
//! The mock transport speaks the same five pseudo-APDUs as a real reader
//! and keeps its own block store, so every operation can be exercised end
//! to end without hardware.

use std::collections::HashMap;

use lockcard::apdu::Response;
use lockcard::card::{is_trailer, trailer_of, BLOCK_SIZE};
use lockcard::ops::{
    clear_data_blocks_with, clear_setup_blocks_with, dump_card_with, read_lock_number_with,
    restore_trailer_key_with, rotate_trailer_key_with, write_setup_card_with, SetupParams,
};
use lockcard::{Config, Result, Transport};

const SW_FAIL: u16 = 0x6300;

/// How the mock decides whether an authenticate command succeeds
enum AuthRule {
    /// Accept (key type byte, key) pairs listed per sector
    List(HashMap<u8, Vec<(u8, [u8; 6])>>),
    /// Accept whatever keys the sector's trailer block currently holds,
    /// like a real card does
    FromTrailer,
}

struct MockCard {
    blocks: HashMap<u8, [u8; BLOCK_SIZE]>,
    auth_rule: AuthRule,
    loaded_key: Option<[u8; 6]>,
    /// (block, key type, key) per authenticate command, in order
    auth_attempts: Vec<(u8, u8, [u8; 6])>,
    /// successful writes, in order
    writes: Vec<(u8, [u8; BLOCK_SIZE])>,
    /// blocks whose writes the card rejects
    reject_writes: Vec<u8>,
    /// blocks that answer reads with a truncated payload
    short_reads: Vec<u8>,
}

impl MockCard {
    fn new(auth_rule: AuthRule) -> Self {
        Self {
            blocks: HashMap::new(),
            auth_rule,
            loaded_key: None,
            auth_attempts: Vec::new(),
            writes: Vec::new(),
            reject_writes: Vec::new(),
            short_reads: Vec::new(),
        }
    }

    /// Card that accepts the factory key everywhere
    fn factory() -> Self {
        let mut accept = HashMap::new();
        for sector in 0..16 {
            accept.insert(sector, vec![(0x60, [0xFF; 6])]);
        }
        Self::new(AuthRule::List(accept))
    }

    fn set_block(&mut self, block: u8, data: [u8; BLOCK_SIZE]) {
        self.blocks.insert(block, data);
    }

    fn block(&self, block: u8) -> [u8; BLOCK_SIZE] {
        self.blocks.get(&block).copied().unwrap_or([0u8; BLOCK_SIZE])
    }

    fn auth_ok(&self, block: u8, key_type: u8, key: &[u8; 6]) -> bool {
        match &self.auth_rule {
            AuthRule::List(accept) => accept
                .get(&(block / 4))
                .map(|keys| keys.iter().any(|(kt, k)| *kt == key_type && k == key))
                .unwrap_or(false),
            AuthRule::FromTrailer => {
                let trailer = self.block(trailer_of(block / 4));
                match key_type {
                    0x60 => &trailer[0..6] == key,
                    0x61 => &trailer[10..16] == key,
                    _ => false,
                }
            }
        }
    }
}

impl Transport for MockCard {
    fn transmit(&mut self, command: &[u8]) -> Result<Response> {
        match (command[0], command[1]) {
            // load key
            (0xFF, 0x82) => {
                let mut key = [0u8; 6];
                key.copy_from_slice(&command[5..11]);
                self.loaded_key = Some(key);
                Ok(Response::success(Vec::new()))
            }
            // authenticate
            (0xFF, 0x86) => {
                let block = command[7];
                let key_type = command[8];
                let key = self.loaded_key.expect("authenticate before load key");
                self.auth_attempts.push((block, key_type, key));
                if self.auth_ok(block, key_type, &key) {
                    Ok(Response::success(Vec::new()))
                } else {
                    Ok(Response::error(SW_FAIL))
                }
            }
            // read binary
            (0xFF, 0xB0) => {
                let block = command[3];
                let data = self.block(block);
                if self.short_reads.contains(&block) {
                    Ok(Response::success(data[..3].to_vec()))
                } else {
                    Ok(Response::success(data.to_vec()))
                }
            }
            // update binary
            (0xFF, 0xD6) => {
                let block = command[3];
                if self.reject_writes.contains(&block) {
                    return Ok(Response::error(SW_FAIL));
                }
                let mut data = [0u8; BLOCK_SIZE];
                data.copy_from_slice(&command[5..5 + BLOCK_SIZE]);
                self.blocks.insert(block, data);
                self.writes.push((block, data));
                Ok(Response::success(Vec::new()))
            }
            // get uid
            (0xFF, 0xCA) => Ok(Response::success(vec![0x04, 0xA2, 0x13, 0x10])),
            _ => Ok(Response::error(SW_FAIL)),
        }
    }

    fn atr(&self) -> Result<Vec<u8>> {
        Ok(vec![0x3B, 0x04, 0xA2, 0x13, 0x10, 0x11, 0x12, 0x13])
    }
}

fn test_config() -> Config {
    Config {
        default_key_a: "A0A1A2A3A4A5".into(),
        default_key_b: "B0B1B2B3B4B5".into(),
        ..Config::default()
    }
}

fn key(hex: &str) -> [u8; 6] {
    let mut out = [0u8; 6];
    hex::decode_to_slice(hex, &mut out).unwrap();
    out
}

#[test]
fn dump_reports_key_b_sector_and_leaves_others_unread() {
    // only sector 2 authenticates, and only with the configured key B
    let mut accept = HashMap::new();
    accept.insert(2u8, vec![(0x61, key("B0B1B2B3B4B5"))]);
    let mut card = MockCard::new(AuthRule::List(accept));
    card.set_block(8, *b"hello world\0\0\0\0\0");

    let result = dump_card_with(&mut card, &test_config());
    assert!(result.is_success());

    let dump = result.dump.expect("dump payload");
    assert_eq!(dump.len(), 64);
    for block in 0..64u8 {
        if (8..12).contains(&block) {
            assert!(dump[block as usize].is_some(), "block {} should be read", block);
        } else {
            assert!(dump[block as usize].is_none(), "block {} should be unread", block);
        }
    }
    assert!(result
        .log
        .iter()
        .any(|l| l.contains("Authenticated with key B")));
}

#[test]
fn dump_decodes_trailer_blocks() {
    let mut card = MockCard::factory();
    let mut trailer = [0xFFu8; BLOCK_SIZE];
    trailer[6..10].copy_from_slice(&[0xFF, 0x07, 0x80, 0x69]);
    card.set_block(3, trailer);

    let result = dump_card_with(&mut card, &Config::default());
    assert!(result.is_success());
    assert!(result.log.iter().any(|l| l.contains("Key A: FFFFFFFFFFFF")));
    assert!(result
        .log
        .iter()
        .any(|l| l.contains("Access bits: FF078069")));
}

#[test]
fn authenticator_stops_at_first_success() {
    // sector 0 accepts only the configured key B, the fourth read candidate
    let mut accept = HashMap::new();
    accept.insert(0u8, vec![(0x61, key("B0B1B2B3B4B5"))]);
    let mut card = MockCard::new(AuthRule::List(accept));

    dump_card_with(&mut card, &test_config());

    let sector0: Vec<_> = card
        .auth_attempts
        .iter()
        .filter(|(block, _, _)| *block == 0)
        .collect();
    assert_eq!(sector0.len(), 4, "all four candidates tried in order");
    assert_eq!(sector0[0].1, 0x60);
    assert_eq!(sector0[0].2, [0xFF; 6]);
    assert_eq!(sector0[1].2, key("A0A1A2A3A4A5"));
    assert_eq!(sector0[2].1, 0x61);
    assert_eq!(sector0[2].2, [0xFF; 6]);
    assert_eq!(sector0[3].1, 0x61);
    assert_eq!(sector0[3].2, key("B0B1B2B3B4B5"));
}

#[test]
fn wipe_skips_every_trailer_block() {
    let mut card = MockCard::factory();
    let result = clear_data_blocks_with(&mut card, &Config::default());

    assert!(result.is_success());
    assert_eq!(result.cleared, Some(48));
    assert_eq!(result.failed, Some(0));
    assert_eq!(card.writes.len(), 48);
    assert!(card.writes.iter().all(|(block, _)| !is_trailer(*block)));
    assert!(card.writes.iter().all(|(_, data)| data == &[0u8; 16]));
    let skipped = result
        .log
        .iter()
        .filter(|l| l.contains("Skipped trailer block"))
        .count();
    assert_eq!(skipped, 16);
}

#[test]
fn wipe_continues_past_failed_sector() {
    // sector 5 rejects every key; the wipe keeps going
    let mut accept = HashMap::new();
    for sector in 0..16 {
        if sector != 5 {
            accept.insert(sector, vec![(0x60, [0xFF; 6])]);
        }
    }
    let mut card = MockCard::new(AuthRule::List(accept));

    let result = clear_data_blocks_with(&mut card, &Config::default());
    assert!(result.is_success(), "best-effort wipe never hard-fails");
    assert_eq!(result.cleared, Some(45));
    assert_eq!(result.failed, Some(3));
}

#[test]
fn rotate_then_restore_roundtrip() {
    let config = test_config();
    let mut card = MockCard::new(AuthRule::FromTrailer);
    // factory trailer on sector 15
    let mut trailer = [0xFFu8; BLOCK_SIZE];
    trailer[6..10].copy_from_slice(&[0xFF, 0x07, 0x80, 0x69]);
    card.set_block(63, trailer);

    let result = rotate_trailer_key_with(&mut card, &config);
    assert!(result.is_success(), "{:?}", result.error);
    assert!(result
        .log
        .iter()
        .any(|l| l.contains("New key verified for authentication")));
    let rotated = card.block(63);
    assert_eq!(&rotated[0..6], &key("A0A1A2A3A4A5"));
    assert_eq!(&rotated[10..16], &key("B0B1B2B3B4B5"));

    let result = restore_trailer_key_with(&mut card, &config);
    assert!(result.is_success(), "{:?}", result.error);
    assert!(result
        .log
        .iter()
        .any(|l| l.contains("Factory key verified")));
    let restored = card.block(63);
    assert_eq!(&restored[0..6], &[0xFF; 6]);
    assert_eq!(&restored[6..10], &[0xFF, 0x07, 0x80, 0x69]);
    assert_eq!(&restored[10..16], &[0xFF; 6]);
}

#[test]
fn rotate_targets_sector_8_when_block_33_configured() {
    let mut config = test_config();
    config.default_block = "33".into();
    let mut card = MockCard::new(AuthRule::FromTrailer);
    card.set_block(35, [0xFFu8; BLOCK_SIZE]);

    let result = rotate_trailer_key_with(&mut card, &config);
    assert!(result.is_success(), "{:?}", result.error);
    assert_eq!(card.writes[0].0, 35);
}

#[test]
fn rotate_verification_failure_is_only_a_warning() {
    // accept-list card: the write succeeds but the new key still does not
    // authenticate, which the operation reports as a warning
    let mut accept = HashMap::new();
    accept.insert(15u8, vec![(0x60, [0xFF; 6])]);
    let mut card = MockCard::new(AuthRule::List(accept));

    let result = rotate_trailer_key_with(&mut card, &test_config());
    assert!(result.is_success());
    assert!(result
        .log
        .iter()
        .any(|l| l.contains("WARNING: new key does not authenticate")));
}

#[test]
fn rotate_rejects_bad_default_block() {
    let mut config = test_config();
    config.default_block = "40".into();
    let mut card = MockCard::factory();

    let result = rotate_trailer_key_with(&mut card, &config);
    assert!(!result.is_success());
    assert!(result.error.unwrap().contains("33 or 62"));
    assert!(card.writes.is_empty(), "validation happens before any I/O");
}

#[test]
fn setup_card_normal_mode() {
    let mut card = MockCard::factory();
    let params = SetupParams {
        lock_no: 2,
        wait_time: 5,
        sound_mode: 1,
        alarm_mode: 0,
        lock_mode: 0,
        auto_increment: true,
    };

    let result = write_setup_card_with(&mut card, &Config::default(), params);
    assert!(result.is_success(), "{:?}", result.error);
    assert_eq!(result.next_lock_no, Some(3));

    // block 61 first, then block 60
    assert_eq!(card.writes.len(), 2);
    let (block, data) = card.writes[0];
    assert_eq!(block, 61);
    assert_eq!(data[0], 0xAA);
    assert_eq!(data[1], 0x32); // 0x30 | sound bits
    assert_eq!(data[4], 5);
    assert_eq!(&data[6..8], &[0x02, 0x00]); // lock number, little-endian
    assert_eq!(&data[8..14], &[0xFF; 6]);

    let (block, data) = card.writes[1];
    assert_eq!(block, 60);
    assert_eq!(&data[0..7], b"HN19M-1");

    // two independent authentications of sector 15 (base block 60)
    let sector15 = card
        .auth_attempts
        .iter()
        .filter(|(block, _, _)| *block == 60)
        .count();
    assert_eq!(sector15, 2);
}

#[test]
fn setup_card_special_mode() {
    let mut card = MockCard::factory();
    let params = SetupParams {
        lock_no: 3,
        wait_time: 0,
        sound_mode: 0,
        alarm_mode: 0,
        lock_mode: 1,
        auto_increment: false,
    };

    let result = write_setup_card_with(&mut card, &Config::default(), params);
    assert!(result.is_success(), "{:?}", result.error);
    assert_eq!(result.next_lock_no, None);
    assert_eq!(
        hex::encode_upper(card.writes[0].1),
        "AA32AA0206000300".to_owned() + "9F792063F24B3E00"
    );
}

#[test]
fn setup_card_aborts_on_first_write_failure() {
    let mut card = MockCard::factory();
    card.reject_writes.push(61);

    let params = SetupParams {
        lock_no: 1,
        wait_time: 0,
        sound_mode: 0,
        alarm_mode: 0,
        lock_mode: 0,
        auto_increment: true,
    };
    let result = write_setup_card_with(&mut card, &Config::default(), params);
    assert!(!result.is_success());
    assert!(result.next_lock_no.is_none());
    assert!(card.writes.is_empty(), "block 60 never written");
}

#[test]
fn clear_setup_prefers_configured_key() {
    // only the configured key opens sector 15
    let mut accept = HashMap::new();
    accept.insert(15u8, vec![(0x60, key("A0A1A2A3A4A5"))]);
    let mut card = MockCard::new(AuthRule::List(accept));
    card.set_block(61, [0xAAu8; BLOCK_SIZE]);
    card.set_block(60, [0xBBu8; BLOCK_SIZE]);

    let result = clear_setup_blocks_with(&mut card, &test_config());
    assert!(result.is_success(), "{:?}", result.error);
    assert_eq!(card.writes.len(), 2);
    assert_eq!(card.writes[0].0, 61);
    assert_eq!(card.writes[1].0, 60);
    assert_eq!(card.block(60), [0u8; BLOCK_SIZE]);
    assert_eq!(card.block(61), [0u8; BLOCK_SIZE]);
    // configured key tried first, so one attempt per block suffices
    assert_eq!(card.auth_attempts.len(), 2);
    assert_eq!(card.auth_attempts[0].2, key("A0A1A2A3A4A5"));
}

#[test]
fn clear_setup_aborts_when_no_key_works() {
    let mut card = MockCard::new(AuthRule::List(HashMap::new()));
    let result = clear_setup_blocks_with(&mut card, &test_config());
    assert!(!result.is_success());
    assert!(card.writes.is_empty());
}

#[test]
fn read_lock_number_from_byte_4() {
    let mut card = MockCard::factory();
    let mut block = [0u8; BLOCK_SIZE];
    block[4] = 0x05;
    block[8..12].copy_from_slice(b"HN19");
    card.set_block(62, block);

    let result = read_lock_number_with(&mut card, &Config::default());
    assert!(result.is_success(), "{:?}", result.error);
    assert_eq!(result.lock_no, Some(5));
}

#[test]
fn read_lock_number_rejects_short_payload() {
    let mut card = MockCard::factory();
    card.short_reads.push(62);

    let result = read_lock_number_with(&mut card, &Config::default());
    assert!(!result.is_success());
    assert!(result.error.unwrap().contains("short read"));
    assert_eq!(result.lock_no, None);
}
