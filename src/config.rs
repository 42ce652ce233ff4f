//! Persistent configuration
//!
//! Default keys, access bits, and the key-rotation target block live in a
//! small JSON document. Missing fields are back-filled with the documented
//! defaults on load; saving validates every field first. A process-wide
//! copy sits behind a lock so card operations always see a consistent
//! snapshot.

use std::fs;
use std::path::PathBuf;

use log::{info, warn};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::card::{AccessBits, MifareKey};
use crate::error::{CardError, Result};

fn default_key() -> String {
    "FFFFFFFFFFFF".to_owned()
}

fn default_access_bits() -> String {
    "FF078069".to_owned()
}

fn default_block() -> String {
    "62".to_owned()
}

/// Default keys and target-block choice for card operations
///
/// Fields are kept as hex strings so the JSON document stays compatible
/// with hand-edited files; typed accessors validate on the way out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_key")]
    pub default_key_a: String,
    #[serde(default = "default_key")]
    pub default_key_b: String,
    #[serde(default = "default_access_bits")]
    pub default_access_bits: String,
    #[serde(default = "default_block")]
    pub default_block: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_key_a: default_key(),
            default_key_b: default_key(),
            default_access_bits: default_access_bits(),
            default_block: default_block(),
        }
    }
}

impl Config {
    /// Parsed default key A
    pub fn key_a(&self) -> Result<MifareKey> {
        MifareKey::from_hex(&self.default_key_a)
    }

    /// Parsed default key B
    pub fn key_b(&self) -> Result<MifareKey> {
        MifareKey::from_hex(&self.default_key_b)
    }

    /// Parsed default access bits
    pub fn access_bits(&self) -> Result<AccessBits> {
        AccessBits::from_hex(&self.default_access_bits)
    }

    /// Resolve the configured target block into (sector, trailer block)
    ///
    /// Only blocks 33 and 62 are recognized: 33 selects sector 8 (trailer
    /// 35), 62 selects sector 15 (trailer 63).
    pub fn rotation_target(&self) -> Result<(u8, u8)> {
        let block: u16 = self
            .default_block
            .trim()
            .parse()
            .map_err(|_| CardError::Validation("default block must be a number".into()))?;
        match block {
            33 => Ok((8, 35)),
            62 => Ok((15, 63)),
            other => Err(CardError::Validation(format!(
                "default block must be 33 or 62, got {}",
                other
            ))),
        }
    }

    /// Validate every field, normalizing hex to uppercase
    pub fn validate(&mut self) -> Result<()> {
        let key_a = self.key_a()?;
        let key_b = self.key_b()?;
        let access = self.access_bits()?;
        self.rotation_target()?;
        self.default_key_a = key_a.to_string();
        self.default_key_b = key_b.to_string();
        self.default_access_bits = access.to_string();
        self.default_block = self.default_block.trim().to_owned();
        Ok(())
    }
}

/// Handles persistent storage of the configuration document
pub struct ConfigStore {
    config_file: PathBuf,
    pub config: Config,
}

impl ConfigStore {
    const DEFAULT_CONFIG_FILE: &'static str = "mifare_config.json";

    /// Get the default configuration directory
    fn get_default_config_dir() -> PathBuf {
        // Check environment variable first
        if let Ok(path) = std::env::var("LOCKCARD_CONFIG_DIR") {
            return PathBuf::from(path);
        }
        if let Some(home) = dirs::home_dir() {
            return home.join(".lockcard");
        }
        PathBuf::from(".")
    }

    /// Create a new config store rooted at the given directory
    pub fn new(config_dir: Option<PathBuf>) -> Self {
        let dir = config_dir.unwrap_or_else(Self::get_default_config_dir);
        Self {
            config_file: dir.join(Self::DEFAULT_CONFIG_FILE),
            config: Config::default(),
        }
    }

    /// Load configuration from storage
    ///
    /// Returns true if an existing document was loaded, false if defaults
    /// were used. Unknown or missing fields never fail the load; missing
    /// ones are back-filled by serde defaults.
    pub fn load(&mut self) -> bool {
        if !self.config_file.exists() {
            info!("no existing configuration, using defaults");
            self.config = Config::default();
            return false;
        }
        match fs::read_to_string(&self.config_file) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => {
                    self.config = config;
                    info!("loaded configuration from {:?}", self.config_file);
                    true
                }
                Err(e) => {
                    warn!("failed to parse configuration: {}", e);
                    self.config = Config::default();
                    false
                }
            },
            Err(e) => {
                warn!("failed to read configuration file: {}", e);
                self.config = Config::default();
                false
            }
        }
    }

    /// Save the current configuration to storage
    pub fn save(&self) -> bool {
        if let Some(dir) = self.config_file.parent() {
            if let Err(e) = fs::create_dir_all(dir) {
                warn!("failed to create configuration directory: {}", e);
                return false;
            }
        }
        match serde_json::to_string_pretty(&self.config) {
            Ok(json) => match fs::write(&self.config_file, json) {
                Ok(()) => true,
                Err(e) => {
                    warn!("failed to write configuration file: {}", e);
                    false
                }
            },
            Err(e) => {
                warn!("failed to serialize configuration: {}", e);
                false
            }
        }
    }
}

static SHARED: Lazy<RwLock<Config>> = Lazy::new(|| {
    let mut store = ConfigStore::new(None);
    store.load();
    RwLock::new(store.config)
});

/// Snapshot of the process-wide configuration
///
/// Operations take this snapshot once and never observe a concurrent
/// update mid-flight.
pub fn snapshot() -> Config {
    SHARED.read().clone()
}

/// Validate, persist, and publish a new configuration
pub fn update(mut config: Config) -> Result<Config> {
    config.validate()?;
    let mut store = ConfigStore::new(None);
    store.config = config.clone();
    store.save();
    *SHARED.write() = config.clone();
    Ok(config)
}

/// Reset the configuration to the documented defaults
pub fn reset() -> Config {
    let config = Config::default();
    let mut store = ConfigStore::new(None);
    store.config = config.clone();
    store.save();
    *SHARED.write() = config.clone();
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.default_key_a, "FFFFFFFFFFFF");
        assert_eq!(config.default_key_b, "FFFFFFFFFFFF");
        assert_eq!(config.default_access_bits, "FF078069");
        assert_eq!(config.default_block, "62");
    }

    #[test]
    fn test_missing_fields_backfilled() {
        let config: Config = serde_json::from_str(r#"{"default_block": "33"}"#).unwrap();
        assert_eq!(config.default_key_a, "FFFFFFFFFFFF");
        assert_eq!(config.default_access_bits, "FF078069");
        assert_eq!(config.default_block, "33");
    }

    #[test]
    fn test_rotation_target() {
        let mut config = Config::default();
        assert_eq!(config.rotation_target().unwrap(), (15, 63));
        config.default_block = "33".into();
        assert_eq!(config.rotation_target().unwrap(), (8, 35));
        config.default_block = "40".into();
        assert!(config.rotation_target().is_err());
        config.default_block = "abc".into();
        assert!(config.rotation_target().is_err());
    }

    #[test]
    fn test_validate_normalizes_hex() {
        let mut config = Config {
            default_key_a: "a0a1a2a3a4a5".into(),
            ..Config::default()
        };
        config.validate().unwrap();
        assert_eq!(config.default_key_a, "A0A1A2A3A4A5");
    }

    #[test]
    fn test_validate_rejects_bad_key() {
        let mut config = Config {
            default_key_b: "FFFF".into(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_store_roundtrip() {
        let dir = tempdir().unwrap();
        let mut store = ConfigStore::new(Some(dir.path().to_path_buf()));
        assert!(!store.load());

        store.config.default_block = "33".into();
        assert!(store.save());

        let mut reloaded = ConfigStore::new(Some(dir.path().to_path_buf()));
        assert!(reloaded.load());
        assert_eq!(reloaded.config.default_block, "33");
    }
}
