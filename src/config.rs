//! Configuration Module
//!
//! Construction-time options for a store, loadable from environment variables.

use std::env;
use std::path::PathBuf;

use crate::crypto::CipherAlgorithm;
use crate::error::{Result, StoreError};

/// Store configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Backing file path
    pub filename: PathBuf,
    /// Whether the backing file is encrypted
    pub encrypt: bool,
    /// Cipher used when encryption is enabled
    pub algorithm: CipherAlgorithm,
    /// Secret key, random when unset
    pub key: Option<Vec<u8>>,
    /// Initialization vector, random when unset
    pub iv: Option<Vec<u8>>,
    /// Whether diagnostics are appended to log files
    pub logs_enabled: bool,
    /// Default log channel file
    pub log_filename: PathBuf,
    /// TTL in seconds for cache entries set without an explicit TTL
    pub cache_ttl: u64,
    /// Seconds between cache expiration sweeps
    pub sweep_interval: u64,
}

impl StoreConfig {
    /// Creates a new StoreConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `TRIX_FILENAME` - Backing file (default: Trix.json)
    /// - `TRIX_ENCRYPT` - Encrypt the backing file (default: true)
    /// - `TRIX_ALGORITHM` - Cipher identifier (default: aes-256-cbc)
    /// - `TRIX_KEY` / `TRIX_IV` - Hex encoded key and iv (default: random)
    /// - `TRIX_LOGS_ENABLED` - Write log files (default: false)
    /// - `TRIX_LOG_FILENAME` - Default log file (default: Trix.log)
    /// - `TRIX_CACHE_TTL` - Default cache TTL in seconds (default: 60)
    /// - `TRIX_SWEEP_INTERVAL` - Sweep frequency in seconds (default: 1)
    ///
    /// Unparseable values fall back to defaults, except `TRIX_KEY` and
    /// `TRIX_IV`: malformed hex there is an error, since a random key would
    /// make an existing file unreadable.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            filename: env::var("TRIX_FILENAME")
                .map(PathBuf::from)
                .unwrap_or(defaults.filename),
            encrypt: env::var("TRIX_ENCRYPT")
                .ok()
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.encrypt),
            algorithm: env::var("TRIX_ALGORITHM")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.algorithm),
            key: hex_var("TRIX_KEY")?,
            iv: hex_var("TRIX_IV")?,
            logs_enabled: env::var("TRIX_LOGS_ENABLED")
                .ok()
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.logs_enabled),
            log_filename: env::var("TRIX_LOG_FILENAME")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_filename),
            cache_ttl: env::var("TRIX_CACHE_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.cache_ttl),
            sweep_interval: env::var("TRIX_SWEEP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.sweep_interval),
        })
    }

    /// Shorthand for a config pointing at `filename` with everything else default.
    pub fn with_filename(filename: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            ..Self::default()
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            filename: PathBuf::from("Trix.json"),
            encrypt: true,
            algorithm: CipherAlgorithm::default(),
            key: None,
            iv: None,
            logs_enabled: false,
            log_filename: PathBuf::from("Trix.log"),
            cache_ttl: 60,
            sweep_interval: 1,
        }
    }
}

fn hex_var(name: &str) -> Result<Option<Vec<u8>>> {
    match env::var(name) {
        Ok(value) => hex::decode(value.trim())
            .map(Some)
            .map_err(|e| StoreError::InvalidConfig(format!("{} is not valid hex: {}", name, e))),
        Err(_) => Ok(None),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = StoreConfig::default();
        assert_eq!(config.filename, PathBuf::from("Trix.json"));
        assert!(config.encrypt);
        assert_eq!(config.algorithm, CipherAlgorithm::Aes256Cbc);
        assert!(config.key.is_none());
        assert!(config.iv.is_none());
        assert!(!config.logs_enabled);
        assert_eq!(config.cache_ttl, 60);
        assert_eq!(config.sweep_interval, 1);
    }

    #[test]
    fn test_config_from_env() {
        env::set_var("TRIX_FILENAME", "from_env.json");
        env::set_var("TRIX_ENCRYPT", "false");
        env::set_var("TRIX_KEY", "00".repeat(32));
        env::set_var("TRIX_SWEEP_INTERVAL", "0");

        let config = StoreConfig::from_env().unwrap();
        assert_eq!(config.filename, PathBuf::from("from_env.json"));
        assert!(!config.encrypt);
        assert_eq!(config.key, Some(vec![0u8; 32]));
        // Zero interval falls back to the default tick
        assert_eq!(config.sweep_interval, 1);

        env::remove_var("TRIX_FILENAME");
        env::remove_var("TRIX_ENCRYPT");
        env::remove_var("TRIX_KEY");
        env::remove_var("TRIX_SWEEP_INTERVAL");
    }

    #[test]
    fn test_malformed_key_hex_is_rejected() {
        env::set_var("TRIX_TEST_BAD_HEX", "abc");
        let result = hex_var("TRIX_TEST_BAD_HEX");
        env::remove_var("TRIX_TEST_BAD_HEX");

        assert!(matches!(result, Err(StoreError::InvalidConfig(_))));
        assert_eq!(hex_var("TRIX_UNSET_FOR_TEST").unwrap(), None);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" 0 "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
