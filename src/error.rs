//! Error types for the store
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Store Error Enum ==
/// Unified error type for the store, cipher and cache layers.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backing file, backup or cache file could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed envelope, bad key/iv length, or decryption failure
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Document or envelope could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Construction-time option is unusable
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Arithmetic operator outside of `+ - * /`
    #[error("Invalid operator: {0}")]
    InvalidOperator(String),
}

impl From<hex::FromHexError> for StoreError {
    fn from(err: hex::FromHexError) -> Self {
        StoreError::Crypto(format!("malformed hex: {}", err))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the store.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_error_maps_to_crypto() {
        let err: StoreError = hex::decode("zz").unwrap_err().into();
        assert!(matches!(err, StoreError::Crypto(_)));
        assert!(err.to_string().starts_with("Crypto error: malformed hex"));
    }

    #[test]
    fn test_io_error_display() {
        let err: StoreError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.to_string(), "I/O error: gone");
    }
}
