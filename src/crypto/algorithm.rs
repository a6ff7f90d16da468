//! Cipher algorithm identifiers

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::crypto::IV_SIZE;
use crate::error::StoreError;

/// Supported block cipher modes for the backing file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CipherAlgorithm {
    #[serde(rename = "aes-128-cbc")]
    Aes128Cbc,
    #[serde(rename = "aes-192-cbc")]
    Aes192Cbc,
    /// 256-bit key AES in CBC mode with PKCS#7 padding
    #[default]
    #[serde(rename = "aes-256-cbc")]
    Aes256Cbc,
}

impl CipherAlgorithm {
    /// Identifier string, as accepted by `FromStr`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Aes128Cbc => "aes-128-cbc",
            Self::Aes192Cbc => "aes-192-cbc",
            Self::Aes256Cbc => "aes-256-cbc",
        }
    }

    /// Key size in bytes required for this algorithm
    pub fn key_size(&self) -> usize {
        match self {
            Self::Aes128Cbc => 16,
            Self::Aes192Cbc => 24,
            Self::Aes256Cbc => 32,
        }
    }

    pub fn iv_size(&self) -> usize {
        IV_SIZE
    }
}

impl fmt::Display for CipherAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CipherAlgorithm {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aes-128-cbc" => Ok(Self::Aes128Cbc),
            "aes-192-cbc" => Ok(Self::Aes192Cbc),
            "aes-256-cbc" => Ok(Self::Aes256Cbc),
            other => Err(StoreError::InvalidConfig(format!(
                "unsupported cipher algorithm: {}",
                other
            ))),
        }
    }
}
