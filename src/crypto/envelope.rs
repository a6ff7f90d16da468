//! Envelope written to the backing file in encrypted mode.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// `{"iv": "<hex>", "encryptedData": "<hex>"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub iv: String,
    pub encrypted_data: String,
}

impl Envelope {
    pub fn new(iv: &[u8], ciphertext: &[u8]) -> Self {
        Self {
            iv: hex::encode(iv),
            encrypted_data: hex::encode(ciphertext),
        }
    }

    /// Decodes the hex iv carried by this envelope.
    pub fn iv_bytes(&self) -> Result<Vec<u8>> {
        Ok(hex::decode(&self.iv)?)
    }

    pub fn ciphertext_bytes(&self) -> Result<Vec<u8>> {
        Ok(hex::decode(&self.encrypted_data)?)
    }
}
