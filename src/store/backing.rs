//! Backing File Module
//!
//! Full-document load and save, through the cipher when encryption is on.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::crypto::{Cipher, Envelope};
use crate::error::{Result, StoreError};
use crate::value::Document;

// == Backing File ==
/// The single file holding the serialized document.
///
/// Opened fresh on every load and save. Every save rewrites the whole file,
/// so a crash mid-write can leave it truncated.
#[derive(Debug)]
pub struct BackingFile {
    path: PathBuf,
    encrypt: bool,
    cipher: Cipher,
}

impl BackingFile {
    pub fn new(path: impl Into<PathBuf>, encrypt: bool, cipher: Cipher) -> Self {
        Self {
            path: path.into(),
            encrypt,
            cipher,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypt
    }

    /// Switches modes without touching the file on disk.
    pub fn set_encrypted(&mut self, encrypt: bool) {
        self.encrypt = encrypt;
    }

    pub fn cipher(&self) -> &Cipher {
        &self.cipher
    }

    pub fn cipher_mut(&mut self) -> &mut Cipher {
        &mut self.cipher
    }

    // == Load ==
    /// Reads and parses the file, creating it with an empty document when absent.
    pub fn load(&self) -> Result<Document> {
        if !self.path.exists() {
            let doc = Document::new();
            self.save(&doc)?;
            info!("Initialized empty store at {}", self.path.display());
            return Ok(doc);
        }

        let raw = fs::read_to_string(&self.path)?;
        let plaintext = if self.encrypt {
            self.decrypt(&raw)?
        } else {
            raw
        };

        let doc: Document = serde_json::from_str(&plaintext)?;
        debug!("Loaded {} keys from {}", doc.len(), self.path.display());
        Ok(doc)
    }

    // == Save ==
    /// Serializes `doc` (pretty, 2-space indent), encrypts if enabled, and
    /// replaces the file contents.
    pub fn save(&self, doc: &Document) -> Result<()> {
        let json = serde_json::to_string_pretty(doc)?;
        let contents = if self.encrypt {
            let envelope = self.cipher.encrypt(json.as_bytes())?;
            serde_json::to_string_pretty(&envelope)?
        } else {
            json
        };

        fs::write(&self.path, contents)?;
        debug!("Data saved to {}", self.path.display());
        Ok(())
    }

    fn decrypt(&self, raw: &str) -> Result<String> {
        let envelope: Envelope = serde_json::from_str(raw)
            .map_err(|e| StoreError::Crypto(format!("malformed envelope: {}", e)))?;
        let plaintext = self.cipher.decrypt(&envelope)?;
        String::from_utf8(plaintext)
            .map_err(|_| StoreError::Crypto("decrypted data is not valid UTF-8".into()))
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{CipherAlgorithm, CipherMaterial};
    use crate::value::Value;

    fn cipher() -> Cipher {
        Cipher::new(
            CipherMaterial::new(vec![3u8; 32], vec![4u8; 16], CipherAlgorithm::Aes256Cbc).unwrap(),
        )
    }

    fn sample() -> Document {
        let mut doc = Document::new();
        doc.insert("count".to_string(), Value::from(5));
        doc
    }

    #[test]
    fn test_missing_file_is_initialized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Trix.json");
        let file = BackingFile::new(&path, false, cipher());

        let doc = file.load().unwrap();

        assert!(doc.is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn test_plain_file_is_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.json");
        let file = BackingFile::new(&path, false, cipher());

        file.save(&sample()).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "{\n  \"count\": 5\n}");
        assert_eq!(file.load().unwrap(), sample());
    }

    #[test]
    fn test_encrypted_file_is_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret.json");
        let file = BackingFile::new(&path, true, cipher());

        file.save(&sample()).unwrap();

        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["iv"].as_str().unwrap(), "04".repeat(16));
        assert!(raw["encryptedData"].as_str().unwrap().len() % 32 == 0);
        assert_eq!(file.load().unwrap(), sample());
    }

    #[test]
    fn test_envelope_without_iv_is_crypto_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, r#"{"encryptedData": "00"}"#).unwrap();
        let file = BackingFile::new(&path, true, cipher());

        assert!(matches!(file.load(), Err(StoreError::Crypto(_))));
    }

    #[test]
    fn test_plain_file_read_in_encrypted_mode_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mode.json");
        let mut file = BackingFile::new(&path, false, cipher());
        file.save(&sample()).unwrap();

        file.set_encrypted(true);
        assert!(file.load().is_err());
    }
}
