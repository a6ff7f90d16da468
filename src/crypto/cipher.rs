//! Cipher Module
//!
//! CBC encryption of the whole serialized document under a single key/iv pair.

use std::fmt;

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::{Aes128, Aes192, Aes256};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{CipherAlgorithm, Envelope};
use crate::error::{Result, StoreError};

// == Cipher Material ==
/// Key, iv and algorithm owned by a single store instance.
///
/// The iv is reused for every encryption of the document until it is rotated.
/// Identical plaintext prefixes therefore produce identical ciphertext prefixes.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct CipherMaterial {
    key: Vec<u8>,
    iv: Vec<u8>,
    #[zeroize(skip)]
    algorithm: CipherAlgorithm,
}

impl CipherMaterial {
    /// Creates material after checking key and iv lengths against `algorithm`.
    pub fn new(key: Vec<u8>, iv: Vec<u8>, algorithm: CipherAlgorithm) -> Result<Self> {
        check_lengths(&key, &iv, algorithm)?;
        Ok(Self { key, iv, algorithm })
    }

    /// Generates a random key and iv sized for `algorithm`.
    pub fn generate(algorithm: CipherAlgorithm) -> Self {
        let mut key = vec![0u8; algorithm.key_size()];
        let mut iv = vec![0u8; algorithm.iv_size()];
        OsRng.fill_bytes(&mut key);
        OsRng.fill_bytes(&mut iv);
        Self { key, iv, algorithm }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    pub fn algorithm(&self) -> CipherAlgorithm {
        self.algorithm
    }
}

impl fmt::Debug for CipherMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherMaterial")
            .field("key", &"<redacted>")
            .field("iv", &hex::encode(&self.iv))
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

fn check_lengths(key: &[u8], iv: &[u8], algorithm: CipherAlgorithm) -> Result<()> {
    if key.len() != algorithm.key_size() {
        return Err(StoreError::Crypto(format!(
            "{} requires a {}-byte key, got {} bytes",
            algorithm,
            algorithm.key_size(),
            key.len()
        )));
    }
    if iv.len() != algorithm.iv_size() {
        return Err(StoreError::Crypto(format!(
            "{} requires a {}-byte iv, got {} bytes",
            algorithm,
            algorithm.iv_size(),
            iv.len()
        )));
    }
    Ok(())
}

// == Cipher ==
/// Encrypts plaintext into an [`Envelope`] and back.
#[derive(Debug)]
pub struct Cipher {
    material: CipherMaterial,
}

impl Cipher {
    pub fn new(material: CipherMaterial) -> Self {
        Self { material }
    }

    pub fn material(&self) -> &CipherMaterial {
        &self.material
    }

    // == Encrypt ==
    /// Encrypts `plaintext` with the active key and iv.
    ///
    /// Deterministic: the same key, iv and plaintext always give the same envelope.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Envelope> {
        let CipherMaterial { key, iv, algorithm } = &self.material;
        check_lengths(key, iv, *algorithm)?;

        let ciphertext = match algorithm {
            CipherAlgorithm::Aes128Cbc => cbc::Encryptor::<Aes128>::new_from_slices(key, iv)
                .map_err(|e| StoreError::Crypto(e.to_string()))?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
            CipherAlgorithm::Aes192Cbc => cbc::Encryptor::<Aes192>::new_from_slices(key, iv)
                .map_err(|e| StoreError::Crypto(e.to_string()))?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
            CipherAlgorithm::Aes256Cbc => cbc::Encryptor::<Aes256>::new_from_slices(key, iv)
                .map_err(|e| StoreError::Crypto(e.to_string()))?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        };

        Ok(Envelope::new(iv, &ciphertext))
    }

    // == Decrypt ==
    /// Decrypts `envelope` with the active key and the iv carried in the envelope.
    ///
    /// CBC is unauthenticated: a wrong key is usually caught by the padding
    /// check, but corrupted ciphertext can still decrypt to garbage.
    pub fn decrypt(&self, envelope: &Envelope) -> Result<Vec<u8>> {
        let iv = envelope.iv_bytes()?;
        let ciphertext = envelope.ciphertext_bytes()?;
        let key = &self.material.key;
        let algorithm = self.material.algorithm;
        check_lengths(key, &iv, algorithm)?;

        let padding_error = |_| StoreError::Crypto("decryption failed: bad key or corrupted data".into());

        match algorithm {
            CipherAlgorithm::Aes128Cbc => cbc::Decryptor::<Aes128>::new_from_slices(key, &iv)
                .map_err(|e| StoreError::Crypto(e.to_string()))?
                .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
                .map_err(padding_error),
            CipherAlgorithm::Aes192Cbc => cbc::Decryptor::<Aes192>::new_from_slices(key, &iv)
                .map_err(|e| StoreError::Crypto(e.to_string()))?
                .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
                .map_err(padding_error),
            CipherAlgorithm::Aes256Cbc => cbc::Decryptor::<Aes256>::new_from_slices(key, &iv)
                .map_err(|e| StoreError::Crypto(e.to_string()))?
                .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
                .map_err(padding_error),
        }
    }

    // == Rotate ==
    /// Replaces the key and iv. Existing ciphertext is not re-encrypted.
    pub fn rotate(&mut self, key: Vec<u8>, iv: Vec<u8>) -> Result<()> {
        self.material = CipherMaterial::new(key, iv, self.material.algorithm)?;
        Ok(())
    }
}
