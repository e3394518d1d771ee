//! Token encryption module using AES-256-GCM
//!
//! This module provides the cipher used for refresh tokens and provider app
//! credentials at rest. Each encryption draws a fresh 96-bit random IV; the
//! authentication tag is appended to the ciphertext, so a `(ciphertext, iv)`
//! pair is a complete, self-verifying unit.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

const KEY_LEN: usize = 32;
const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Crypto error types
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("decryption failed")]
    DecryptionFailed,
    #[error("invalid key length: expected {KEY_LEN} bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("invalid IV length: expected {IV_LEN} bytes, got {0}")]
    InvalidIvLength(usize),
    #[error("ciphertext too short to carry an authentication tag")]
    InvalidFormat,
}

/// Secure wrapper for the 256-bit master key with zeroization
#[derive(Debug, Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey(Vec<u8>);

impl MasterKey {
    /// Create a new master key from bytes
    pub fn new(bytes: Vec<u8>) -> Result<Self, CryptoError> {
        if bytes.len() != KEY_LEN {
            return Err(CryptoError::InvalidKeyLength(bytes.len()));
        }
        Ok(MasterKey(bytes))
    }

    /// Get the key as bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Authenticated cipher over the master key.
///
/// Constructed once at startup from configuration and passed by reference;
/// the crypto routines never read ambient state.
#[derive(Debug, Clone)]
pub struct TokenCipher {
    key: MasterKey,
}

impl TokenCipher {
    /// Create a cipher from the master key
    pub fn new(key: MasterKey) -> Self {
        Self { key }
    }

    /// Encrypt a plaintext, returning `(ciphertext || tag, iv)`
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
        let cipher_key = Key::<Aes256Gcm>::from_slice(self.key.as_bytes());
        let cipher = Aes256Gcm::new(cipher_key);

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        Ok((ciphertext, nonce.to_vec()))
    }

    /// Decrypt a `(ciphertext || tag, iv)` pair, rejecting any failed tag
    /// verification
    pub fn decrypt(&self, ciphertext: &[u8], iv: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if iv.len() != IV_LEN {
            return Err(CryptoError::InvalidIvLength(iv.len()));
        }
        if ciphertext.len() < TAG_LEN {
            return Err(CryptoError::InvalidFormat);
        }

        let cipher_key = Key::<Aes256Gcm>::from_slice(self.key.as_bytes());
        let cipher = Aes256Gcm::new(cipher_key);
        let nonce = Nonce::from_slice(iv);

        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)
    }

    /// Decrypt into a UTF-8 string
    pub fn decrypt_string(&self, ciphertext: &[u8], iv: &[u8]) -> Result<String, CryptoError> {
        let bytes = self.decrypt(ciphertext, iv)?;
        String::from_utf8(bytes).map_err(|_| CryptoError::DecryptionFailed)
    }
}
