//! Encryption interface for stream-encrypted WAV output
//!
//! `WavWriter` talks to an arbitrary cipher through the [`Encryptor`] trait so
//! the storage layer never needs to know which AEAD construction is in use.
//! [`Aes256GcmCipher`] is a concrete, fully-functional reference
//! implementation used by tests and by any caller without its own cipher.

use crate::error::CaptureError;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use std::fmt;

/// Seals a plaintext chunk into an opaque, self-describing ciphertext blob.
pub trait Encryptor: Send + Sync {
    /// Encrypt `plaintext`, returning a blob that [`Decryptor::decrypt`] can
    /// invert. The blob's framing (nonce placement, tag, etc.) is entirely
    /// up to the implementation.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CaptureError>;

    /// Human-readable algorithm name recorded in `RecordingMetadata`, e.g.
    /// `"AES-256-GCM"`.
    fn algorithm_name(&self) -> &'static str {
        "unknown"
    }

    /// An opaque, non-secret identifier for the key in use, recorded in
    /// `RecordingMetadata` so a caller can look up which key to fetch for
    /// decryption without the key itself ever touching the recording.
    fn key_id(&self) -> Option<String> {
        None
    }
}

/// Inverts [`Encryptor::encrypt`].
pub trait Decryptor: Send + Sync {
    /// Decrypt a blob previously produced by the matching [`Encryptor`].
    fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>, CaptureError>;
}

const NONCE_LEN: usize = 12;

/// AES-256-GCM cipher producing `nonce (12 bytes) || ciphertext || tag` blobs.
///
/// A fresh random nonce is generated per call to `encrypt`, so the same
/// plaintext never produces the same blob twice.
pub struct Aes256GcmCipher {
    cipher: Aes256Gcm,
    key_id: String,
}

impl fmt::Debug for Aes256GcmCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aes256GcmCipher")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl Aes256GcmCipher {
    /// Build a cipher from a raw 32-byte key, with a caller-supplied opaque
    /// key id (e.g. a key-management-system reference) to surface in
    /// `RecordingMetadata`.
    pub fn with_key_id(key: [u8; 32], key_id: impl Into<String>) -> Self {
        let key = Key::<Aes256Gcm>::from_slice(&key);
        Self {
            cipher: Aes256Gcm::new(key),
            key_id: key_id.into(),
        }
    }

    /// Build a cipher from a raw 32-byte key, deriving a random opaque key id.
    pub fn new(key: [u8; 32]) -> Self {
        Self::with_key_id(key, uuid::Uuid::new_v4().to_string())
    }

    /// Generate a fresh random key and build a cipher from it.
    ///
    /// Returns the cipher alongside the raw key bytes so the caller can
    /// persist the key out-of-band; the cipher itself never exposes it again.
    pub fn generate() -> ([u8; 32], Self) {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        let cipher = Self::new(key);
        (key, cipher)
    }
}

impl Encryptor for Aes256GcmCipher {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CaptureError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| CaptureError::EncryptionFailed(e.to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    fn algorithm_name(&self) -> &'static str {
        "AES-256-GCM"
    }

    fn key_id(&self) -> Option<String> {
        Some(self.key_id.clone())
    }
}

impl Decryptor for Aes256GcmCipher {
    fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>, CaptureError> {
        if blob.len() < NONCE_LEN {
            return Err(CaptureError::EncryptionFailed(
                "blob shorter than nonce length".to_string(),
            ));
        }
        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| CaptureError::EncryptionFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_plaintext() {
        let (_key, cipher) = Aes256GcmCipher::generate();
        let plaintext = b"some pcm bytes, pretend";
        let blob = cipher.encrypt(plaintext).unwrap();
        assert_ne!(blob, plaintext);
        let recovered = cipher.decrypt(&blob).unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn same_plaintext_produces_different_blobs() {
        let (_key, cipher) = Aes256GcmCipher::generate();
        let a = cipher.encrypt(b"same input").unwrap();
        let b = cipher.encrypt(b"same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_tampered_blob() {
        let (_key, cipher) = Aes256GcmCipher::generate();
        let mut blob = cipher.encrypt(b"authenticate me").unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xFF;
        assert!(cipher.decrypt(&blob).is_err());
    }

    #[test]
    fn reports_algorithm_name_and_a_stable_key_id() {
        let (_key, cipher) = Aes256GcmCipher::generate();
        assert_eq!(cipher.algorithm_name(), "AES-256-GCM");
        let id = cipher.key_id().unwrap();
        assert_eq!(cipher.key_id().unwrap(), id);
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let (_key_a, cipher_a) = Aes256GcmCipher::generate();
        let (_key_b, cipher_b) = Aes256GcmCipher::generate();
        let blob = cipher_a.encrypt(b"secret").unwrap();
        assert!(cipher_b.decrypt(&blob).is_err());
    }
}
