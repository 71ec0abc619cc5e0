//! Symmetric sealing of tenant-owned third-party secrets.
//!
//! Records are stored as `hex(nonce):hex(ciphertext)` using AES-256-GCM. The key is
//! derived from one process-wide secret, so every tenant's credentials share it.

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

const NONCE_LEN: usize = 12;

/// An opaque `{nonce, ciphertext}` record in its storage form.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SealedSecret(pub String);

impl fmt::Debug for SealedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SealedSecret(<sealed>)")
    }
}

impl SealedSecret {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecryptionError {
    #[error("sealed record is malformed")]
    Malformed,
    #[error("sealed record is not valid hex")]
    InvalidHex,
    #[error("sealed record failed authentication")]
    Authentication,
    #[error("decrypted payload is not valid UTF-8")]
    InvalidUtf8,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("could not seal secret")]
pub struct EncryptionError;

#[derive(Clone)]
pub struct CredentialVault {
    key: [u8; 32],
}

impl fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialVault").field("key", &"<redacted>").finish()
    }
}

impl CredentialVault {
    pub fn new(secret: &SecretString) -> Self {
        let digest = Sha256::digest(secret.expose_secret().as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self { key }
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key))
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<SealedSecret, EncryptionError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher()
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|_| EncryptionError)?;

        Ok(SealedSecret(format!("{}:{}", hex::encode(nonce_bytes), hex::encode(ciphertext))))
    }

    pub fn decrypt(&self, sealed: &SealedSecret) -> Result<SecretString, DecryptionError> {
        let (nonce_hex, ciphertext_hex) =
            sealed.as_str().split_once(':').ok_or(DecryptionError::Malformed)?;
        let nonce_bytes = hex::decode(nonce_hex).map_err(|_| DecryptionError::InvalidHex)?;
        let ciphertext = hex::decode(ciphertext_hex).map_err(|_| DecryptionError::InvalidHex)?;
        if nonce_bytes.len() != NONCE_LEN || ciphertext.is_empty() {
            return Err(DecryptionError::Malformed);
        }

        let plaintext = self
            .cipher()
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
            .map_err(|_| DecryptionError::Authentication)?;

        String::from_utf8(plaintext).map(SecretString::from).map_err(|_| DecryptionError::InvalidUtf8)
    }

    /// Opens a record that may not be stored. A missing record is `Ok(None)`; a stored
    /// record that fails to open is still an error so callers can report it.
    pub fn decrypt_optional(
        &self,
        sealed: Option<&SealedSecret>,
    ) -> Result<Option<SecretString>, DecryptionError> {
        sealed.map(|sealed| self.decrypt(sealed)).transpose()
    }
}
