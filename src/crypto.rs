//! At-rest encryption for free-text health data (injury notes).
//!
//! Stored format: base64(nonce || ciphertext), AES-256-GCM with a random
//! 96-bit nonce per value.

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose, Engine as _};
use rand_core::RngCore;
use thiserror::Error;

const NONCE_LEN: usize = 12;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CryptoError {
    #[error("APP_ENC_KEY must be 32 base64-encoded bytes")]
    InvalidKey,
    #[error("failed to seal value")]
    Seal,
    #[error("failed to open sealed value")]
    Open,
}

#[derive(Clone)]
pub struct NoteCipher {
    cipher: Aes256Gcm,
}

impl NoteCipher {
    pub fn from_env() -> Result<Self, CryptoError> {
        let encoded = std::env::var("APP_ENC_KEY").map_err(|_| CryptoError::InvalidKey)?;
        Self::from_base64_key(&encoded)
    }

    pub fn from_base64_key(encoded: &str) -> Result<Self, CryptoError> {
        let key = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|_| CryptoError::InvalidKey)?;
        if key.len() != 32 {
            return Err(CryptoError::InvalidKey);
        }
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self { cipher })
    }

    pub fn seal(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|_| CryptoError::Seal)?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&sealed);
        Ok(general_purpose::STANDARD.encode(out))
    }

    #[cfg(test)]
    pub(crate) fn open(&self, sealed: &str) -> Result<String, CryptoError> {
        let raw = general_purpose::STANDARD
            .decode(sealed)
            .map_err(|_| CryptoError::Open)?;
        if raw.len() <= NONCE_LEN {
            return Err(CryptoError::Open);
        }
        let (nonce, body) = raw.split_at(NONCE_LEN);
        let plain = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), body)
            .map_err(|_| CryptoError::Open)?;
        String::from_utf8(plain).map_err(|_| CryptoError::Open)
    }

    /// Seals an optional note, skipping blank input.
    pub fn seal_optional(&self, note: Option<&str>) -> Result<Option<String>, CryptoError> {
        match note.map(str::trim).filter(|n| !n.is_empty()) {
            Some(n) => self.seal(n).map(Some),
            None => Ok(None),
        }
    }
}
