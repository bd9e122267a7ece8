//! Registration key obfuscation.
//!
//! Registration keys travel in enrollment confirmation links, so the raw
//! secret is never handed out directly. The codec is deterministic: the same
//! raw key always encodes to the same token, which lets a token be compared
//! or re-issued without storing it.
//!
//! # Format
//!
//! - **Algorithm**: AES-256-GCM with a synthetic nonce
//! - **Key**: SHA-256 of the configured secret
//! - **Nonce**: first 12 bytes of HMAC-SHA256(key, raw key)
//! - **Token**: upper-case hex of `nonce || ciphertext || tag`

use crate::models::RegistrationKey;
use crate::{Error, Result};
use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Nonce size for AES-256-GCM (12 bytes / 96 bits).
const NONCE_SIZE: usize = 12;

/// Authentication tag size appended by AES-GCM.
const TAG_SIZE: usize = 16;

/// Deterministic, reversible codec for registration keys.
#[derive(Clone)]
pub struct RegistrationKeyCodec {
    cipher: Aes256Gcm,
    key: [u8; 32],
}

impl std::fmt::Debug for RegistrationKeyCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationKeyCodec").finish_non_exhaustive()
    }
}

impl RegistrationKeyCodec {
    /// Creates a codec from a configured secret.
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        Self::from_secret(secret.expose_secret())
    }

    /// Creates a codec from a plain secret string.
    #[must_use]
    pub fn from_secret(secret: &str) -> Self {
        let key: [u8; 32] = Sha256::digest(secret.as_bytes()).into();
        let cipher = Aes256Gcm::new(&Key::<Aes256Gcm>::from(key));
        Self { cipher, key }
    }

    /// Encodes a raw registration key into an opaque token.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails.
    pub fn encode(&self, raw: &RegistrationKey) -> Result<String> {
        let nonce_bytes = self.synthetic_nonce(raw.as_str().as_bytes());
        let nonce = Nonce::from(nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(&nonce, raw.as_str().as_bytes())
            .map_err(|e| Error::OperationFailed {
                operation: "encode_registration_key".to_string(),
                cause: format!("AES-256-GCM encryption failed: {e}"),
            })?;

        let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        output.extend_from_slice(&nonce_bytes);
        output.extend_from_slice(&ciphertext);
        Ok(hex::encode_upper(output))
    }

    /// Decodes a token back into the raw registration key.
    ///
    /// A well-formed token for a key that no record carries decodes
    /// successfully; the miss is reported by the lookup, not here.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the token is not hex, too short,
    /// fails authentication, or does not decrypt to UTF-8.
    pub fn decode(&self, token: &str) -> Result<RegistrationKey> {
        let bytes = hex::decode(token.trim())
            .map_err(|e| Error::InvalidInput(format!("Registration key is not hex: {e}")))?;

        let min_size = NONCE_SIZE + TAG_SIZE;
        if bytes.len() < min_size {
            return Err(Error::InvalidInput(format!(
                "Registration key too short: {} bytes, minimum {min_size}",
                bytes.len()
            )));
        }

        let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_SIZE);
        let nonce_array: [u8; NONCE_SIZE] = nonce_bytes
            .try_into()
            .map_err(|_| Error::InvalidInput("Invalid nonce length".to_string()))?;
        let nonce = Nonce::from(nonce_array);

        let plaintext = self.cipher.decrypt(&nonce, ciphertext).map_err(|_| {
            Error::InvalidInput("Registration key failed authentication".to_string())
        })?;

        let raw = String::from_utf8(plaintext)
            .map_err(|e| Error::InvalidInput(format!("Registration key is not UTF-8: {e}")))?;

        Ok(RegistrationKey::new(raw))
    }

    fn synthetic_nonce(&self, plaintext: &[u8]) -> [u8; NONCE_SIZE] {
        // HMAC-SHA256 accepts keys of any length
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.key)
            .unwrap_or_else(|_| unreachable!());
        mac.update(plaintext);
        let digest = mac.finalize().into_bytes();

        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&digest[..NONCE_SIZE]);
        nonce
    }
}
