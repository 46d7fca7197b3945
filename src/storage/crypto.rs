// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Encryption gate for sensitive buckets.
//!
//! The record store only relies on the round-trip contract
//! `decrypt(encrypt(s)) == s`. It never inspects ciphertext beyond its own
//! marker prefix, so any symmetric scheme can sit behind [`CryptoGate`].

use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

/// Errors raised by a [`CryptoGate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("encryption failed")]
    Encrypt,

    #[error("decryption failed")]
    Decrypt,

    #[error("malformed ciphertext: {0}")]
    Malformed(String),
}

/// Symmetric encrypt/decrypt collaborator.
#[async_trait]
pub trait CryptoGate: Send + Sync {
    async fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError>;

    async fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError>;
}

/// AES-256-GCM gate.
///
/// Output format: `base64(nonce || ciphertext || tag)` with a fresh random
/// 96-bit nonce per call.
pub struct AeadCryptoGate {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl AeadCryptoGate {
    /// Build a gate from raw key bytes (must be exactly 32 bytes).
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != KEY_LEN {
            return Err(CryptoError::InvalidKey(format!(
                "expected {KEY_LEN} bytes, got {}",
                key.len()
            )));
        }
        let unbound = UnboundKey::new(&AES_256_GCM, key)
            .map_err(|_| CryptoError::InvalidKey("rejected by AES-256-GCM".to_string()))?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    /// Build a gate from a standard base64-encoded key.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let key = Base64::decode_vec(encoded.trim())
            .map_err(|e| CryptoError::InvalidKey(format!("invalid base64: {e}")))?;
        Self::new(&key)
    }

    /// Generate a fresh random key, base64-encoded.
    pub fn generate_key() -> Result<String, CryptoError> {
        let mut key = [0u8; KEY_LEN];
        SystemRandom::new()
            .fill(&mut key)
            .map_err(|_| CryptoError::InvalidKey("random source unavailable".to_string()))?;
        Ok(Base64::encode_string(&key))
    }
}

#[async_trait]
impl CryptoGate for AeadCryptoGate {
    async fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| CryptoError::Encrypt)?;

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| CryptoError::Encrypt)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&in_out);
        Ok(Base64::encode_string(&sealed))
    }

    async fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        let sealed = Base64::decode_vec(ciphertext)
            .map_err(|e| CryptoError::Malformed(format!("invalid base64: {e}")))?;
        if sealed.len() < NONCE_LEN {
            return Err(CryptoError::Malformed("shorter than nonce".to_string()));
        }

        let (nonce_bytes, body) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| CryptoError::Malformed("bad nonce".to_string()))?;

        let mut in_out = body.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| CryptoError::Decrypt)?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| CryptoError::Malformed("plaintext is not UTF-8".to_string()))
    }
}
