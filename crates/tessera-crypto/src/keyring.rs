//! AES-256-GCM with a versioned key ring.
//!
//! Ciphertexts carry the key version that produced them:
//! `v{version}:{nonce_b64}:{ciphertext_b64}`. New data is always encrypted
//! with the highest version; older versions stay in the ring for decryption
//! only.

use std::collections::BTreeMap;

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use tracing::debug;

use tessera_contracts::error::{AuditError, AuditResult};
use tessera_core::traits::EncryptionProvider;

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

fn encryption_error(reason: impl Into<String>) -> AuditError {
    AuditError::Encryption { reason: reason.into() }
}

/// Encryption provider backed by one AES-256-GCM key per version.
pub struct KeyringEncryptor {
    ciphers: BTreeMap<u32, Aes256Gcm>,
    current: u32,
}

impl std::fmt::Debug for KeyringEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyringEncryptor")
            .field("versions", &self.ciphers.keys().collect::<Vec<_>>())
            .field("current", &self.current)
            .finish()
    }
}

impl KeyringEncryptor {
    /// A ring holding a single key as version 1.
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        let mut ciphers = BTreeMap::new();
        ciphers.insert(1, Aes256Gcm::new(&key.into()));
        Self { ciphers, current: 1 }
    }

    /// Build a ring from `(version, base64 key)` pairs. The highest version
    /// becomes current.
    pub fn from_base64_keys<'a>(keys: impl IntoIterator<Item = (u32, &'a str)>) -> AuditResult<Self> {
        let mut ciphers = BTreeMap::new();
        for (version, key_b64) in keys {
            let bytes = BASE64
                .decode(key_b64.trim())
                .map_err(|e| encryption_error(format!("key version {version} is not base64: {e}")))?;
            if bytes.len() != KEY_LEN {
                return Err(encryption_error(format!(
                    "key version {version} has {} bytes, expected {KEY_LEN}",
                    bytes.len()
                )));
            }
            let cipher = Aes256Gcm::new_from_slice(&bytes)
                .map_err(|_| encryption_error(format!("key version {version} rejected")))?;
            ciphers.insert(version, cipher);
        }
        let current = *ciphers
            .keys()
            .next_back()
            .ok_or_else(|| encryption_error("key ring is empty"))?;
        Ok(Self { ciphers, current })
    }

    /// Add a key and make it current.
    pub fn rotate(mut self, version: u32, key: [u8; KEY_LEN]) -> Self {
        self.ciphers.insert(version, Aes256Gcm::new(&key.into()));
        self.current = self.current.max(version);
        self
    }

    pub fn current_version(&self) -> u32 {
        self.current
    }

    /// A fresh random 256-bit key.
    pub fn generate_key() -> [u8; KEY_LEN] {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        key
    }

    pub fn generate_key_base64() -> String {
        BASE64.encode(Self::generate_key())
    }
}

impl EncryptionProvider for KeyringEncryptor {
    fn encrypt(&self, plaintext: &[u8]) -> AuditResult<String> {
        let cipher = self
            .ciphers
            .get(&self.current)
            .ok_or_else(|| encryption_error(format!("no key for version {}", self.current)))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|_| encryption_error("AES-GCM encryption failed"))?;

        Ok(format!(
            "v{}:{}:{}",
            self.current,
            BASE64.encode(nonce_bytes),
            BASE64.encode(ciphertext)
        ))
    }

    fn decrypt(&self, encrypted: &str) -> AuditResult<Vec<u8>> {
        let mut parts = encrypted.trim().splitn(3, ':');
        let (Some(tag), Some(nonce_b64), Some(body_b64)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(encryption_error("ciphertext is not in v<n>:<nonce>:<data> form"));
        };

        let version = tag
            .strip_prefix('v')
            .and_then(|v| v.parse::<u32>().ok())
            .ok_or_else(|| encryption_error(format!("bad version tag '{tag}'")))?;
        let cipher = self
            .ciphers
            .get(&version)
            .ok_or_else(|| encryption_error(format!("no key for version {version}")))?;

        let nonce = BASE64
            .decode(nonce_b64)
            .map_err(|_| encryption_error("nonce is not base64"))?;
        if nonce.len() != NONCE_LEN {
            return Err(encryption_error(format!("nonce has {} bytes", nonce.len())));
        }
        let body = BASE64
            .decode(body_b64)
            .map_err(|_| encryption_error("ciphertext is not base64"))?;

        debug!(version, "decrypting with key ring");
        cipher
            .decrypt(Nonce::from_slice(&nonce), body.as_ref())
            .map_err(|_| encryption_error("authentication failed"))
    }
}
