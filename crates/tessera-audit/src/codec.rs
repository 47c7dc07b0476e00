//! Comment encoding at rest, and decoding of every stored version.
//!
//! | version | encrypted | stored form                         |
//! |---------|-----------|-------------------------------------|
//! | 0       | yes       | legacy mcrypt ciphertext            |
//! | 1, 2    | yes       | legacy openssl ciphertext           |
//! | ≥ 3     | yes       | current provider ciphertext         |
//! | < 4     | no        | raw text                            |
//! | 4       | no        | base64 of free text                 |
//! | 5       | no        | base64 of a JSON `CommentPayload`   |
//!
//! New rows are written as version 4 (free text) or 5 (structured). The
//! legacy ciphers are read-only formats this engine does not implement; such
//! rows decode to a placeholder rather than failing the read.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tracing::debug;

use tessera_contracts::{
    comment::{CommentPayload, STRUCTURED_COMMENT_VERSION},
    error::{AuditError, AuditResult},
};
use tessera_core::traits::EncryptionProvider;

pub const DECRYPT_FAILED: &str = "Unable to decrypt these comments since decryption failed.";
pub const NO_PROVIDER: &str =
    "Unable to decrypt these comments since no encryption provider is configured.";
pub const LEGACY_OPENSSL_UNAVAILABLE: &str =
    "Unable to decrypt these comments since the legacy openssl decryptor is not available.";
pub const LEGACY_MCRYPT_UNAVAILABLE: &str =
    "Unable to decrypt these comments since the legacy mcrypt decryptor is not available.";

/// A stored comment, tagged by how it must be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredComment<'a> {
    LegacyMcrypt(&'a str),
    LegacyOpenssl { version: u8, ciphertext: &'a str },
    Encrypted { version: u8, ciphertext: &'a str },
    Raw(&'a str),
    Base64 { version: u8, encoded: &'a str },
}

impl<'a> StoredComment<'a> {
    pub fn from_envelope(stored: &'a str, encrypted: bool, version: u8) -> Self {
        match (encrypted, version) {
            (true, 0) => StoredComment::LegacyMcrypt(stored),
            (true, 1 | 2) => StoredComment::LegacyOpenssl { version, ciphertext: stored },
            (true, _) => StoredComment::Encrypted { version, ciphertext: stored },
            (false, 0..=3) => StoredComment::Raw(stored),
            (false, _) => StoredComment::Base64 { version, encoded: stored },
        }
    }

    /// Recover the plaintext, or the placeholder explaining why not.
    pub fn plaintext(&self, provider: Option<&dyn EncryptionProvider>) -> Result<String, &'static str> {
        match *self {
            StoredComment::LegacyMcrypt(_) => Err(LEGACY_MCRYPT_UNAVAILABLE),
            StoredComment::LegacyOpenssl { .. } => Err(LEGACY_OPENSSL_UNAVAILABLE),
            StoredComment::Encrypted { ciphertext, .. } => {
                let provider = provider.ok_or(NO_PROVIDER)?;
                match provider.decrypt(ciphertext) {
                    Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
                    Err(e) => {
                        debug!(error = %e, "comment decryption failed");
                        Err(DECRYPT_FAILED)
                    }
                }
            }
            StoredComment::Raw(text) => Ok(text.to_string()),
            StoredComment::Base64 { encoded, .. } => Ok(match BASE64.decode(encoded.trim()) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(_) => encoded.to_string(),
            }),
        }
    }

    fn structured(&self) -> bool {
        match *self {
            StoredComment::Encrypted { version, .. } | StoredComment::Base64 { version, .. } => {
                version >= STRUCTURED_COMMENT_VERSION
            }
            _ => false,
        }
    }
}

/// A comment as shown to a reader.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedComment {
    Text(String),
    Structured(CommentPayload),
    /// The comment could not be recovered; holds the placeholder text.
    Unreadable(&'static str),
}

impl DecodedComment {
    /// Text form: the JSON document for structured comments.
    pub fn display_text(&self) -> String {
        match self {
            DecodedComment::Text(s) => s.clone(),
            DecodedComment::Structured(p) => serde_json::to_string(p).unwrap_or_default(),
            DecodedComment::Unreadable(p) => (*p).to_string(),
        }
    }
}

/// Seals comments for storage and opens them again.
#[derive(Clone)]
pub struct CommentCodec {
    encrypt: bool,
    provider: Option<Arc<dyn EncryptionProvider>>,
}

impl CommentCodec {
    /// `encrypt` selects encryption for new rows; `provider` is also used to
    /// read previously encrypted rows when `encrypt` is off.
    pub fn new(encrypt: bool, provider: Option<Arc<dyn EncryptionProvider>>) -> Self {
        Self { encrypt, provider }
    }

    /// Base64 only, no provider.
    pub fn plain() -> Self {
        Self::new(false, None)
    }

    pub fn encrypts(&self) -> bool {
        self.encrypt
    }

    fn provider(&self) -> AuditResult<&dyn EncryptionProvider> {
        self.provider.as_deref().ok_or_else(|| AuditError::Encryption {
            reason: "encryption is enabled but no provider is configured".to_string(),
        })
    }

    /// Stored form of a comment: ciphertext when encrypting, base64 otherwise.
    ///
    /// # Errors
    ///
    /// `AuditError::Encryption` when encryption is on and the provider fails
    /// or is missing. The comment is never silently dropped.
    pub fn seal_comment(&self, plaintext: &str) -> AuditResult<String> {
        if self.encrypt {
            self.provider()?.encrypt(plaintext.as_bytes())
        } else {
            Ok(BASE64.encode(plaintext.as_bytes()))
        }
    }

    /// Stored form of an API URL, body, or response. Empty values stay empty;
    /// values are only transformed when encrypting.
    pub fn seal_field(&self, plaintext: &str) -> AuditResult<String> {
        if self.encrypt && !plaintext.is_empty() {
            self.provider()?.encrypt(plaintext.as_bytes())
        } else {
            Ok(plaintext.to_string())
        }
    }

    /// Decode a stored comment.
    pub fn open(&self, stored: &str, encrypted: bool, version: u8) -> DecodedComment {
        let tagged = StoredComment::from_envelope(stored, encrypted, version);
        let text = match tagged.plaintext(self.provider.as_deref()) {
            Ok(text) => text,
            Err(placeholder) => return DecodedComment::Unreadable(placeholder),
        };
        if tagged.structured() {
            match serde_json::from_str::<CommentPayload>(&text) {
                Ok(payload) => return DecodedComment::Structured(payload),
                Err(e) => debug!(error = %e, "structured comment is not valid JSON"),
            }
        }
        DecodedComment::Text(text)
    }

    /// Plaintext of a comment for checksum verification.
    pub fn open_plaintext(&self, stored: &str, encrypted: bool, version: u8) -> Result<String, &'static str> {
        StoredComment::from_envelope(stored, encrypted, version).plaintext(self.provider.as_deref())
    }

    /// Decode an API URL, body, or response sealed by `seal_field`.
    pub fn open_field(&self, stored: &str, encrypted: bool) -> Result<String, &'static str> {
        if !encrypted || stored.is_empty() {
            return Ok(stored.to_string());
        }
        StoredComment::Encrypted { version: STRUCTURED_COMMENT_VERSION, ciphertext: stored }
            .plaintext(self.provider.as_deref())
    }
}
