//! # tessera-crypto
//!
//! The encryption provider for audit comments and API payloads.
//!
//! [`KeyringEncryptor`] implements
//! [`EncryptionProvider`](tessera_core::traits::EncryptionProvider) with
//! AES-256-GCM and a versioned key ring, so keys can rotate without losing
//! the ability to read older rows.

pub mod keyring;

pub use keyring::KeyringEncryptor;
