// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Folder Cryptography
//!
//! Primitives behind PIN-protected folders. Nothing in here touches the
//! filesystem; callers in [`crate::pins`] decide what gets encrypted where.
//!
//! ## Key Hierarchy
//!
//! ```text
//! PIN + salt ──PBKDF2-HMAC-SHA256──► KEK (never stored)
//!                                     │ AES-256-GCM
//!                                     ▼
//!                      random FEK ──► encrypted_fek (metadata store)
//!                          │ AES-256-GCM
//!                          ▼
//!                    file contents at rest
//! ```
//!
//! The PIN is also stored as a salted PBKDF2 hash (see [`pin_hash`]) so a
//! wrong PIN is rejected before any decryption is attempted.

pub mod cipher;
pub mod kdf;
pub mod keys;
pub mod pin_hash;

use ring::rand::{SecureRandom, SystemRandom};

pub use cipher::{decrypt, encrypt};
pub use kdf::{derive_kek, normalize_pin, KdfParams, MIN_PIN_LEN};
pub use keys::{FolderKey, Kek};

/// Size of FEK and KEK material (AES-256).
pub const KEY_LEN: usize = 32;

/// Size of the random KEK salt stored in the folder record.
pub const SALT_LEN: usize = 16;

/// Errors raised by the cryptographic primitives.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("PIN must be at least {} characters", MIN_PIN_LEN)]
    PinTooShort,

    #[error("random number generator failure")]
    Rng,

    #[error("encryption failed")]
    Encrypt,

    /// Wrong key, truncated input or tampered ciphertext.
    #[error("authenticated decryption failed")]
    Decrypt,

    #[error("invalid key material: {0}")]
    InvalidKey(&'static str),

    #[error("invalid encoding: {0}")]
    Encoding(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;

/// Fill a fixed-size buffer from the system CSPRNG.
pub fn random_bytes<const N: usize>() -> CryptoResult<[u8; N]> {
    let mut buf = [0u8; N];
    SystemRandom::new()
        .fill(&mut buf)
        .map_err(|_| CryptoError::Rng)?;
    Ok(buf)
}

/// Generate an unguessable URL-safe token (32 random bytes).
pub fn random_token() -> CryptoResult<String> {
    use base64ct::{Base64UrlUnpadded, Encoding};

    let bytes = random_bytes::<32>()?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_tokens_are_unique_and_url_safe() {
        let a = random_token().unwrap();
        let b = random_token().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn pin_too_short_message_names_minimum() {
        assert_eq!(
            CryptoError::PinTooShort.to_string(),
            "PIN must be at least 4 characters"
        );
    }
}
