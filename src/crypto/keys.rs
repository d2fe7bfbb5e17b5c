// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key material types: the per-folder FEK and the PIN-derived KEK.
//!
//! Both zeroize on drop and never print their bytes.

use base64ct::{Base64, Encoding};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{cipher, random_bytes, CryptoError, CryptoResult, KEY_LEN};

/// File encryption key, one per protected folder.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct FolderKey {
    bytes: [u8; KEY_LEN],
}

impl FolderKey {
    /// Generate a fresh random key.
    pub fn generate() -> CryptoResult<Self> {
        Ok(Self::from_bytes(random_bytes::<KEY_LEN>()?))
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Encrypt a whole file payload.
    pub fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        cipher::encrypt(plaintext, &self.bytes)
    }

    /// Decrypt a whole file payload.
    pub fn decrypt(&self, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        cipher::decrypt(ciphertext, &self.bytes)
    }
}

impl std::fmt::Debug for FolderKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Key-encryption key derived from a PIN. Only ever wraps or unwraps a FEK.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Kek {
    bytes: [u8; KEY_LEN],
}

impl Kek {
    pub(crate) fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Encrypt a FEK, returning standard base64 of `nonce || ct || tag`.
    pub fn wrap(&self, key: &FolderKey) -> CryptoResult<String> {
        let sealed = cipher::encrypt(key.as_bytes(), &self.bytes)?;
        Ok(Base64::encode_string(&sealed))
    }

    /// Reverse of [`Kek::wrap`]. Fails with `Decrypt` for the wrong KEK.
    pub fn unwrap(&self, wrapped: &str) -> CryptoResult<FolderKey> {
        let sealed =
            Base64::decode_vec(wrapped.trim()).map_err(|e| CryptoError::Encoding(e.to_string()))?;
        let mut opened = cipher::decrypt(&sealed, &self.bytes)?;
        let result = key_from_slice(&opened).map(FolderKey::from_bytes);
        opened.zeroize();
        result
    }
}

impl std::fmt::Debug for Kek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kek").field("bytes", &"[REDACTED]").finish()
    }
}

fn key_from_slice(bytes: &[u8]) -> CryptoResult<[u8; KEY_LEN]> {
    bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidKey("expected 32 bytes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kek_wrap_unwrap() {
        let kek = Kek::from_bytes([3u8; KEY_LEN]);
        let fek = FolderKey::generate().unwrap();

        let wrapped = kek.wrap(&fek).unwrap();
        let unwrapped = kek.unwrap(&wrapped).unwrap();
        assert_eq!(unwrapped.as_bytes(), fek.as_bytes());

        let other = Kek::from_bytes([4u8; KEY_LEN]);
        assert_eq!(other.unwrap(&wrapped).unwrap_err(), CryptoError::Decrypt);
    }

    #[test]
    fn debug_output_is_redacted() {
        let fek = FolderKey::from_bytes([0xAB; KEY_LEN]);
        let rendered = format!("{fek:?}");
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("171"));
    }
}
