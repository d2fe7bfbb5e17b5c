// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Whole-payload AES-256-GCM.
//!
//! Format: `[12-byte nonce][ciphertext][16-byte tag]`. No other header; the
//! metadata record is the only thing that says a folder holds ciphertext.

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};

use super::{random_bytes, CryptoError, CryptoResult, KEY_LEN};

/// Encrypt `plaintext` under `key` with a fresh random nonce.
pub fn encrypt(plaintext: &[u8], key: &[u8; KEY_LEN]) -> CryptoResult<Vec<u8>> {
    let sealing_key = aead_key(key)?;

    let nonce_bytes = random_bytes::<NONCE_LEN>()?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = plaintext.to_vec();
    sealing_key
        .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| CryptoError::Encrypt)?;

    let mut result = Vec::with_capacity(NONCE_LEN + in_out.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&in_out);
    Ok(result)
}

/// Decrypt `nonce || ciphertext || tag`.
///
/// Any failure (short input, wrong key, flipped bit) is `CryptoError::Decrypt`;
/// partial plaintext is never returned.
pub fn decrypt(data: &[u8], key: &[u8; KEY_LEN]) -> CryptoResult<Vec<u8>> {
    if data.len() < NONCE_LEN + AES_256_GCM.tag_len() {
        return Err(CryptoError::Decrypt);
    }

    let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
    let nonce = Nonce::try_assume_unique_for_key(nonce_bytes).map_err(|_| CryptoError::Decrypt)?;
    let opening_key = aead_key(key)?;

    let mut in_out = ciphertext.to_vec();
    let plaintext = opening_key
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| CryptoError::Decrypt)?;
    Ok(plaintext.to_vec())
}

fn aead_key(key: &[u8; KEY_LEN]) -> CryptoResult<LessSafeKey> {
    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| CryptoError::InvalidKey("AES-256-GCM key rejected"))?;
    Ok(LessSafeKey::new(unbound))
}
