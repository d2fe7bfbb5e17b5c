// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key derivation: PIN + salt → KEK via PBKDF2-HMAC-SHA256.

use std::num::NonZeroU32;

use ring::pbkdf2;

use super::{CryptoError, CryptoResult, Kek, KEY_LEN, SALT_LEN};

/// Minimum PIN length, counted in characters after trimming.
pub const MIN_PIN_LEN: usize = 4;

/// Default PBKDF2 rounds for the KEK.
pub const DEFAULT_KEK_ITERATIONS: u32 = 100_000;

/// Default PBKDF2 rounds for the stored PIN hash.
pub const DEFAULT_PIN_HASH_ITERATIONS: u32 = 600_000;

/// Work factors for the two PBKDF2 uses.
///
/// Both are deliberately slow; they are the only throttled operations in
/// the PIN subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Rounds used to derive the KEK from a PIN.
    pub kek_iterations: NonZeroU32,
    /// Rounds used when hashing a new PIN for verification.
    pub pin_hash_iterations: NonZeroU32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            kek_iterations: NonZeroU32::new(DEFAULT_KEK_ITERATIONS).unwrap_or(NonZeroU32::MIN),
            pin_hash_iterations: NonZeroU32::new(DEFAULT_PIN_HASH_ITERATIONS)
                .unwrap_or(NonZeroU32::MIN),
        }
    }
}

impl KdfParams {
    /// Cheap parameters for tests.
    #[cfg(test)]
    pub fn fast() -> Self {
        Self {
            kek_iterations: NonZeroU32::new(1_000).unwrap(),
            pin_hash_iterations: NonZeroU32::new(1_000).unwrap(),
        }
    }
}

/// Trim a PIN and enforce the minimum length.
pub fn normalize_pin(pin: &str) -> CryptoResult<&str> {
    let trimmed = pin.trim();
    if trimmed.chars().count() < MIN_PIN_LEN {
        return Err(CryptoError::PinTooShort);
    }
    Ok(trimmed)
}

/// Derive the 256-bit KEK for `pin` and `salt`.
///
/// Deterministic for a given (PIN, salt, iterations). The PIN is trimmed
/// first so that verification and derivation agree on the input.
pub fn derive_kek(pin: &str, salt: &[u8; SALT_LEN], params: &KdfParams) -> CryptoResult<Kek> {
    let pin = normalize_pin(pin)?;

    let mut key = [0u8; KEY_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        params.kek_iterations,
        salt,
        pin.as_bytes(),
        &mut key,
    );
    Ok(Kek::from_bytes(key))
}
