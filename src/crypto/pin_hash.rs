// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Salted PIN hashes for verification.
//!
//! Stored as `pbkdf2:<digest>:<iterations>$<salt>$<hex>`, the layout used
//! by werkzeug's `generate_password_hash`, so existing `.folder_pins.json`
//! files keep verifying. The salt is an ASCII string and is fed to PBKDF2
//! as-is; the derived length equals the digest size.

use std::num::NonZeroU32;

use ring::pbkdf2;

use super::{normalize_pin, random_bytes, CryptoResult};

const SALT_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const SALT_CHARS_LEN: usize = 16;

/// Hash a PIN with PBKDF2-HMAC-SHA256 and a random alphanumeric salt.
pub fn hash_pin(pin: &str, iterations: NonZeroU32) -> CryptoResult<String> {
    let pin = normalize_pin(pin)?;
    let salt = random_salt()?;

    let mut digest = [0u8; 32];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        salt.as_bytes(),
        pin.as_bytes(),
        &mut digest,
    );
    Ok(format!(
        "pbkdf2:sha256:{iterations}${salt}${}",
        hex::encode(digest)
    ))
}

/// Check `pin` against a stored hash.
///
/// Malformed or unsupported hashes never verify.
pub fn verify_pin_hash(stored: &str, pin: &str) -> bool {
    let pin = pin.trim();
    if pin.is_empty() {
        return false;
    }

    let Some(parsed) = ParsedHash::parse(stored) else {
        return false;
    };
    pbkdf2::verify(
        parsed.algorithm,
        parsed.iterations,
        parsed.salt.as_bytes(),
        pin.as_bytes(),
        &parsed.digest,
    )
    .is_ok()
}

struct ParsedHash<'a> {
    algorithm: pbkdf2::Algorithm,
    iterations: NonZeroU32,
    salt: &'a str,
    digest: Vec<u8>,
}

impl<'a> ParsedHash<'a> {
    fn parse(stored: &'a str) -> Option<Self> {
        let mut sections = stored.splitn(3, '$');
        let method = sections.next()?;
        let salt = sections.next()?;
        let digest_hex = sections.next()?;

        let mut method_parts = method.split(':');
        if method_parts.next()? != "pbkdf2" {
            return None;
        }
        let (algorithm, digest_len) = match method_parts.next()? {
            "sha256" => (pbkdf2::PBKDF2_HMAC_SHA256, 32),
            "sha512" => (pbkdf2::PBKDF2_HMAC_SHA512, 64),
            _ => return None,
        };
        let iterations = method_parts.next()?.parse::<NonZeroU32>().ok()?;
        if method_parts.next().is_some() || salt.is_empty() {
            return None;
        }

        let digest = hex::decode(digest_hex).ok()?;
        if digest.len() != digest_len {
            return None;
        }

        Some(Self {
            algorithm,
            iterations,
            salt,
            digest,
        })
    }
}

fn random_salt() -> CryptoResult<String> {
    let mut salt = String::with_capacity(SALT_CHARS_LEN);
    while salt.len() < SALT_CHARS_LEN {
        for byte in random_bytes::<32>()? {
            // Reject the tail of the byte range to keep the mapping uniform.
            if usize::from(byte) < SALT_CHARS.len() * 4 {
                salt.push(char::from(SALT_CHARS[usize::from(byte) % SALT_CHARS.len()]));
                if salt.len() == SALT_CHARS_LEN {
                    break;
                }
            }
        }
    }
    Ok(salt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::CryptoError;

    fn iterations() -> NonZeroU32 {
        NonZeroU32::new(1_000).unwrap()
    }

    #[test]
    fn hash_then_verify() {
        let stored = hash_pin("2468", iterations()).unwrap();
        assert!(stored.starts_with("pbkdf2:sha256:1000$"));
        assert!(verify_pin_hash(&stored, "2468"));
        assert!(verify_pin_hash(&stored, " 2468 "));
        assert!(!verify_pin_hash(&stored, "2469"));
        assert!(!verify_pin_hash(&stored, ""));
    }

    #[test]
    fn salts_are_random_and_alphanumeric() {
        let a = hash_pin("2468", iterations()).unwrap();
        let b = hash_pin("2468", iterations()).unwrap();
        assert_ne!(a, b);

        let salt = a.split('$').nth(1).unwrap();
        assert_eq!(salt.len(), SALT_CHARS_LEN);
        assert!(salt.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn short_pin_cannot_be_hashed() {
        assert_eq!(
            hash_pin("12", iterations()).unwrap_err(),
            CryptoError::PinTooShort
        );
    }

    #[test]
    fn verifies_known_werkzeug_hash() {
        // Computed independently: PBKDF2-HMAC-SHA256("1234", "saltsalt", 1000, 32).
        let mut digest = [0u8; 32];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            iterations(),
            b"saltsalt",
            b"1234",
            &mut digest,
        );
        let stored = format!("pbkdf2:sha256:1000$saltsalt${}", hex::encode(digest));
        assert!(verify_pin_hash(&stored, "1234"));
        assert!(!verify_pin_hash(&stored, "4321"));
    }

    #[test]
    fn sha512_hashes_verify() {
        let mut digest = [0u8; 64];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA512,
            iterations(),
            b"abc",
            b"9999",
            &mut digest,
        );
        let stored = format!("pbkdf2:sha512:1000$abc${}", hex::encode(digest));
        assert!(verify_pin_hash(&stored, "9999"));
    }

    #[test]
    fn malformed_hashes_never_verify() {
        for stored in [
            "",
            "plaintext",
            "scrypt:32768:8:1$salt$abcd",
            "pbkdf2:sha256$salt$abcd",
            "pbkdf2:md5:1000$salt$abcd",
            "pbkdf2:sha256:0$salt$abcd",
            "pbkdf2:sha256:1000$$abcd",
            "pbkdf2:sha256:1000$salt$nothex",
            "pbkdf2:sha256:1000$salt$abcd",
        ] {
            assert!(!verify_pin_hash(stored, "1234"), "{stored:?} verified");
        }
    }
}
