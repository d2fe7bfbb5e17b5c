// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Folder key envelope: a random FEK wrapped under the PIN-derived KEK.

use base64ct::{Base64, Encoding};

use super::{EnvelopeRecord, FolderRecord, PinError, PinResult};
use crate::crypto::pin_hash::hash_pin;
use crate::crypto::{
    derive_kek, normalize_pin, random_bytes, CryptoResult, FolderKey, KdfParams, SALT_LEN,
};

/// A freshly created record together with the key it protects.
#[derive(Debug)]
pub struct SealedFolder {
    pub record: FolderRecord,
    pub key: FolderKey,
}

/// Create a new envelope for `pin`: fresh FEK, fresh KEK salt, fresh hash.
///
/// Used both for first protection and for rotation; nothing is reused from
/// a previous record.
pub fn create_or_rotate(pin: &str, params: &KdfParams) -> CryptoResult<SealedFolder> {
    let pin = normalize_pin(pin)?;

    let key = FolderKey::generate()?;
    let salt = random_bytes::<SALT_LEN>()?;
    let kek = derive_kek(pin, &salt, params)?;
    let encrypted_fek = kek.wrap(&key)?;
    let hash = hash_pin(pin, params.pin_hash_iterations)?;

    Ok(SealedFolder {
        record: FolderRecord::Envelope(EnvelopeRecord {
            hash,
            salt: Base64::encode_string(&salt),
            encrypted_fek,
        }),
        key,
    })
}

/// Recover the folder key with `pin`.
///
/// The hash is checked first: a mismatch is always `WrongPin`. Only then is
/// the KEK derived; a failure from there on is `Decrypt`. Records without a
/// wrapped key yield `Ok(None)`.
pub fn unwrap(record: &FolderRecord, pin: &str, params: &KdfParams) -> PinResult<Option<FolderKey>> {
    if !record.verify(pin) {
        return Err(PinError::WrongPin);
    }
    let FolderRecord::Envelope(env) = record else {
        return Ok(None);
    };
    if env.encrypted_fek.is_empty() {
        return Ok(None);
    }

    let salt: [u8; SALT_LEN] = Base64::decode_vec(env.salt.trim())
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(PinError::Decrypt)?;
    let kek = derive_kek(pin, &salt, params)?;
    let key = kek.unwrap(&env.encrypted_fek).map_err(|_| PinError::Decrypt)?;
    Ok(Some(key))
}
