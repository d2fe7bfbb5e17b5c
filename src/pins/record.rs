// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Folder records and their JSON store.
//!
//! `.folder_pins.json` maps folder name to either an envelope object or,
//! for folders protected before encryption existed, a bare hash string:
//!
//! ```json
//! {
//!   "10.0.0.7": { "hash": "pbkdf2:sha256:…", "salt": "…", "encrypted_fek": "…" },
//!   "10.0.0.8": "pbkdf2:sha256:…"
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::crypto::pin_hash::verify_pin_hash;
use crate::storage::{StorageError, StorageResult, UploadStorage};

/// PIN hash plus the PIN-wrapped folder key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeRecord {
    pub hash: String,
    /// Standard base64 of the 16-byte KEK salt.
    pub salt: String,
    /// Standard base64 of `nonce || AES-256-GCM(FEK) || tag`.
    pub encrypted_fek: String,
}

/// Protection state of one folder. Absence from the store means unprotected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FolderRecord {
    Envelope(EnvelopeRecord),
    /// PIN hash only; files stay plaintext.
    Legacy(String),
}

impl FolderRecord {
    pub fn pin_hash(&self) -> &str {
        match self {
            FolderRecord::Envelope(env) => &env.hash,
            FolderRecord::Legacy(hash) => hash,
        }
    }

    pub fn has_pin(&self) -> bool {
        !self.pin_hash().is_empty()
    }

    /// True when the folder's files are stored as ciphertext.
    pub fn has_encryption(&self) -> bool {
        matches!(self, FolderRecord::Envelope(env) if !env.encrypted_fek.is_empty())
    }

    /// Hash comparison only; no key material is touched.
    pub fn verify(&self, pin: &str) -> bool {
        verify_pin_hash(self.pin_hash(), pin)
    }
}

/// Read-modify-write access to the record file.
///
/// Updates are serialised by an in-process lock and written atomically.
/// A file that cannot be read or parsed is an error, never "no records".
#[derive(Debug)]
pub struct PinStore {
    storage: UploadStorage,
    write_lock: Mutex<()>,
}

impl PinStore {
    pub fn new(storage: UploadStorage) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    fn load(&self) -> StorageResult<BTreeMap<String, FolderRecord>> {
        let path = self.storage.paths().pins_file();
        match self.storage.read_json(&path) {
            Ok(records) => Ok(records),
            Err(StorageError::NotFound(_)) => Ok(BTreeMap::new()),
            Err(e) => Err(e),
        }
    }

    /// Record for one folder, `None` when unprotected.
    pub fn get(&self, folder: &str) -> StorageResult<Option<FolderRecord>> {
        Ok(self.load()?.remove(folder))
    }

    /// Insert or replace a folder's record.
    pub fn put(&self, folder: &str, record: &FolderRecord) -> StorageResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut records = self.load()?;
        records.insert(folder.to_string(), record.clone());
        self.storage
            .write_json(self.storage.paths().pins_file(), &records)
    }

    /// Drop a folder's record. Returns whether one existed.
    pub fn remove(&self, folder: &str) -> StorageResult<bool> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut records = self.load()?;
        if records.remove(folder).is_none() {
            return Ok(false);
        }
        self.storage
            .write_json(self.storage.paths().pins_file(), &records)?;
        Ok(true)
    }
}
