// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bulk conversion of a folder's files between plaintext and ciphertext.
//!
//! Every regular, non-hidden file directly inside the folder is rewritten
//! in place (temp file + rename). A file that fails is logged and skipped;
//! the report says which ones.

use std::path::Path;

use tracing::{debug, warn};

use crate::crypto::{CryptoResult, FolderKey};
use crate::storage::UploadStorage;

/// Outcome of a bulk conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionReport {
    pub converted: Vec<String>,
    pub failed: Vec<String>,
}

impl ConversionReport {
    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Encrypt every plaintext file in `dir` with `key`.
pub fn encrypt_folder(storage: &UploadStorage, dir: &Path, key: &FolderKey) -> ConversionReport {
    let names = list_or_empty(storage, dir);
    convert(storage, dir, &names, "encrypt", |data| key.encrypt(data))
}

/// Decrypt every file in `dir` with `key`.
pub fn decrypt_folder(storage: &UploadStorage, dir: &Path, key: &FolderKey) -> ConversionReport {
    let names = list_or_empty(storage, dir);
    convert(storage, dir, &names, "decrypt", |data| key.decrypt(data))
}

/// Move every file in `dir` from `old` to `new` in a single rewrite.
pub fn reencrypt_folder(
    storage: &UploadStorage,
    dir: &Path,
    old: &FolderKey,
    new: &FolderKey,
) -> ConversionReport {
    let names = list_or_empty(storage, dir);
    convert(storage, dir, &names, "re-encrypt", |data| {
        new.encrypt(&old.decrypt(data)?)
    })
}

/// Encrypt only the named files. Used to roll back a partial decryption.
pub fn encrypt_files(
    storage: &UploadStorage,
    dir: &Path,
    key: &FolderKey,
    names: &[String],
) -> ConversionReport {
    convert(storage, dir, names, "encrypt", |data| key.encrypt(data))
}

fn list_or_empty(storage: &UploadStorage, dir: &Path) -> Vec<String> {
    match storage.list_files(dir) {
        Ok(names) => names,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Failed to list folder for conversion");
            Vec::new()
        }
    }
}

fn convert(
    storage: &UploadStorage,
    dir: &Path,
    names: &[String],
    op: &'static str,
    transform: impl Fn(&[u8]) -> CryptoResult<Vec<u8>>,
) -> ConversionReport {
    let mut report = ConversionReport::default();

    for name in names {
        let path = dir.join(name);
        let result = storage
            .read_raw(&path)
            .map_err(|e| e.to_string())
            .and_then(|data| transform(&data).map_err(|e| e.to_string()))
            .and_then(|out| storage.write_raw(&path, &out).map_err(|e| e.to_string()));

        match result {
            Ok(()) => report.converted.push(name.clone()),
            Err(error) => {
                warn!(file = %name, op, %error, "File conversion failed, leaving it as is");
                report.failed.push(name.clone());
            }
        }
    }

    debug!(
        dir = %dir.display(),
        op,
        converted = report.converted.len(),
        failed = report.failed.len(),
        "Folder conversion finished"
    );
    report
}
