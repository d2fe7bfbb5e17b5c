// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! PIN lifecycle, key custody and the access gate.
//!
//! All methods are synchronous and may run PBKDF2 or rewrite every file in
//! a folder; HTTP handlers call them from `spawn_blocking`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::content::{
    decrypt_folder, encrypt_files, encrypt_folder, reencrypt_folder, ConversionReport,
};
use super::custody::{UnlockCookie, UnlockCookieCodec, UnlockStore};
use super::envelope;
use super::lockout::{verdict, AttemptTracker, LockoutVerdict, Reservation};
use super::record::{FolderRecord, PinStore};
use super::session::SessionStore;
use super::{PinAction, PinError, PinResult};
use crate::crypto::{normalize_pin, FolderKey, KdfParams};
use crate::storage::UploadStorage;

/// Who is asking: the browser's session id and raw `FT_UNLOCKS` value.
#[derive(Debug, Clone, Copy, Default)]
pub struct Requester<'a> {
    pub session_id: Option<&'a str>,
    pub unlock_cookie: Option<&'a str>,
}

/// Settings for [`PinService::new`].
#[derive(Clone)]
pub struct PinSettings {
    pub kdf: KdfParams,
    pub unlock_ttl: Duration,
    pub cookie_secret: Vec<u8>,
}

impl std::fmt::Debug for PinSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinSettings")
            .field("kdf", &self.kdf)
            .field("unlock_ttl", &self.unlock_ttl)
            .field("cookie_secret", &"[REDACTED]")
            .finish()
    }
}

/// Result of a successful set/change/remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinChange {
    pub has_pin: bool,
    pub files: ConversionReport,
}

/// Outcome of a PIN submitted on the entry page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinAttempt {
    /// Folder unlocked. Carries a `Set-Cookie` value for encrypted folders.
    Unlocked { set_cookie: Option<String> },
    /// Nothing was entered; not counted.
    Missing,
    Rejected { remaining: u32 },
    /// Ninth failure; the next attempt must be confirmed.
    FinalWarning,
    /// PIN held back until the final attempt is confirmed.
    ConfirmationRequired,
    /// Confirmed final attempt failed; the folder is gone.
    FolderDeleted,
}

pub struct PinService {
    storage: UploadStorage,
    records: PinStore,
    sessions: Arc<SessionStore>,
    unlocks: UnlockStore,
    cookies: UnlockCookieCodec,
    attempts: AttemptTracker,
    kdf: KdfParams,
}

impl PinService {
    pub fn new(storage: UploadStorage, sessions: Arc<SessionStore>, settings: PinSettings) -> Self {
        Self {
            records: PinStore::new(storage.clone()),
            storage,
            sessions,
            unlocks: UnlockStore::new(settings.unlock_ttl),
            cookies: UnlockCookieCodec::new(&settings.cookie_secret, settings.unlock_ttl),
            attempts: AttemptTracker::new(),
            kdf: settings.kdf,
        }
    }

    pub fn storage(&self) -> &UploadStorage {
        &self.storage
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn cookies(&self) -> &UnlockCookieCodec {
        &self.cookies
    }

    fn record(&self, folder: &str) -> PinResult<Option<FolderRecord>> {
        self.records.get(folder).map_err(PinError::Metadata)
    }

    // ========== Lock State ==========

    /// Fails closed: an unreadable record store counts as protected.
    pub fn folder_has_pin(&self, folder: &str) -> bool {
        match self.record(folder) {
            Ok(record) => record.is_some_and(|r| r.has_pin()),
            Err(e) => {
                warn!(folder, error = %e, "PIN metadata unreadable, treating folder as protected");
                true
            }
        }
    }

    /// Fails closed like [`PinService::folder_has_pin`].
    pub fn folder_has_encryption(&self, folder: &str) -> bool {
        match self.record(folder) {
            Ok(record) => record.is_some_and(|r| r.has_encryption()),
            Err(e) => {
                warn!(folder, error = %e, "PIN metadata unreadable, treating folder as encrypted");
                true
            }
        }
    }

    /// Folder key from the session, else from the unlock cookie.
    pub fn fek_for_folder(&self, folder: &str, req: Requester<'_>) -> Option<FolderKey> {
        if let Some(key) = req
            .session_id
            .and_then(|id| self.sessions.folder_key(id, folder))
        {
            return Some(key);
        }
        self.fek_from_cookie(folder, req.unlock_cookie?)
    }

    fn fek_from_cookie(&self, folder: &str, raw: &str) -> Option<FolderKey> {
        let cookie = self.cookies.decode(raw)?;
        let token = cookie.folders.get(folder)?;
        self.unlocks.resolve(token, folder)
    }

    /// Access gate for listing, download and upload.
    pub fn is_unlocked(&self, folder: &str, req: Requester<'_>) -> bool {
        match self.record(folder) {
            Ok(None) => true,
            Ok(Some(record)) if record.has_encryption() => {
                self.fek_for_folder(folder, req).is_some()
            }
            Ok(Some(record)) if !record.has_pin() => true,
            Ok(Some(_)) => req
                .session_id
                .is_some_and(|id| self.sessions.is_marked_unlocked(id, folder)),
            Err(e) => {
                warn!(folder, error = %e, "PIN metadata unreadable, folder stays locked");
                false
            }
        }
    }

    // ========== Verification ==========

    /// Hash comparison only.
    pub fn verify_pin(&self, folder: &str, pin: &str) -> bool {
        matches!(self.record(folder), Ok(Some(record)) if record.verify(pin))
    }

    /// Verify `pin`, then put the folder key in the session and mark the
    /// folder unlocked there. A mismatch is `WrongPin`.
    ///
    /// Hash-only folders only get the flag and return `None`.
    pub fn unlock_with_fek(
        &self,
        folder: &str,
        pin: &str,
        session_id: Option<&str>,
    ) -> PinResult<Option<FolderKey>> {
        let record = self.record(folder)?.ok_or(PinError::NotFound)?;
        let key = envelope::unwrap(&record, pin, &self.kdf)?;

        if let Some(id) = session_id {
            if let Some(key) = &key {
                self.sessions.set_folder_key(id, folder, key.clone());
            }
            self.sessions.mark_unlocked(id, folder);
        }
        Ok(key)
    }

    /// Register a new unlock token and return the merged `Set-Cookie` value.
    pub fn issue_unlock_cookie(
        &self,
        folder: &str,
        key: &FolderKey,
        existing: Option<&str>,
    ) -> PinResult<String> {
        let token = self.unlocks.add(folder, key.clone())?;
        let mut cookie: UnlockCookie = existing
            .and_then(|raw| self.cookies.decode(raw))
            .unwrap_or_default();
        cookie.folders.insert(folder.to_string(), token);
        let value = self.cookies.encode(&cookie)?;
        Ok(self.cookies.set_cookie_header(&value))
    }

    /// Handle a PIN typed on the entry page, applying the lockout policy.
    ///
    /// The attempt is reserved before the PIN is evaluated, so concurrent
    /// submissions never get more evaluations than the budget allows.
    /// Once the last attempt is taken, further submissions are `LockedOut`.
    pub fn submit_pin(
        &self,
        folder: &str,
        pin: &str,
        confirm_final: bool,
        req: Requester<'_>,
    ) -> PinResult<PinAttempt> {
        let pin = pin.trim();
        if pin.is_empty() {
            return Ok(PinAttempt::Missing);
        }

        let (failures, confirmed) = match self.attempts.reserve(folder, confirm_final) {
            Reservation::Granted { attempt, confirmed } => (attempt, confirmed),
            Reservation::ConfirmationRequired => return Ok(PinAttempt::ConfirmationRequired),
            Reservation::Exhausted => return Err(PinError::LockedOut),
        };

        match self.unlock_with_fek(folder, pin, req.session_id) {
            Ok(key) => {
                self.attempts.clear(folder);
                let set_cookie = match key {
                    Some(key) => Some(self.issue_unlock_cookie(folder, &key, req.unlock_cookie)?),
                    None => None,
                };
                info!(folder, "Folder unlocked");
                return Ok(PinAttempt::Unlocked { set_cookie });
            }
            Err(PinError::WrongPin) => {}
            Err(e) => {
                self.attempts.release(folder);
                return Err(e);
            }
        }

        warn!(folder, failures, "Wrong PIN submitted");
        match verdict(failures, confirmed) {
            LockoutVerdict::Retry { remaining } => Ok(PinAttempt::Rejected { remaining }),
            LockoutVerdict::FinalWarning => Ok(PinAttempt::FinalWarning),
            LockoutVerdict::ConfirmationRequired => Ok(PinAttempt::ConfirmationRequired),
            LockoutVerdict::Delete => {
                warn!(folder, failures, "PIN attempt budget exhausted, deleting folder");
                self.delete_folder(folder).inspect_err(|_| {
                    // A confirmed retry may try the deletion again.
                    self.attempts.release(folder);
                })?;
                Ok(PinAttempt::FolderDeleted)
            }
        }
    }

    pub fn failed_attempts(&self, folder: &str) -> u32 {
        self.attempts.failures(folder)
    }

    pub fn awaiting_confirmation(&self, folder: &str) -> bool {
        self.attempts.awaiting_confirmation(folder)
    }

    // ========== Set / Change / Remove ==========

    /// Set, change or (with an empty `new_pin`) remove a folder's PIN,
    /// converting the folder's files to match.
    pub fn set_pin(
        &self,
        folder: &str,
        new_pin: &str,
        current_pin: Option<&str>,
        req: Requester<'_>,
    ) -> PinResult<PinChange> {
        let current_pin = current_pin.map(str::trim).filter(|p| !p.is_empty());
        let dir = self.storage.folder(folder).map_err(|_| PinError::NotFound)?;
        let record = self.record(folder)?;

        let new_pin = new_pin.trim();
        if new_pin.is_empty() {
            return self.remove_pin(folder, &dir, record, current_pin, req);
        }
        normalize_pin(new_pin)?;

        let old_key = match &record {
            None => None,
            Some(record) => {
                let current = current_pin.ok_or(PinError::CurrentPinRequired(PinAction::Change))?;
                if !record.verify(current) {
                    return Err(PinError::WrongCurrentPin);
                }
                if record.has_encryption() {
                    Some(self.current_key(folder, record, current, req, PinError::CurrentKeyUnavailable)?)
                } else {
                    None
                }
            }
        };

        let sealed = envelope::create_or_rotate(new_pin, &self.kdf)?;
        self.records
            .put(folder, &sealed.record)
            .map_err(PinError::Persistence)?;

        self.unlocks.revoke_folder(folder);
        self.sessions.purge_folder(folder);

        let files = match &old_key {
            Some(old) => reencrypt_folder(&self.storage, &dir, old, &sealed.key),
            None => encrypt_folder(&self.storage, &dir, &sealed.key),
        };

        if let Some(id) = req.session_id {
            self.sessions.set_folder_key(id, folder, sealed.key.clone());
            self.sessions.mark_unlocked(id, folder);
        }
        self.attempts.clear(folder);

        info!(
            folder,
            rotated = record.is_some(),
            converted = files.converted.len(),
            failed = files.failure_count(),
            "Folder PIN set"
        );
        Ok(PinChange {
            has_pin: true,
            files,
        })
    }

    fn remove_pin(
        &self,
        folder: &str,
        dir: &Path,
        record: Option<FolderRecord>,
        current_pin: Option<&str>,
        req: Requester<'_>,
    ) -> PinResult<PinChange> {
        let Some(record) = record else {
            return Ok(PinChange {
                has_pin: false,
                files: ConversionReport::default(),
            });
        };

        let current = current_pin.ok_or(PinError::CurrentPinRequired(PinAction::Remove))?;
        if !record.verify(current) {
            return Err(PinError::WrongPin);
        }

        let mut files = ConversionReport::default();
        let key = if record.has_encryption() {
            let key = self.current_key(folder, &record, current, req, PinError::WrongPin)?;
            files = decrypt_folder(&self.storage, dir, &key);
            Some(key)
        } else {
            None
        };

        if let Err(e) = self.records.remove(folder) {
            if let Some(key) = &key {
                let rollback = encrypt_files(&self.storage, dir, key, &files.converted);
                warn!(
                    folder,
                    restored = rollback.converted.len(),
                    failed = rollback.failure_count(),
                    "PIN removal not saved, files re-encrypted"
                );
            }
            return Err(PinError::Persistence(e));
        }

        self.sessions.purge_folder(folder);
        self.unlocks.revoke_folder(folder);
        self.attempts.clear(folder);

        info!(
            folder,
            converted = files.converted.len(),
            failed = files.failure_count(),
            "Folder PIN removed"
        );
        Ok(PinChange {
            has_pin: false,
            files,
        })
    }

    /// Key already held by the requester, else unwrapped with the verified PIN.
    fn current_key(
        &self,
        folder: &str,
        record: &FolderRecord,
        pin: &str,
        req: Requester<'_>,
        unavailable: PinError,
    ) -> PinResult<FolderKey> {
        if let Some(key) = self.fek_for_folder(folder, req) {
            return Ok(key);
        }
        envelope::unwrap(record, pin, &self.kdf)?.ok_or(unavailable)
    }

    // ========== Deletion ==========

    /// Delete the folder tree, then every trace of its protection.
    ///
    /// If the tree cannot be removed the record is kept, so no ciphertext
    /// is ever left without its wrapped key.
    pub fn delete_folder(&self, folder: &str) -> PinResult<()> {
        let dir = self.storage.folder(folder).map_err(PinError::Filesystem)?;
        if dir.exists() {
            self.storage.delete_dir(&dir).map_err(|e| {
                warn!(folder, error = %e, "Folder deletion failed");
                PinError::Filesystem(e)
            })?;
        }
        self.remove_folder_details(folder)?;
        info!(folder, "Folder deleted");
        Ok(())
    }

    /// Forget the folder's record, session keys, tokens and attempt state.
    pub fn remove_folder_details(&self, folder: &str) -> PinResult<()> {
        self.records
            .remove(folder)
            .map_err(PinError::Persistence)?;
        self.sessions.purge_folder(folder);
        self.unlocks.revoke_folder(folder);
        self.attempts.clear(folder);
        Ok(())
    }
}

impl std::fmt::Debug for PinService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinService")
            .field("storage", &self.storage)
            .field("kdf", &self.kdf)
            .finish_non_exhaustive()
    }
}
