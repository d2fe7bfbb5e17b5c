// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Server-side browser sessions.
//!
//! Keyed by the random id in the `ft_session` cookie. Holds the folder keys
//! unlocked in this browser plus the unlocked flag used by hash-only
//! folders. Bounded LRU with an idle TTL; eviction simply locks the
//! browser's folders again.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::crypto::{random_token, CryptoResult, FolderKey};

/// Session cookie name.
pub const SESSION_COOKIE: &str = "ft_session";

#[derive(Default)]
struct SessionData {
    folder_keys: HashMap<String, FolderKey>,
    unlocked: HashSet<String>,
}

struct SessionEntry {
    data: SessionData,
    last_seen: Instant,
}

impl SessionEntry {
    fn fresh() -> Self {
        Self {
            data: SessionData::default(),
            last_seen: Instant::now(),
        }
    }
}

/// In-process session table.
pub struct SessionStore {
    cache: Mutex<LruCache<String, SessionEntry>>,
    ttl: Duration,
}

impl SessionStore {
    /// - `capacity`: max number of live sessions.
    /// - `ttl`: idle time after which a session is forgotten.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            ttl,
        }
    }

    fn cache(&self) -> MutexGuard<'_, LruCache<String, SessionEntry>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Live entry for `id`, refreshed; `None` if unknown or idle too long.
    fn live<'a>(
        &self,
        cache: &'a mut LruCache<String, SessionEntry>,
        id: &str,
    ) -> Option<&'a mut SessionEntry> {
        let expired = cache.peek(id)?.last_seen.elapsed() >= self.ttl;
        if expired {
            cache.pop(id);
            return None;
        }
        let entry = cache.get_mut(id)?;
        entry.last_seen = Instant::now();
        Some(entry)
    }

    /// Start a new, empty session and return its id.
    pub fn create(&self) -> CryptoResult<String> {
        let id = random_token()?;
        self.cache().put(id.clone(), SessionEntry::fresh());
        Ok(id)
    }

    /// Whether `id` names a live session. Refreshes its idle timer.
    pub fn touch(&self, id: &str) -> bool {
        let mut cache = self.cache();
        self.live(&mut cache, id).is_some()
    }

    pub fn folder_key(&self, id: &str, folder: &str) -> Option<FolderKey> {
        let mut cache = self.cache();
        self.live(&mut cache, id)?.data.folder_keys.get(folder).cloned()
    }

    pub fn set_folder_key(&self, id: &str, folder: &str, key: FolderKey) {
        let mut cache = self.cache();
        if self.live(&mut cache, id).is_none() {
            cache.put(id.to_string(), SessionEntry::fresh());
        }
        if let Some(entry) = cache.get_mut(id) {
            entry.data.folder_keys.insert(folder.to_string(), key);
        }
    }

    pub fn mark_unlocked(&self, id: &str, folder: &str) {
        let mut cache = self.cache();
        if self.live(&mut cache, id).is_none() {
            cache.put(id.to_string(), SessionEntry::fresh());
        }
        if let Some(entry) = cache.get_mut(id) {
            entry.data.unlocked.insert(folder.to_string());
        }
    }

    pub fn is_marked_unlocked(&self, id: &str, folder: &str) -> bool {
        let mut cache = self.cache();
        self.live(&mut cache, id)
            .is_some_and(|entry| entry.data.unlocked.contains(folder))
    }

    /// Forget `folder` in every session: its key and its unlocked flag.
    pub fn purge_folder(&self, folder: &str) {
        let mut cache = self.cache();
        for (_, entry) in cache.iter_mut() {
            entry.data.folder_keys.remove(folder);
            entry.data.unlocked.remove(folder);
        }
    }

    pub fn len(&self) -> usize {
        self.cache().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
