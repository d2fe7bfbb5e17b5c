// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Long-lived unlock custody: server-side tokens plus a signed cookie.
//!
//! The browser never holds key material. It holds `FT_UNLOCKS`, a signed,
//! timestamped map of folder → opaque token; the token resolves to the
//! folder key in [`UnlockStore`] until it expires or is revoked.
//!
//! Cookie value: `base64url(json) . unix_ts . base64url(hmac)`, where the
//! HMAC-SHA256 covers a fixed context string, the payload and the
//! timestamp.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::crypto::{random_token, CryptoError, CryptoResult, FolderKey};

/// Cookie carrying folder → token.
pub const UNLOCK_COOKIE: &str = "FT_UNLOCKS";

/// Lifetime of tokens and of the cookie itself.
pub const DEFAULT_UNLOCK_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

const MAC_CONTEXT: &[u8] = b"ft-unlocks";

type HmacSha256 = Hmac<Sha256>;

struct UnlockEntry {
    folder: String,
    key: FolderKey,
    expires_at: Instant,
}

/// Revocable token → folder key table.
///
/// Expired entries are swept on every access.
pub struct UnlockStore {
    entries: Mutex<HashMap<String, UnlockEntry>>,
    ttl: Duration,
}

impl UnlockStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn swept(&self) -> MutexGuard<'_, HashMap<String, UnlockEntry>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);
        entries
    }

    /// Store `key` for `folder` and return a fresh token.
    pub fn add(&self, folder: &str, key: FolderKey) -> CryptoResult<String> {
        let token = random_token()?;
        let mut entries = self.swept();
        entries.insert(
            token.clone(),
            UnlockEntry {
                folder: folder.to_string(),
                key,
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(token)
    }

    /// Folder and key behind a live token.
    pub fn get(&self, token: &str) -> Option<(String, FolderKey)> {
        let entries = self.swept();
        let entry = entries.get(token)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some((entry.folder.clone(), entry.key.clone()))
    }

    /// Key behind `token`, only if it was issued for `folder`.
    pub fn resolve(&self, token: &str, folder: &str) -> Option<FolderKey> {
        match self.get(token)? {
            (issued_for, key) if issued_for == folder => Some(key),
            _ => None,
        }
    }

    /// Drop every token of `folder`. Returns how many were dropped.
    pub fn revoke_folder(&self, folder: &str) -> usize {
        let mut entries = self.swept();
        let before = entries.len();
        entries.retain(|_, entry| entry.folder != folder);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.swept().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decoded `FT_UNLOCKS` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockCookie {
    #[serde(default)]
    pub folders: BTreeMap<String, String>,
}

/// Signs and verifies `FT_UNLOCKS` values.
pub struct UnlockCookieCodec {
    secret: Zeroizing<Vec<u8>>,
    max_age: Duration,
}

impl UnlockCookieCodec {
    pub fn new(secret: &[u8], max_age: Duration) -> Self {
        Self {
            secret: Zeroizing::new(secret.to_vec()),
            max_age,
        }
    }

    fn mac(&self, payload: &str, ts: &str) -> CryptoResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| CryptoError::InvalidKey("cookie secret rejected"))?;
        mac.update(MAC_CONTEXT);
        mac.update(b".");
        mac.update(payload.as_bytes());
        mac.update(b".");
        mac.update(ts.as_bytes());
        Ok(mac)
    }

    pub fn encode(&self, cookie: &UnlockCookie) -> CryptoResult<String> {
        self.encode_at(cookie, chrono::Utc::now().timestamp())
    }

    pub fn encode_at(&self, cookie: &UnlockCookie, now: i64) -> CryptoResult<String> {
        let json =
            serde_json::to_vec(cookie).map_err(|e| CryptoError::Encoding(e.to_string()))?;
        let payload = Base64UrlUnpadded::encode_string(&json);
        let ts = now.to_string();
        let tag = self.mac(&payload, &ts)?.finalize().into_bytes();
        Ok(format!(
            "{payload}.{ts}.{}",
            Base64UrlUnpadded::encode_string(&tag)
        ))
    }

    /// Verify and decode. Bad signatures, stale cookies and garbage all
    /// decode to `None`.
    pub fn decode(&self, raw: &str) -> Option<UnlockCookie> {
        self.decode_at(raw, chrono::Utc::now().timestamp())
    }

    pub fn decode_at(&self, raw: &str, now: i64) -> Option<UnlockCookie> {
        let mut parts = raw.trim().split('.');
        let payload = parts.next()?;
        let ts = parts.next()?;
        let sig = parts.next()?;
        if parts.next().is_some() {
            return None;
        }

        let sig = Base64UrlUnpadded::decode_vec(sig).ok()?;
        self.mac(payload, ts).ok()?.verify_slice(&sig).ok()?;

        let issued: i64 = ts.parse().ok()?;
        let age = now.checked_sub(issued)?;
        if age < 0 || age.unsigned_abs() > self.max_age.as_secs() {
            return None;
        }

        let json = Base64UrlUnpadded::decode_vec(payload).ok()?;
        serde_json::from_slice(&json).ok()
    }

    /// `Set-Cookie` header value carrying `value`.
    pub fn set_cookie_header(&self, value: &str) -> String {
        format!(
            "{UNLOCK_COOKIE}={value}; Max-Age={}; Path=/; SameSite=Lax; HttpOnly",
            self.max_age.as_secs()
        )
    }
}

impl std::fmt::Debug for UnlockCookieCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnlockCookieCodec")
            .field("secret", &"[REDACTED]")
            .field("max_age", &self.max_age)
            .finish()
    }
}

impl std::fmt::Debug for UnlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnlockStore")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
