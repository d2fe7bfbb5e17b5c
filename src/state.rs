// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::IpAddr;
use std::sync::Arc;

use crate::config::Config;
use crate::pins::{PinService, PinSettings, SessionStore};
use crate::storage::{StorageResult, UploadPaths, UploadStorage};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub storage: UploadStorage,
    pub pins: Arc<PinService>,
    pub sessions: Arc<SessionStore>,
    pub trusted_proxies: Arc<[IpAddr]>,
    /// Request body cap for uploads.
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Build the state and create the upload root.
    pub fn new(config: &Config) -> StorageResult<Self> {
        let storage = UploadStorage::new(UploadPaths::new(&config.upload_dir));
        storage.initialize()?;

        let sessions = Arc::new(SessionStore::new(
            config.session_capacity,
            config.session_ttl,
        ));
        let pins = Arc::new(PinService::new(
            storage.clone(),
            sessions.clone(),
            PinSettings {
                kdf: config.kdf,
                unlock_ttl: config.unlock_ttl,
                cookie_secret: config.secret_key.clone(),
            },
        ));

        Ok(Self {
            storage,
            pins,
            sessions,
            trusted_proxies: config.trusted_proxies.clone().into(),
            max_upload_bytes: config.max_upload_bytes,
        })
    }
}
