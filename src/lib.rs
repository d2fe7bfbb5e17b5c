// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! filedrop - Self-hosted file drop with PIN-protected, encrypted folders
//!
//! Every client IP gets an upload folder. A folder PIN wraps a per-folder
//! file encryption key; protected folders hold AES-256-GCM ciphertext and
//! are decrypted on the way out for browsers that unlocked them.
//!
//! ## Modules
//!
//! - `api` - HTTP handlers, pages and router (Axum)
//! - `config` - Environment configuration
//! - `crypto` - Key derivation, file cipher and PIN hashes
//! - `pins` - PIN records, unlock custody and lockout policy
//! - `storage` - Confined upload tree with atomic writes

pub mod api;
pub mod config;
pub mod crypto;
pub mod error;
pub mod pins;
pub mod state;
pub mod storage;
