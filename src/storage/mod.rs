// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Upload Storage Module
//!
//! Local-disk storage for uploaded files and the folder record store.
//!
//! ## Storage Layout
//!
//! ```text
//! {UPLOAD_DIR}/
//!   .folder_pins.json     # folder → PIN hash, KEK salt, wrapped FEK
//!   {client_ip}/
//!     {file}              # plaintext, or nonce||ciphertext||tag when protected
//! ```
//!
//! ## Important Notes
//!
//! - This module does plain filesystem I/O; encryption lives in `crypto`
//! - Names from requests must be resolved through [`UploadStorage::folder`]
//!   or [`UploadStorage::file`]
//! - Hidden entries (leading dot) are never listed or served

pub mod ownership;
pub mod paths;
pub mod upload_fs;

pub use ownership::{Folder, OwnedResource, OwnershipEnforcer};
pub use paths::{sanitize_filename, validate_component, UploadPaths};
pub use upload_fs::{StorageError, StorageResult, UploadStorage};
