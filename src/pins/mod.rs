// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Folder PINs
//!
//! Everything that decides whether a browser may see a folder's contents
//! and with which key.
//!
//! - [`record`]: persisted per-folder protection state
//! - [`envelope`]: create and open the PIN-wrapped folder key
//! - [`content`]: bulk encrypt / decrypt / re-encrypt of a folder
//! - [`session`] and [`custody`]: where an unlocked key lives between requests
//! - [`lockout`]: wrong-PIN budget
//! - [`service`]: the operations HTTP handlers call
//!
//! ## Key lookup order
//!
//! 1. the browser's server-side session (`ft_session`)
//! 2. the signed `FT_UNLOCKS` cookie → token → [`custody::UnlockStore`]
//!
//! Changing, removing or destroying a folder's PIN clears both planes for
//! every browser.

pub mod content;
pub mod custody;
pub mod envelope;
pub mod error;
pub mod lockout;
pub mod record;
pub mod service;
pub mod session;

pub use content::ConversionReport;
pub use custody::{UnlockCookieCodec, UnlockStore, UNLOCK_COOKIE};
pub use error::{PinAction, PinError, PinResult};
pub use lockout::{AttemptTracker, MAX_PIN_ATTEMPTS};
pub use record::{EnvelopeRecord, FolderRecord, PinStore};
pub use service::{PinAttempt, PinChange, PinService, PinSettings, Requester};
pub use session::{SessionStore, SESSION_COOKIE};
