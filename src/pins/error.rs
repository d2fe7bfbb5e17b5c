// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! PIN subsystem errors.
//!
//! `Display` strings are shown to users as-is by the set-pin endpoint.

use thiserror::Error;

use crate::crypto::CryptoError;
use crate::storage::StorageError;

/// What the caller was trying to do when a current PIN was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinAction {
    Remove,
    Change,
}

impl std::fmt::Display for PinAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PinAction::Remove => write!(f, "remove protection"),
            PinAction::Change => write!(f, "change it"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PinError {
    #[error("Wrong PIN.")]
    WrongPin,

    #[error("Wrong current PIN.")]
    WrongCurrentPin,

    /// The current PIN verified but no folder key could be obtained.
    #[error("Wrong current PIN or open the folder and enter current PIN first, then you can change PIN.")]
    CurrentKeyUnavailable,

    #[error("Please enter your current PIN to {0}.")]
    CurrentPinRequired(PinAction),

    #[error("PIN must be at least {} characters", crate::crypto::MIN_PIN_LEN)]
    PinTooShort,

    /// Writing the folder record store failed; no file was touched.
    #[error("Failed to save PIN. Please try again.")]
    Persistence(#[source] StorageError),

    /// The record store could not be read. Callers fail closed.
    #[error("PIN settings are unavailable. Please try again.")]
    Metadata(#[source] StorageError),

    /// Authenticated decryption failed after the PIN hash matched.
    #[error("Decryption failed")]
    Decrypt,

    #[error("Folder not found.")]
    NotFound,

    /// The attempt budget is used up while the folder's deletion is pending.
    #[error("Too many wrong PINs.")]
    LockedOut,

    /// Removing the folder tree failed.
    #[error("Could not delete folder.")]
    Filesystem(#[source] StorageError),

    #[error("Internal crypto error")]
    Crypto(#[source] CryptoError),
}

impl From<CryptoError> for PinError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::PinTooShort => PinError::PinTooShort,
            CryptoError::Decrypt => PinError::Decrypt,
            other => PinError::Crypto(other),
        }
    }
}

pub type PinResult<T> = Result<T, PinError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_user_facing_text() {
        assert_eq!(
            PinError::CurrentPinRequired(PinAction::Remove).to_string(),
            "Please enter your current PIN to remove protection."
        );
        assert_eq!(
            PinError::CurrentPinRequired(PinAction::Change).to_string(),
            "Please enter your current PIN to change it."
        );
        assert_eq!(
            PinError::PinTooShort.to_string(),
            "PIN must be at least 4 characters"
        );
    }

    #[test]
    fn crypto_errors_map_to_pin_errors() {
        assert!(matches!(
            PinError::from(CryptoError::PinTooShort),
            PinError::PinTooShort
        ));
        assert!(matches!(
            PinError::from(CryptoError::Decrypt),
            PinError::Decrypt
        ));
        assert!(matches!(
            PinError::from(CryptoError::Rng),
            PinError::Crypto(CryptoError::Rng)
        ));
    }
}
