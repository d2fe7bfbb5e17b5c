// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wrong-PIN accounting per folder.
//!
//! | failures | outcome                                          |
//! |----------|--------------------------------------------------|
//! | 1–8      | retry, `10 - failures` attempts left             |
//! | 9        | final warning; next attempt needs confirmation   |
//! | ≥ 10     | folder deletion, only if the attempt was confirmed |
//!
//! A submission reserves its attempt before the PIN is evaluated, so
//! concurrent guesses cannot overrun the budget. State is in memory and
//! resets on restart.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Total wrong PINs allowed before a folder is destroyed.
pub const MAX_PIN_ATTEMPTS: u32 = 10;

/// Failure count at which the final-attempt confirmation kicks in.
pub const FINAL_WARNING_AT: u32 = MAX_PIN_ATTEMPTS - 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct AttemptState {
    failed: u32,
    final_confirmed: bool,
}

/// What a failure count means for the next response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutVerdict {
    Retry { remaining: u32 },
    FinalWarning,
    ConfirmationRequired,
    Delete,
}

/// Map a failure count to its consequence.
pub fn verdict(failures: u32, final_confirmed: bool) -> LockoutVerdict {
    if failures < FINAL_WARNING_AT {
        LockoutVerdict::Retry {
            remaining: MAX_PIN_ATTEMPTS - failures,
        }
    } else if failures == FINAL_WARNING_AT {
        LockoutVerdict::FinalWarning
    } else if final_confirmed {
        LockoutVerdict::Delete
    } else {
        LockoutVerdict::ConfirmationRequired
    }
}

/// Whether a submitted PIN must be held back until the user confirms.
pub fn needs_confirmation(failures: u32, final_confirmed: bool) -> bool {
    failures >= FINAL_WARNING_AT && !final_confirmed
}

/// Answer to [`AttemptTracker::reserve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    /// The PIN may be evaluated. `attempt` already counts it as a failure.
    Granted { attempt: u32, confirmed: bool },
    /// Held back until the final attempt is confirmed.
    ConfirmationRequired,
    /// The last attempt is taken; the folder is being deleted.
    Exhausted,
}

/// Per-folder failure counters.
#[derive(Debug, Default)]
pub struct AttemptTracker {
    state: Mutex<HashMap<String, AttemptState>>,
}

impl AttemptTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, HashMap<String, AttemptState>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the next attempt under one lock, counting it as a failure
    /// until [`AttemptTracker::release`] or [`AttemptTracker::clear`].
    ///
    /// `confirm_final` is only honoured once the warning threshold is reached.
    pub fn reserve(&self, folder: &str, confirm_final: bool) -> Reservation {
        let mut state = self.state();
        let entry = state.entry(folder.to_string()).or_default();
        if confirm_final && entry.failed >= FINAL_WARNING_AT {
            entry.final_confirmed = true;
        }
        if entry.failed >= MAX_PIN_ATTEMPTS {
            return Reservation::Exhausted;
        }
        if needs_confirmation(entry.failed, entry.final_confirmed) {
            return Reservation::ConfirmationRequired;
        }
        entry.failed += 1;
        Reservation::Granted {
            attempt: entry.failed,
            confirmed: entry.final_confirmed,
        }
    }

    /// Give back a reserved attempt whose PIN was never judged.
    pub fn release(&self, folder: &str) {
        let mut state = self.state();
        if let Some(entry) = state.get_mut(folder) {
            entry.failed = entry.failed.saturating_sub(1);
            if *entry == AttemptState::default() {
                state.remove(folder);
            }
        }
    }

    pub fn failures(&self, folder: &str) -> u32 {
        self.state().get(folder).map_or(0, |s| s.failed)
    }

    /// `needs_confirmation` for the folder's current state.
    pub fn awaiting_confirmation(&self, folder: &str) -> bool {
        let state = self.state().get(folder).copied().unwrap_or_default();
        needs_confirmation(state.failed, state.final_confirmed)
    }

    pub fn clear(&self, folder: &str) {
        self.state().remove(folder);
    }
}
