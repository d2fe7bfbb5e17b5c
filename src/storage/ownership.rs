// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ownership enforcement for folder-modifying operations.
//!
//! A folder is owned by the client whose IP address is its name. Requests
//! from a loopback address act for every folder (the machine's operator).
//! Deleting files or folders and managing PINs must pass through here;
//! reading is governed by the PIN gate instead.

use std::net::IpAddr;

use super::{StorageError, StorageResult};

/// Trait for resources that have an owner.
pub trait OwnedResource {
    /// Textual client address of the owner.
    fn owner_id(&self) -> &str;
}

/// Trait for enforcing ownership on storage operations.
pub trait OwnershipEnforcer {
    /// Verify that `client` may modify this resource.
    ///
    /// # Errors
    /// Returns `StorageError::PermissionDenied` otherwise.
    fn verify_ownership(&self, client: IpAddr) -> StorageResult<()>;

    /// Non-failing form of [`OwnershipEnforcer::verify_ownership`].
    fn is_owned_by(&self, client: IpAddr) -> bool {
        self.verify_ownership(client).is_ok()
    }
}

impl<T: OwnedResource> OwnershipEnforcer for T {
    fn verify_ownership(&self, client: IpAddr) -> StorageResult<()> {
        if client.is_loopback() || client.to_string() == self.owner_id() {
            Ok(())
        } else {
            Err(StorageError::PermissionDenied {
                client: client.to_string(),
                folder: self.owner_id().to_string(),
            })
        }
    }
}

/// An upload folder, named after its owner's IP.
#[derive(Debug, Clone, Copy)]
pub struct Folder<'a>(pub &'a str);

impl OwnedResource for Folder<'_> {
    fn owner_id(&self) -> &str {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn ownership_verification_passes_for_owner() {
        assert!(Folder("192.168.1.20")
            .verify_ownership(ip("192.168.1.20"))
            .is_ok());
        assert!(Folder("fe80::1").is_owned_by(ip("fe80::1")));
    }

    #[test]
    fn ownership_verification_fails_for_non_owner() {
        let result = Folder("192.168.1.20").verify_ownership(ip("192.168.1.21"));
        assert!(matches!(
            result,
            Err(StorageError::PermissionDenied { .. })
        ));
    }

    #[test]
    fn loopback_acts_for_every_folder() {
        assert!(Folder("192.168.1.20").is_owned_by(ip("127.0.0.1")));
        assert!(Folder("192.168.1.20").is_owned_by(ip("::1")));
        assert!(Folder("10.0.0.1").is_owned_by(ip("127.0.0.53")));
    }
}
