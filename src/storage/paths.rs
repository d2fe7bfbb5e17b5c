// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for the upload tree.
//!
//! ```text
//! uploads/
//!   .folder_pins.json     # PIN / wrapped-key records, keyed by folder
//!   {client_ip}/          # one folder per uploader
//!     {file}
//! ```
//!
//! Every user-supplied name goes through [`validate_component`] before it
//! is joined, so a folder or file name can never climb out of the root.

use std::path::{Path, PathBuf};

/// Default upload root, relative to the working directory.
pub const DEFAULT_UPLOAD_ROOT: &str = "uploads";

/// Metadata file holding the folder records.
pub const PINS_FILE: &str = ".folder_pins.json";

/// Storage path utilities for the upload tree.
#[derive(Debug, Clone)]
pub struct UploadPaths {
    root: PathBuf,
}

impl Default for UploadPaths {
    fn default() -> Self {
        Self::new(DEFAULT_UPLOAD_ROOT)
    }
}

impl UploadPaths {
    /// Create a new UploadPaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory holding every folder.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the folder record store.
    pub fn pins_file(&self) -> PathBuf {
        self.root.join(PINS_FILE)
    }

    /// Directory for a folder. `None` if the name is not a safe component.
    pub fn folder_dir(&self, folder: &str) -> Option<PathBuf> {
        validate_component(folder)?;
        Some(self.root.join(folder))
    }

    /// Path to a file inside a folder. `None` if either name is unsafe.
    pub fn file_path(&self, folder: &str, file: &str) -> Option<PathBuf> {
        validate_component(file)?;
        Some(self.folder_dir(folder)?.join(file))
    }

    /// Confirm that an existing path resolves under the canonical root.
    ///
    /// Catches symlinks planted inside a folder. Paths that do not exist
    /// yet are checked by their parent.
    pub fn is_confined(&self, path: &Path) -> bool {
        let Ok(root) = self.root.canonicalize() else {
            return false;
        };
        let resolved = match path.canonicalize() {
            Ok(p) => p,
            Err(_) => match path.parent().map(Path::canonicalize) {
                Some(Ok(parent)) => parent,
                _ => return false,
            },
        };
        resolved.starts_with(&root)
    }
}

/// Accept a single, visible path component.
///
/// Rejects empty names, `.`/`..`, separators, NUL and leading dots (which
/// also keeps the metadata file out of reach).
pub fn validate_component(name: &str) -> Option<&str> {
    if name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0'])
        || name.len() > 255
    {
        return None;
    }
    Some(name)
}

/// Reduce an uploaded filename to a safe basename.
///
/// Keeps `[A-Za-z0-9._-]`, turns whitespace into `_`, drops everything
/// else and strips leading dots and underscores. Returns `None` when
/// nothing usable is left.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);

    let mut cleaned = String::with_capacity(base.len());
    for c in base.trim().chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
            cleaned.push(c);
        } else if c.is_whitespace() {
            cleaned.push('_');
        }
    }

    let cleaned = cleaned.trim_start_matches(['.', '_']).to_string();
    validate_component(&cleaned)?;
    Some(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_use_upload_root() {
        let paths = UploadPaths::default();
        assert_eq!(paths.root(), Path::new("uploads"));
        assert_eq!(paths.pins_file(), PathBuf::from("uploads/.folder_pins.json"));
    }

    #[test]
    fn folder_and_file_paths_are_correct() {
        let paths = UploadPaths::new("/tmp/drop");
        assert_eq!(
            paths.folder_dir("10.0.0.7"),
            Some(PathBuf::from("/tmp/drop/10.0.0.7"))
        );
        assert_eq!(
            paths.file_path("::1", "report.pdf"),
            Some(PathBuf::from("/tmp/drop/::1/report.pdf"))
        );
    }

    #[test]
    fn traversal_components_are_rejected() {
        let paths = UploadPaths::new("/tmp/drop");
        for bad in ["", ".", "..", "../etc", "a/b", "a\\b", ".folder_pins.json", "nul\0"] {
            assert!(paths.folder_dir(bad).is_none(), "{bad:?} accepted");
            assert!(paths.file_path("ok", bad).is_none(), "{bad:?} accepted");
        }
    }

    #[test]
    fn sanitize_keeps_basename_only() {
        assert_eq!(
            sanitize_filename("../../etc/passwd").as_deref(),
            Some("passwd")
        );
        assert_eq!(
            sanitize_filename("C:\\Users\\me\\My File (1).txt").as_deref(),
            Some("My_File_1.txt")
        );
        assert_eq!(sanitize_filename(".bashrc").as_deref(), Some("bashrc"));
        assert_eq!(sanitize_filename("résumé.pdf").as_deref(), Some("rsum.pdf"));
        assert_eq!(sanitize_filename("..."), None);
        assert_eq!(sanitize_filename(""), None);
    }

    #[test]
    fn confinement_follows_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let paths = UploadPaths::new(dir.path());

        let folder = dir.path().join("1.2.3.4");
        std::fs::create_dir(&folder).unwrap();
        std::fs::write(folder.join("a.txt"), b"a").unwrap();
        assert!(paths.is_confined(&folder.join("a.txt")));
        assert!(paths.is_confined(&folder.join("not-yet.txt")));

        #[cfg(unix)]
        {
            std::fs::write(outside.path().join("secret"), b"s").unwrap();
            std::os::unix::fs::symlink(outside.path().join("secret"), folder.join("link")).unwrap();
            assert!(!paths.is_confined(&folder.join("link")));
        }
        #[cfg(not(unix))]
        let _ = outside;
    }
}
