// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Filesystem operations for the upload tree.
//!
//! Plain files on local disk. Protected folders hold AES-256-GCM payloads
//! produced by [`crate::crypto`]; this layer never looks inside them.
//!
//! All writes that replace an existing file go through a hidden temp file
//! and a rename, so a reader sees either the old or the new bytes.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use super::UploadPaths;

/// Error type for upload storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error during file operations
    Io(io::Error),
    /// JSON serialization/deserialization error
    Json(serde_json::Error),
    /// Entity not found
    NotFound(String),
    /// Name rejected or resolved outside the upload root
    InvalidPath(String),
    /// Ownership check failed
    PermissionDenied { client: String, folder: String },
    /// Data read back differs from data written
    IntegrityViolation(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "I/O error: {e}"),
            StorageError::Json(e) => write!(f, "JSON error: {e}"),
            StorageError::NotFound(entity) => write!(f, "Not found: {entity}"),
            StorageError::InvalidPath(path) => write!(f, "Invalid path: {path}"),
            StorageError::PermissionDenied { client, folder } => {
                write!(f, "Permission denied: {client} cannot modify folder {folder}")
            }
            StorageError::IntegrityViolation(msg) => write!(f, "Integrity violation: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            StorageError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound(e.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Json(e)
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Upload tree manager.
#[derive(Debug, Clone)]
pub struct UploadStorage {
    paths: UploadPaths,
}

impl UploadStorage {
    pub fn new(paths: UploadPaths) -> Self {
        Self { paths }
    }

    /// Get the storage paths.
    pub fn paths(&self) -> &UploadPaths {
        &self.paths
    }

    /// Create the upload root. Safe to call multiple times.
    pub fn initialize(&self) -> StorageResult<()> {
        fs::create_dir_all(self.paths.root())?;
        Ok(())
    }

    /// Write-read-delete probe against the upload root.
    pub fn health_check(&self) -> StorageResult<()> {
        let test_file = self.paths.root().join(".health_check");
        let test_data = b"health_check_data";

        fs::write(&test_file, test_data)?;
        let read_data = fs::read(&test_file)?;
        fs::remove_file(&test_file)?;

        if read_data != test_data {
            return Err(StorageError::IntegrityViolation(
                "Health check data mismatch".to_string(),
            ));
        }
        Ok(())
    }

    // ========== Folder Resolution ==========

    /// Resolve a folder by name, rejecting unsafe names and escapes.
    pub fn folder(&self, folder: &str) -> StorageResult<PathBuf> {
        let dir = self
            .paths
            .folder_dir(folder)
            .ok_or_else(|| StorageError::InvalidPath(folder.to_string()))?;
        if dir.exists() && !self.paths.is_confined(&dir) {
            return Err(StorageError::InvalidPath(folder.to_string()));
        }
        Ok(dir)
    }

    /// Resolve a file inside a folder, rejecting unsafe names and escapes.
    pub fn file(&self, folder: &str, file: &str) -> StorageResult<PathBuf> {
        let path = self
            .paths
            .file_path(folder, file)
            .ok_or_else(|| StorageError::InvalidPath(format!("{folder}/{file}")))?;
        if path.exists() && !self.paths.is_confined(&path) {
            return Err(StorageError::InvalidPath(format!("{folder}/{file}")));
        }
        Ok(path)
    }

    /// Whether the folder exists as a directory.
    pub fn folder_exists(&self, folder: &str) -> bool {
        self.folder(folder).map(|p| p.is_dir()).unwrap_or(false)
    }

    /// Create the folder (and the root) if missing.
    pub fn ensure_folder(&self, folder: &str) -> StorageResult<PathBuf> {
        let dir = self.folder(folder)?;
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    // ========== Generic JSON Operations ==========

    /// Read a JSON file and deserialize it.
    pub fn read_json<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> StorageResult<T> {
        let file = File::open(path.as_ref())?;
        let reader = BufReader::new(file);
        let value = serde_json::from_reader(reader)?;
        Ok(value)
    }

    /// Write a JSON file (atomic write via rename).
    pub fn write_json<T: Serialize>(&self, path: impl AsRef<Path>, value: &T) -> StorageResult<()> {
        let path = path.as_ref();
        let temp_path = temp_path_for(path);
        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, value)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    // ========== Raw File Operations ==========

    /// Read raw bytes from a file.
    pub fn read_raw(&self, path: impl AsRef<Path>) -> StorageResult<Vec<u8>> {
        Ok(fs::read(path.as_ref())?)
    }

    /// Replace a file's contents atomically (temp file + rename).
    pub fn write_raw(&self, path: impl AsRef<Path>, data: &[u8]) -> StorageResult<()> {
        let path = path.as_ref();
        let temp_path = temp_path_for(path);
        let result = (|| {
            let mut file = File::create(&temp_path)?;
            file.write_all(data)?;
            file.sync_all()?;
            fs::rename(&temp_path, path)
        })();
        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        Ok(result?)
    }

    /// Delete a file.
    pub fn delete(&self, path: impl AsRef<Path>) -> StorageResult<()> {
        fs::remove_file(path.as_ref())?;
        Ok(())
    }

    /// Delete a directory and all its contents.
    pub fn delete_dir(&self, path: impl AsRef<Path>) -> StorageResult<()> {
        fs::remove_dir_all(path.as_ref())?;
        Ok(())
    }

    // ========== Listings ==========

    /// Names of the regular, non-hidden files directly in `dir`, sorted.
    ///
    /// Symlinks are not followed and not listed.
    pub fn list_files(&self, dir: impl AsRef<Path>) -> StorageResult<Vec<String>> {
        self.list_entries(dir.as_ref(), |ft| ft.is_file())
    }

    /// Names of the non-hidden subdirectories of `dir`, sorted.
    pub fn list_dirs(&self, dir: impl AsRef<Path>) -> StorageResult<Vec<String>> {
        self.list_entries(dir.as_ref(), |ft| ft.is_dir())
    }

    fn list_entries(
        &self,
        dir: &Path,
        keep: impl Fn(&fs::FileType) -> bool,
    ) -> StorageResult<Vec<String>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !keep(&entry.file_type()?) {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Hidden sibling used for atomic replacement; never shows up in listings.
fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    fn test_storage() -> (tempfile::TempDir, UploadStorage) {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = UploadStorage::new(UploadPaths::new(dir.path()));
        storage.initialize().expect("Failed to initialize test storage");
        (dir, storage)
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestData {
        id: String,
        value: i32,
    }

    #[test]
    fn health_check_passes() {
        let (_dir, storage) = test_storage();
        assert!(storage.health_check().is_ok());
        assert!(!storage.paths().root().join(".health_check").exists());
    }

    #[test]
    fn health_check_fails_without_root() {
        let dir = tempfile::tempdir().unwrap();
        let storage = UploadStorage::new(UploadPaths::new(dir.path().join("missing")));
        assert!(storage.health_check().is_err());
    }

    #[test]
    fn json_roundtrip_leaves_no_temp_file() {
        let (_dir, storage) = test_storage();
        let path = storage.paths().pins_file();
        let data = TestData {
            id: "x".into(),
            value: 7,
        };

        storage.write_json(&path, &data).unwrap();
        let back: TestData = storage.read_json(&path).unwrap();
        assert_eq!(back, data);
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn read_missing_file_is_not_found() {
        let (_dir, storage) = test_storage();
        let result: StorageResult<TestData> = storage.read_json(storage.paths().pins_file());
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn raw_write_replaces_contents() {
        let (_dir, storage) = test_storage();
        let dir = storage.ensure_folder("10.1.1.1").unwrap();
        let file = dir.join("a.bin");

        storage.write_raw(&file, b"first").unwrap();
        storage.write_raw(&file, b"second").unwrap();
        assert_eq!(storage.read_raw(&file).unwrap(), b"second");
        assert_eq!(storage.list_files(&dir).unwrap(), vec!["a.bin"]);
    }

    #[test]
    fn listings_skip_hidden_entries_and_sort() {
        let (_dir, storage) = test_storage();
        let root = storage.paths().root().to_path_buf();
        storage.ensure_folder("b").unwrap();
        storage.ensure_folder("a").unwrap();
        fs::create_dir(root.join(".hidden")).unwrap();
        storage.write_json(storage.paths().pins_file(), &1).unwrap();

        assert_eq!(storage.list_dirs(&root).unwrap(), vec!["a", "b"]);
        assert!(storage.list_files(&root).unwrap().is_empty());

        let folder = root.join("a");
        fs::write(folder.join("z.txt"), b"z").unwrap();
        fs::write(folder.join("y.txt"), b"y").unwrap();
        fs::write(folder.join(".y.txt.tmp"), b"partial").unwrap();
        fs::create_dir(folder.join("nested")).unwrap();
        assert_eq!(storage.list_files(&folder).unwrap(), vec!["y.txt", "z.txt"]);
    }

    #[test]
    fn listing_missing_dir_is_empty() {
        let (_dir, storage) = test_storage();
        let missing = storage.paths().root().join("nope");
        assert!(storage.list_files(&missing).unwrap().is_empty());
    }

    #[test]
    fn unsafe_names_are_rejected() {
        let (_dir, storage) = test_storage();
        assert!(matches!(
            storage.folder(".."),
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(
            storage.file("ok", "../../x"),
            Err(StorageError::InvalidPath(_))
        ));
        assert!(!storage.folder_exists("../"));
    }

    #[test]
    fn delete_dir_removes_tree() {
        let (_dir, storage) = test_storage();
        let dir = storage.ensure_folder("1.1.1.1").unwrap();
        fs::write(dir.join("f"), b"f").unwrap();

        storage.delete_dir(&dir).unwrap();
        assert!(!storage.folder_exists("1.1.1.1"));
    }
}
