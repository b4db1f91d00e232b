//! Byte-level file access for the vault stores.
//!
//! Both [`ConfigStore`](crate::config::ConfigStore) and
//! [`ConnectionStore`](crate::store::ConnectionStore) reach the filesystem
//! only through the [`Storage`] trait. Files are addressed by a bare name
//! relative to the storage's application directory.
//!
//! - [`FsStorage`] is the real implementation. Whole-file rewrites go through
//!   a temporary sibling file and an atomic `rename`, so a crash mid-write
//!   leaves either the old or the new content, never a truncated file.
//! - [`MemoryStorage`] keeps files in a map and is meant for tests.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::{Result, VaultError};

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// The narrow filesystem surface used by the stores.
pub trait Storage: Send + Sync {
    /// The directory all names are resolved against.
    fn app_dir(&self) -> &Path;

    /// Whether `name` exists.
    fn exists(&self, name: &str) -> bool;

    /// Read the whole file.
    ///
    /// Fails with an [`io::ErrorKind::NotFound`] I/O error if it is absent.
    fn read_all(&self, name: &str) -> Result<Vec<u8>>;

    /// Open the file for streaming reads.
    fn open_read(&self, name: &str) -> Result<Box<dyn Read + Send>>;

    /// Create an empty file if it does not exist yet.
    fn create(&self, name: &str) -> Result<()>;

    /// Append `bytes` to the file, creating it if needed.
    fn append(&self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Replace the whole file with `bytes` in one atomic step.
    fn replace(&self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Like [`read_all`](Storage::read_all) but maps a missing file to `None`.
    fn read_optional(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match self.read_all(name) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(VaultError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Filesystem
// ---------------------------------------------------------------------------

/// [`Storage`] over a directory on the local filesystem.
///
/// Files are created with mode `0600` on Unix since both the config file and
/// the connection document hold secret material.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Create a storage rooted at `root`. The directory is created lazily on
    /// the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    fn open_options() -> OpenOptions {
        #[allow(unused_mut)]
        let mut opts = OpenOptions::new();
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(0o600);
        }
        opts
    }

    fn write_temp(temp_path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut file = Self::open_options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()
    }
}

impl Storage for FsStorage {
    fn app_dir(&self) -> &Path {
        &self.root
    }

    fn exists(&self, name: &str) -> bool {
        self.path(name).is_file()
    }

    fn read_all(&self, name: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.path(name))?)
    }

    fn open_read(&self, name: &str) -> Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(self.path(name))?))
    }

    fn create(&self, name: &str) -> Result<()> {
        self.ensure_dir()?;
        Self::open_options()
            .append(true)
            .create(true)
            .open(self.path(name))?;
        Ok(())
    }

    fn append(&self, name: &str, bytes: &[u8]) -> Result<()> {
        self.ensure_dir()?;
        let mut file = Self::open_options()
            .append(true)
            .create(true)
            .open(self.path(name))?;
        file.write_all(bytes)?;
        file.sync_data()?;
        Ok(())
    }

    fn replace(&self, name: &str, bytes: &[u8]) -> Result<()> {
        self.ensure_dir()?;
        let target = self.path(name);
        let temp_path = self.root.join(format!(".{name}.tmp"));

        let written =
            Self::write_temp(&temp_path, bytes).and_then(|()| fs::rename(&temp_path, &target));
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        tracing::trace!(path = %target.display(), len = bytes.len(), "replaced file");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// [`Storage`] backed by a map of file name to contents.
#[derive(Debug)]
pub struct MemoryStorage {
    root: PathBuf,
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("memory"),
            files: Mutex::new(HashMap::new()),
        }
    }

    fn files(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn not_found(name: &str) -> VaultError {
        VaultError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{name} does not exist"),
        ))
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn app_dir(&self) -> &Path {
        &self.root
    }

    fn exists(&self, name: &str) -> bool {
        self.files().contains_key(name)
    }

    fn read_all(&self, name: &str) -> Result<Vec<u8>> {
        self.files()
            .get(name)
            .cloned()
            .ok_or_else(|| Self::not_found(name))
    }

    fn open_read(&self, name: &str) -> Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.read_all(name)?)))
    }

    fn create(&self, name: &str) -> Result<()> {
        self.files().entry(name.to_string()).or_default();
        Ok(())
    }

    fn append(&self, name: &str, bytes: &[u8]) -> Result<()> {
        self.files()
            .entry(name.to_string())
            .or_default()
            .extend_from_slice(bytes);
        Ok(())
    }

    fn replace(&self, name: &str, bytes: &[u8]) -> Result<()> {
        self.files().insert(name.to_string(), bytes.to_vec());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn fs_create_and_exists() {
        let dir = tempdir().unwrap();
        let storage = FsStorage::new(dir.path().join("app"));

        assert!(!storage.exists("config"));
        storage.create("config").unwrap();
        assert!(storage.exists("config"));
        assert!(storage.read_all("config").unwrap().is_empty());
        assert!(!storage.exists("other"));
    }

    #[test]
    fn fs_append_and_read() {
        let dir = tempdir().unwrap();
        let storage = FsStorage::new(dir.path());

        storage.append("log", b"one\n").unwrap();
        storage.append("log", b"two\n").unwrap();

        assert_eq!(storage.read_all("log").unwrap(), b"one\ntwo\n");

        let mut streamed = String::new();
        storage
            .open_read("log")
            .unwrap()
            .read_to_string(&mut streamed)
            .unwrap();
        assert_eq!(streamed, "one\ntwo\n");
    }

    #[test]
    fn fs_replace_overwrites_and_cleans_up() {
        let dir = tempdir().unwrap();
        let storage = FsStorage::new(dir.path());

        storage.append("doc.json", b"a much longer original body").unwrap();
        storage.replace("doc.json", b"short").unwrap();

        assert_eq!(storage.read_all("doc.json").unwrap(), b"short");
        assert!(!dir.path().join(".doc.json.tmp").exists());
    }

    #[test]
    fn fs_failed_replace_keeps_target() {
        let dir = tempdir().unwrap();
        let storage = FsStorage::new(dir.path());

        // A non-empty directory cannot be the target of a rename.
        std::fs::create_dir_all(dir.path().join("doc.json").join("inner")).unwrap();

        assert!(storage.replace("doc.json", b"{}").is_err());
        assert!(dir.path().join("doc.json").join("inner").is_dir());
        assert!(!dir.path().join(".doc.json.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn fs_files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let storage = FsStorage::new(dir.path());
        storage.replace("secret", b"x").unwrap();

        let mode = std::fs::metadata(dir.path().join("secret"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn read_optional_maps_missing_to_none() {
        let dir = tempdir().unwrap();
        let storage = FsStorage::new(dir.path());
        assert!(storage.read_optional("nope").unwrap().is_none());

        let memory = MemoryStorage::new();
        assert!(memory.read_optional("nope").unwrap().is_none());
        memory.append("x", b"1").unwrap();
        assert_eq!(memory.read_optional("x").unwrap().unwrap(), b"1");
    }
}
