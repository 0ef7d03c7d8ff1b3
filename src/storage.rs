use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::error::{map_io_err, EditorError, EditorResult};

/// Demo configuration written by `seed_default`
pub const DEFAULT_CONFIG: &str = "hostname rtr1\n!\n! some config\n!\nbanner motd ^C\nTest Banner\n^C\n";

/// The single device configuration file, with a single-writer lock
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

/// Held for the duration of one read-modify-write cycle
pub struct StoreGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl ConfigStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for exclusive access to the file
    pub async fn lock(&self) -> StoreGuard<'_> {
        debug!("Acquiring store lock for {}", self.path.display());
        StoreGuard {
            _guard: self.lock.lock().await,
        }
    }

    /// Read the whole file. `Ok(None)` when it does not exist.
    pub fn read(&self) -> EditorResult<Option<String>> {
        debug!("Reading config file: {}", self.path.display());
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(map_io_err(&self.path)(e)),
        }
    }

    /// Replace the file contents atomically.
    ///
    /// Symlinks are followed and the existing file's permissions carry over
    /// to the replacement.
    pub fn write(&self, content: &str) -> EditorResult<()> {
        let target = match fs::canonicalize(&self.path) {
            Ok(resolved) => resolved,
            Err(e) if e.kind() == ErrorKind::NotFound => self.path.clone(),
            Err(e) => return Err(map_io_err(&self.path)(e)),
        };
        debug!(
            "Writing {} bytes to config file: {}",
            content.len(),
            target.display()
        );

        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(map_io_err(&dir))?;
        tmp.write_all(content.as_bytes())
            .map_err(map_io_err(tmp.path()))?;

        match fs::metadata(&target) {
            Ok(meta) => tmp
                .as_file()
                .set_permissions(meta.permissions())
                .map_err(map_io_err(tmp.path()))?,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(map_io_err(&target)(e)),
        }

        tmp.as_file().sync_all().map_err(map_io_err(tmp.path()))?;
        tmp.persist(&target)
            .map_err(|e| map_io_err(&target)(e.error))?;

        Ok(())
    }

    /// `read` on the blocking thread pool
    pub async fn read_async(&self) -> EditorResult<Option<String>> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.read())
            .await
            .map_err(|e| EditorError::other(format!("Config read task failed: {}", e)))?
    }

    /// `write` on the blocking thread pool
    pub async fn write_async(&self, content: String) -> EditorResult<()> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.write(&content))
            .await
            .map_err(|e| EditorError::other(format!("Config write task failed: {}", e)))?
    }

    /// Create the file with the demo config if it is missing.
    /// Returns whether a file was created.
    pub fn seed_default(&self) -> EditorResult<bool> {
        if self.path.exists() {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(map_io_err(parent))?;
            }
        }

        info!(
            "File '{}' not found. Creating a default file.",
            self.path.display()
        );
        self.write(DEFAULT_CONFIG)?;
        Ok(true)
    }
}
