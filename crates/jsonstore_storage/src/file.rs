//! File-based text store for persistent storage.

use crate::backend::TextStore;
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// How long a read or write keeps retrying while the file is in use.
pub const DEFAULT_RETRY_BUDGET: Duration = Duration::from_secs(10);

/// Pause between two attempts.
const RETRY_PAUSE: Duration = Duration::from_millis(1);

/// A file-based text store.
///
/// The whole file is read and replaced on every access. Access is
/// coordinated through an advisory lock on a sidecar `<file>.lock`:
/// readers take it shared, writers exclusive. Writes go to `<file>.tmp`
/// and are renamed over the target, so a reader sees either the old or the
/// new content and never a partial one.
///
/// # Contention
///
/// A lock held elsewhere (another handle, another process, an external
/// tool) is treated as transient. The operation is retried until the retry
/// budget elapses and then fails with [`StorageError::Contended`].
///
/// # Example
///
/// ```no_run
/// use jsonstore_storage::{FileTextStore, TextStore, DEFAULT_RETRY_BUDGET};
/// use std::path::Path;
///
/// let store = FileTextStore::open(Path::new("data.json"), DEFAULT_RETRY_BUDGET).unwrap();
/// store.write_text("{\"user\":[]}").unwrap();
/// ```
#[derive(Debug)]
pub struct FileTextStore {
    path: PathBuf,
    lock_path: PathBuf,
    temp_path: PathBuf,
    retry_budget: Duration,
}

impl FileTextStore {
    /// Opens a file store, creating parent directories and an empty file
    /// if the file doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if directories or the file cannot be created.
    pub fn open(path: &Path, retry_budget: Duration) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file.sync_all()?,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e.into()),
        }

        Ok(Self {
            path: path.to_path_buf(),
            lock_path: sidecar(path, "lock"),
            temp_path: sidecar(path, "tmp"),
            retry_budget,
        })
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of the advisory lock file.
    #[must_use]
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Returns the configured retry budget.
    #[must_use]
    pub fn retry_budget(&self) -> Duration {
        self.retry_budget
    }

    fn open_lock(&self) -> io::Result<File> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
    }

    fn try_read(&self) -> io::Result<String> {
        let lock = self.open_lock()?;
        FileExt::try_lock_shared(&lock)?;

        let mut text = String::new();
        match File::open(&self.path) {
            Ok(mut file) => {
                file.read_to_string(&mut text)?;
            }
            // Deleted underneath us: behaves like an empty store.
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        Ok(text)
    }

    fn try_write(&self, text: &str) -> io::Result<()> {
        let lock = self.open_lock()?;
        FileExt::try_lock_exclusive(&lock)?;

        {
            let mut temp = File::create(&self.temp_path)?;
            temp.write_all(text.as_bytes())?;
            temp.sync_all()?;
        }
        fs::rename(&self.temp_path, &self.path)
    }

    fn with_retry<T>(&self, mut op: impl FnMut() -> io::Result<T>) -> StorageResult<T> {
        let started = Instant::now();
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if is_transient(&e) => {
                    let waited = started.elapsed();
                    if waited >= self.retry_budget {
                        warn!(
                            path = %self.path.display(),
                            attempts,
                            ?waited,
                            "giving up on file still in use"
                        );
                        return Err(StorageError::Contended {
                            path: self.path.display().to_string(),
                            waited,
                        });
                    }
                    trace!(path = %self.path.display(), attempts, error = %e, "file in use, retrying");
                    thread::sleep(RETRY_PAUSE);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl TextStore for FileTextStore {
    fn read_text(&self) -> StorageResult<String> {
        self.with_retry(|| self.try_read())
    }

    fn write_text(&self, text: &str) -> StorageResult<()> {
        self.with_retry(|| self.try_write(text))
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

fn sidecar(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// Whether an error means "someone else holds the file right now".
fn is_transient(error: &io::Error) -> bool {
    if matches!(error.kind(), ErrorKind::WouldBlock | ErrorKind::PermissionDenied) {
        return true;
    }
    let code = error.raw_os_error();
    if code.is_some() && code == fs2::lock_contended_error().raw_os_error() {
        return true;
    }
    // ERROR_SHARING_VIOLATION / ERROR_LOCK_VIOLATION
    cfg!(windows) && matches!(code, Some(32) | Some(33))
}
