//! Destination lock management
//!
//! Provides exclusive locking so two runs never write into the same
//! destination tree at once. The lock file sits next to the destination root
//! (`drivers` -> `drivers.lock`) because a fresh run deletes the root itself.

use fs2::FileExt;
use std::fs::File;
use std::path::{Path, PathBuf};

/// How old a lock file can be before it's considered stale (2 hours)
const STALE_LOCK_AGE_SECS: u64 = 7200;

/// Lock acquisition failures.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error(
        "destination '{root}' is already in use by another run. If this is incorrect, delete '{lock}'"
    )]
    Busy { root: PathBuf, lock: PathBuf },

    #[error("failed to create lock file {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Path of the lock file guarding `root`.
pub fn lock_path_for(root: &Path) -> PathBuf {
    let mut name = root
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "destination".into());
    name.push(".lock");
    root.with_file_name(name)
}

fn is_stale_lock(lock_path: &Path) -> bool {
    if let Ok(metadata) = std::fs::metadata(lock_path)
        && let Ok(modified) = metadata.modified()
        && let Ok(age) = std::time::SystemTime::now().duration_since(modified)
    {
        return age.as_secs() > STALE_LOCK_AGE_SECS;
    }
    false
}

/// Whether another run still holds the lock on `lock_path`.
fn is_held(lock_path: &Path) -> bool {
    match File::open(lock_path) {
        // The probe lock is released when `file` closes.
        Ok(file) => file.try_lock_exclusive().is_err(),
        Err(_) => false,
    }
}

/// Acquire an exclusive lock on a destination root.
/// Returns a guard that releases the lock when dropped.
pub fn acquire_destination_lock(root: &Path) -> Result<DestinationLock, LockError> {
    let lock_path = lock_path_for(root);

    if lock_path.exists() && is_stale_lock(&lock_path) && !is_held(&lock_path) {
        tracing::warn!(lock = %lock_path.display(), "removing stale destination lock");
        let _ = std::fs::remove_file(&lock_path);
    }

    if let Some(parent) = lock_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| LockError::Create {
            path: lock_path.clone(),
            source,
        })?;
    }

    let lock_file = File::create(&lock_path).map_err(|source| LockError::Create {
        path: lock_path.clone(),
        source,
    })?;

    if lock_file.try_lock_exclusive().is_err() {
        return Err(LockError::Busy {
            root: root.to_path_buf(),
            lock: lock_path,
        });
    }

    Ok(DestinationLock {
        _file: lock_file,
        path: lock_path,
    })
}

/// RAII guard for a destination lock - releases the lock and deletes the lock file when dropped
#[derive(Debug)]
pub struct DestinationLock {
    _file: File,
    path: PathBuf,
}

impl DestinationLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DestinationLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
