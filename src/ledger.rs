//! Retry ledger
//!
//! Items that failed under the `log` policy are written to
//! `<root>/.failed-downloads.json` in the catalog's own shape, lookup
//! parameters included, so `--retry-failed` re-runs the exact same units of
//! work.

use crate::catalog::Catalog;
use crate::error::LedgerError;
use std::io::Write;
use std::path::{Path, PathBuf};

/// File name of the ledger inside the destination root.
pub const LEDGER_FILE: &str = ".failed-downloads.json";

/// The ledger of one destination root.
#[derive(Debug, Clone)]
pub struct RetryLedger {
    path: PathBuf,
}

impl RetryLedger {
    pub fn new(root: &Path) -> Self {
        Self {
            path: root.join(LEDGER_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the failures of the previous run.
    ///
    /// A missing ledger is [`LedgerError::NotFound`], never an empty catalog.
    pub fn load(&self) -> Result<Catalog, LedgerError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LedgerError::NotFound(self.path.clone()));
            }
            Err(source) => {
                return Err(LedgerError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        serde_json::from_str(&content).map_err(|source| LedgerError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Replace the ledger with `failures`.
    ///
    /// Written to a temp file in the same directory and renamed into place, so
    /// an interrupted write leaves the previous ledger intact.
    pub fn save(&self, failures: &Catalog) -> Result<(), LedgerError> {
        let io_err = |source: std::io::Error| LedgerError::Io {
            path: self.path.clone(),
            source,
        };

        let content = serde_json::to_string_pretty(failures).map_err(|source| {
            LedgerError::Parse {
                path: self.path.clone(),
                source,
            }
        })?;

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(io_err)?;

        let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        temp.write_all(content.as_bytes()).map_err(io_err)?;
        temp.write_all(b"\n").map_err(io_err)?;
        temp.persist(&self.path).map_err(|e| io_err(e.error))?;

        tracing::info!(ledger = %self.path.display(), items = failures.len(), "retry ledger written");
        Ok(())
    }

    /// Remove the ledger. Succeeds when there is none.
    pub fn clear(&self) -> Result<(), LedgerError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(ledger = %self.path.display(), "retry ledger cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(LedgerError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}
