//! Error types for the acquisition pipeline.
//!
//! Per-item failures are [`ItemError`]s. The orchestrator treats every kind the
//! same way; the variants exist so tests and logs can tell them apart.

use crate::catalog::Category;
use std::path::PathBuf;
use thiserror::Error;

/// Failures while turning a URL source into a concrete download URL.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("unknown resolution strategy: {0}")]
    UnknownStrategy(String),

    #[error("strategy '{strategy}' requires parameter '{param}'")]
    MissingParam { strategy: String, param: String },

    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("cannot open {url}: {reason}")]
    Navigation { url: String, reason: String },

    #[error("no link matching '{pattern}' on {page}")]
    NoMatch { page: String, pattern: String },

    #[error("resolved URL is not http(s): {0}")]
    InvalidUrl(String),

    #[error("browser session unavailable: {0}")]
    Session(String),
}

/// Why a single catalog item failed.
#[derive(Error, Debug)]
pub enum ItemError {
    #[error("could not locate download URL: {0}")]
    Resolution(#[from] ResolveError),

    #[error("{0}")]
    Transport(String),

    #[error("received an HTML page instead of a file ({content_type}) from {url}")]
    UnexpectedContent { url: String, content_type: String },

    #[error("failed to extract archive (status {status}): {reason}")]
    Extraction { status: i32, reason: String },

    #[error("expected exactly one executable, found {found}: {candidates:?}")]
    AmbiguousExecutable {
        found: usize,
        candidates: Vec<String>,
    },

    #[error("expected a single top-level folder in archive, found: {entries:?}")]
    Layout { entries: Vec<String> },

    #[error("cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ItemError {
    pub(crate) fn transport(url: &str, reason: impl std::fmt::Display) -> Self {
        Self::Transport(format!("download failed for {}: {}", url, reason))
    }
}

/// Retry ledger failures.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("no retry ledger at {0}")]
    NotFound(PathBuf),

    #[error("cannot access retry ledger {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt retry ledger {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures that end a whole run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("[{category}] {path} failed, aborting: {source}")]
    Aborted {
        category: Category,
        path: String,
        #[source]
        source: ItemError,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Lock(#[from] crate::core::LockError),

    #[error("cannot prepare destination {path}: {source}")]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Session(ResolveError),
}
