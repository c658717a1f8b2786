//! Driver and tool acquisition pipeline
//!
//! Downloads a catalog of vendor installers and archives into a normalized
//! tree (`<root>/<category>/<path>/...`), keeps a retry ledger of what failed,
//! and packs the finished tree into one archive.
//!
//! # Catalog
//!
//! ```toml
//! [[display]]
//! path = "Nvidia"
//! url = { strategy = "page-link", page = "https://vendor.example/nvidia", pattern = "\\.exe$" }
//! file_type = "exe"
//!
//! [[network]]
//! path = "Intel LAN"
//! url = "https://cdn.example/intel-lan.zip"
//! file_type = "zip/folder"
//! ```
//!
//! # Pipeline
//!
//! For each item the [`Orchestrator`]:
//! 1. resolves the download URL with a [`resolve::Strategy`] and the run's
//!    browser session
//! 2. streams the payload into a temp file with the [`Fetcher`], rejecting
//!    HTML answers
//! 3. places it with the [`Organizer`]: installers are moved, archives are
//!    extracted, flattened and their executable renamed
//!
//! Failures are handled by the [`ErrorPolicy`]: `exit` stops the run, `log`
//! records the item in the [`RetryLedger`] for `--retry-failed`, `ignore`
//! drops it.

pub mod acquire;
pub mod catalog;
pub mod config;
pub mod core;
pub mod error;
pub mod ledger;
pub mod organize;
pub mod pipeline;
pub mod resolve;

pub use acquire::{DownloadResult, Fetcher};
pub use catalog::{Catalog, CatalogItem, Category, FileKind, Lookup, UrlSource};
pub use config::{ExtractorKind, Settings};
pub use crate::core::{CancelToken, output};
pub use error::{ItemError, LedgerError, ResolveError, RunError};
pub use ledger::RetryLedger;
pub use organize::Organizer;
pub use pipeline::{ErrorPolicy, Orchestrator, RunMode, RunReport};
pub use resolve::Resolvers;
