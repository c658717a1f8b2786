//! Acquisition orchestrator
//!
//! Drives every catalog item through
//! `Pending -> Resolving -> Downloading -> Organizing -> Done | Failed`
//! one at a time against a single browser session, and folds the per-item
//! results into a failure catalog according to the [`ErrorPolicy`].
//!
//! A fresh run deletes and recreates the destination root; a retry run keeps
//! it and takes its items from the [`RetryLedger`]. Under [`ErrorPolicy::Log`]
//! the failures of a run replace the ledger; a run without failures removes it.

use crate::acquire::Fetcher;
use crate::catalog::{Catalog, CatalogItem, Category, UrlSource};
use crate::config::Settings;
use crate::core::{CancelToken, DestinationLock, acquire_destination_lock, output, progress};
use crate::error::{ItemError, RunError};
use crate::ledger::RetryLedger;
use crate::organize::{Organizer, sweep_scratch};
use crate::resolve::{HttpSessionProvider, Resolvers, Session, SessionProvider};
use std::fmt;
use std::path::{Path, PathBuf};

/// What happens when an item fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ErrorPolicy {
    /// Stop the whole run at the first failure; the ledger is left alone.
    #[value(name = "exit")]
    Abort,
    /// Record the failure for `--retry-failed` and carry on.
    #[default]
    Log,
    /// Drop the failure and carry on.
    Ignore,
}

/// Where the items of a run come from and what happens to the destination root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Clear the destination root and process the whole catalog.
    Fresh,
    /// Keep the destination root and process the ledger's items.
    Retry,
}

/// Lifecycle of a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Pending,
    Resolving,
    Downloading,
    Organizing,
    Done,
    Failed,
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Resolving => "resolving",
            Self::Downloading => "downloading",
            Self::Organizing => "organizing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Whether the run continues after an item.
#[derive(Debug)]
pub enum Flow {
    Continue,
    Stop(ItemError),
}

/// Fold one item result into `failures`.
///
/// Every error kind is treated the same; only the policy decides.
pub fn apply_policy(
    policy: ErrorPolicy,
    failures: &mut Catalog,
    category: Category,
    item: &CatalogItem,
    result: Result<(), ItemError>,
) -> Flow {
    match (result, policy) {
        (Ok(()), _) => Flow::Continue,
        (Err(e), ErrorPolicy::Abort) => Flow::Stop(e),
        (Err(_), ErrorPolicy::Log) => {
            failures.push(category, item.clone());
            Flow::Continue
        }
        (Err(_), ErrorPolicy::Ignore) => Flow::Continue,
    }
}

/// Outcome of a completed run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Items that failed, as stored in the ledger. Empty unless the policy is `log`.
    pub failures: Catalog,
    pub attempted: usize,
    pub succeeded: usize,
    /// The run stopped early because of a cancellation request.
    pub cancelled: bool,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}

pub struct Orchestrator {
    root: PathBuf,
    resolvers: Resolvers,
    sessions: Box<dyn SessionProvider>,
    fetcher: Fetcher,
    organizer: Organizer,
    cancel: CancelToken,
}

impl Orchestrator {
    /// Orchestrator for `root` with the built-in strategies and an HTTP session.
    pub fn new(root: impl Into<PathBuf>, settings: &Settings, cancel: CancelToken) -> Self {
        Self {
            root: root.into(),
            resolvers: Resolvers::default(),
            sessions: Box::new(HttpSessionProvider::new(
                settings.http_timeout,
                &settings.user_agent,
            )),
            fetcher: Fetcher::new(settings, cancel.clone()),
            organizer: Organizer::from_settings(settings, cancel.clone()),
            cancel,
        }
    }

    pub fn with_resolvers(mut self, resolvers: Resolvers) -> Self {
        self.resolvers = resolvers;
        self
    }

    pub fn with_session_provider(mut self, sessions: impl SessionProvider + 'static) -> Self {
        self.sessions = Box::new(sessions);
        self
    }

    pub fn with_organizer(mut self, organizer: Organizer) -> Self {
        self.organizer = organizer;
        self
    }

    /// Strategy names used in `catalog` that have no registered resolver.
    pub fn unknown_strategies(&self, catalog: &Catalog) -> Vec<String> {
        let mut unknown: Vec<String> = catalog
            .entries()
            .filter_map(|(_, item)| match &item.url_source {
                UrlSource::Lookup(lookup) if !self.resolvers.contains(&lookup.strategy) => {
                    Some(lookup.strategy.clone())
                }
                _ => None,
            })
            .collect();
        unknown.sort();
        unknown.dedup();
        unknown
    }

    pub fn ledger(&self) -> RetryLedger {
        RetryLedger::new(&self.root)
    }

    /// Acquire every item of `catalog`.
    pub fn run(
        &self,
        catalog: &Catalog,
        policy: ErrorPolicy,
        mode: RunMode,
    ) -> Result<RunReport, RunError> {
        let _lock = self.lock()?;
        self.run_locked(catalog, policy, mode)
    }

    /// Re-run the failures recorded by the previous run.
    ///
    /// Fails with [`crate::error::LedgerError::NotFound`] when there is nothing
    /// to retry.
    pub fn retry(&self, policy: ErrorPolicy) -> Result<RunReport, RunError> {
        let _lock = self.lock()?;
        let catalog = self.ledger().load()?;
        output::info(&format!(
            "Retrying {} failed item(s) from {}",
            catalog.len(),
            self.ledger().path().display()
        ));
        self.run_locked(&catalog, policy, RunMode::Retry)
    }

    fn lock(&self) -> Result<DestinationLock, RunError> {
        let lock = acquire_destination_lock(&self.root)?;
        tracing::debug!(lock = %lock.path().display(), "destination locked");
        Ok(lock)
    }

    fn run_locked(
        &self,
        catalog: &Catalog,
        policy: ErrorPolicy,
        mode: RunMode,
    ) -> Result<RunReport, RunError> {
        self.prepare_destination(catalog, mode)?;

        let total = catalog.len();
        output::action(&format!(
            "Acquiring {} item(s) into {}",
            total,
            self.root.display()
        ));

        let mut session = self.sessions.open().map_err(RunError::Session)?;
        let mut report = RunReport::default();
        let entries: Vec<_> = catalog.entries().collect();

        for (index, (category, item)) in entries.iter().enumerate() {
            output::action_numbered(
                index + 1,
                total,
                &format!("[{}] {}", category, item.relative_path),
            );
            log_state(*category, item, ItemState::Pending);
            report.attempted += 1;

            let result = self.acquire(session.as_mut(), *category, item);
            match &result {
                Ok(placed) => {
                    report.succeeded += 1;
                    log_state(*category, item, ItemState::Done);
                    for path in placed {
                        output::item_done(&path.display().to_string());
                    }
                }
                Err(e) => {
                    log_state(*category, item, ItemState::Failed);
                    tracing::warn!(%category, path = %item.relative_path, error = %e, "item failed");
                    output::item_failed(&e.to_string());
                }
            }

            let result = result.map(|_| ());
            if let Flow::Stop(source) =
                apply_policy(policy, &mut report.failures, *category, item, result)
            {
                return Err(RunError::Aborted {
                    category: *category,
                    path: item.relative_path.clone(),
                    source,
                });
            }

            if self.cancel.is_cancelled() {
                report.cancelled = true;
                let remaining = &entries[index + 1..];
                output::warning(&format!(
                    "Cancelled, {} item(s) not attempted",
                    remaining.len()
                ));
                if policy == ErrorPolicy::Log {
                    for (category, item) in remaining {
                        report.failures.push(*category, (*item).clone());
                    }
                }
                break;
            }
        }

        drop(session);
        self.finish_ledger(policy, &report)?;
        Ok(report)
    }

    /// Fresh runs start from an empty root; every category directory exists
    /// before the first item.
    fn prepare_destination(&self, catalog: &Catalog, mode: RunMode) -> Result<(), RunError> {
        if mode == RunMode::Fresh && self.root.exists() {
            tracing::info!(root = %self.root.display(), "clearing destination");
            std::fs::remove_dir_all(&self.root).map_err(destination_error(&self.root))?;
        }
        std::fs::create_dir_all(&self.root).map_err(destination_error(&self.root))?;

        for category in catalog.categories() {
            let dir = self.root.join(category.as_str());
            std::fs::create_dir_all(&dir).map_err(destination_error(&dir))?;
        }
        Ok(())
    }

    fn finish_ledger(&self, policy: ErrorPolicy, report: &RunReport) -> Result<(), RunError> {
        let ledger = self.ledger();
        if policy == ErrorPolicy::Log && !report.failures.is_empty() {
            ledger.save(&report.failures)?;
        } else {
            ledger.clear()?;
        }
        Ok(())
    }

    /// Resolve, download and organize one item. Returns the placed paths.
    fn acquire(
        &self,
        session: &mut dyn Session,
        category: Category,
        item: &CatalogItem,
    ) -> Result<Vec<PathBuf>, ItemError> {
        if self.cancel.is_cancelled() {
            return Err(ItemError::Cancelled);
        }

        log_state(category, item, ItemState::Resolving);
        output::sub_action("locating download URL");
        let url = progress::with_spinner("resolving", || {
            self.resolvers.resolve(&item.url_source, session)
        })?;
        output::detail(&url);

        log_state(category, item, ItemState::Downloading);
        output::sub_action("downloading");
        let dest = self.root.join(category.as_str()).join(&item.relative_path);
        std::fs::create_dir_all(&dest)?;
        let swept = sweep_scratch(&dest)?;
        if swept > 0 {
            tracing::info!(dest = %dest.display(), swept, "cleared leftovers of an interrupted run");
        }
        let download = self.fetcher.fetch(&url, &dest)?;

        log_state(category, item, ItemState::Organizing);
        output::sub_action("organizing");
        self.organizer
            .organize(download, item.file_kind, item.rename_as.as_deref(), &dest)
    }
}

fn destination_error(path: &Path) -> impl FnOnce(std::io::Error) -> RunError {
    let path = path.to_path_buf();
    move |source| RunError::Destination { path, source }
}

fn log_state(category: Category, item: &CatalogItem, state: ItemState) {
    tracing::debug!(%category, path = %item.relative_path, %state, "item state");
}
