//! Placing downloaded payloads into the destination tree
//!
//! Archives are unpacked into a hidden scratch directory inside the item's
//! destination and only moved into place once the layout checks pass. Both the
//! scratch directory and the downloaded temp file are removed on every exit
//! path when their guards drop.
//!
//! | kind         | result in `dest`                                          |
//! |--------------|-----------------------------------------------------------|
//! | `exe`        | the installer, named after the server or URL              |
//! | `zip`        | archive contents                                          |
//! | `zip/folder` | contents of the archive's single top-level folder         |
//! | `zip/exe`    | archive contents with exactly one top-level executable    |
//!
//! With `rename_as`, the single top-level executable of an archive becomes
//! `<rename_as>.exe`; an installer takes the new base name and keeps its
//! extension.

pub mod extract;
pub mod pack;

pub use extract::{Extractor, NativeZip, SevenZip};
pub use pack::{NativeZipPacker, Packer};

use crate::acquire::{DownloadResult, PART_PREFIX};
use crate::acquire::filename::{apply_rename, is_executable_name};
use crate::catalog::FileKind;
use crate::config::{ExtractorKind, Settings};
use crate::core::CancelToken;
use crate::error::ItemError;
use std::path::{Path, PathBuf};

/// Name prefix of the scratch directory archives are unpacked into.
pub const EXTRACT_PREFIX: &str = ".extract-";

const SCRATCH_PREFIXES: [&str; 2] = [PART_PREFIX, EXTRACT_PREFIX];

pub struct Organizer {
    extractor: Box<dyn Extractor>,
    cancel: CancelToken,
}

impl Organizer {
    pub fn new(extractor: Box<dyn Extractor>, cancel: CancelToken) -> Self {
        Self { extractor, cancel }
    }

    /// Organizer using the archive tool chosen in `settings`.
    pub fn from_settings(settings: &Settings, cancel: CancelToken) -> Self {
        let extractor: Box<dyn Extractor> = match settings.extractor {
            ExtractorKind::Native => Box::new(NativeZip),
            ExtractorKind::SevenZip => Box::new(SevenZip::new(&settings.seven_zip)),
        };
        Self::new(extractor, cancel)
    }

    /// Move or unpack `download` into `dest` according to `kind`.
    ///
    /// Returns the paths placed directly under `dest`.
    pub fn organize(
        &self,
        download: DownloadResult,
        kind: FileKind,
        rename_as: Option<&str>,
        dest: &Path,
    ) -> Result<Vec<PathBuf>, ItemError> {
        std::fs::create_dir_all(dest)?;
        if kind.is_archive() {
            self.place_archive(download, kind, rename_as, dest)
        } else {
            self.place_installer(download, rename_as, dest)
        }
    }

    fn place_installer(
        &self,
        download: DownloadResult,
        rename_as: Option<&str>,
        dest: &Path,
    ) -> Result<Vec<PathBuf>, ItemError> {
        let mut filename = download.filename();
        if let Some(new_name) = rename_as {
            filename = apply_rename(&filename, new_name);
        }
        let target = dest.join(&filename);
        remove_existing(&target)?;

        download
            .file
            .persist(&target)
            .map_err(|e| ItemError::Io(e.error))?;
        tracing::debug!(target = %target.display(), "installer placed");
        Ok(vec![target])
    }

    fn place_archive(
        &self,
        download: DownloadResult,
        kind: FileKind,
        rename_as: Option<&str>,
        dest: &Path,
    ) -> Result<Vec<PathBuf>, ItemError> {
        if self.cancel.is_cancelled() {
            return Err(ItemError::Cancelled);
        }

        let scratch = tempfile::Builder::new()
            .prefix(EXTRACT_PREFIX)
            .tempdir_in(dest)?;

        let status = self
            .extractor
            .extract(&download.file, scratch.path(), &self.cancel)
            .map_err(|e| ItemError::Extraction {
                status: -1,
                reason: e.to_string(),
            })?;
        if self.cancel.is_cancelled() {
            return Err(ItemError::Cancelled);
        }
        if status != 0 {
            return Err(ItemError::Extraction {
                status,
                reason: format!("archive tool exited with status {}", status),
            });
        }
        tracing::debug!(archive = %download.file.display(), "extracted");

        // The archive is no longer needed.
        drop(download);

        let content_root = match kind {
            FileKind::ZipFolder => single_top_folder(scratch.path())?,
            _ => scratch.path().to_path_buf(),
        };

        let entries = list_entries(&content_root)?;
        let must_pick_one = rename_as.is_some() || kind == FileKind::ZipExe;
        let executable = if must_pick_one {
            Some(single_executable(&entries)?)
        } else {
            None
        };

        let mut placed = Vec::with_capacity(entries.len());
        for entry in &entries {
            let name = file_name_of(entry);
            let target_name = match (&executable, rename_as) {
                (Some(exe), Some(new_name)) if exe == entry => format!("{}.exe", new_name),
                _ => name,
            };
            let target = dest.join(target_name);
            remove_existing(&target)?;
            std::fs::rename(entry, &target)?;
            placed.push(target);
        }

        scratch.close()?;
        Ok(placed)
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Direct children of `dir`, sorted by name.
fn list_entries(dir: &Path) -> Result<Vec<PathBuf>, ItemError> {
    let mut entries = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();
    Ok(entries)
}

/// The only entry of `dir`, which must be a directory.
fn single_top_folder(dir: &Path) -> Result<PathBuf, ItemError> {
    let entries = list_entries(dir)?;
    match entries.as_slice() {
        [only] if only.is_dir() => Ok(only.clone()),
        _ => Err(ItemError::Layout {
            entries: entries.iter().map(|p| file_name_of(p)).collect(),
        }),
    }
}

/// The only top-level `*.exe` file among `entries`.
fn single_executable(entries: &[PathBuf]) -> Result<PathBuf, ItemError> {
    let candidates: Vec<&PathBuf> = entries
        .iter()
        .filter(|p| p.is_file() && is_executable_name(&file_name_of(p)))
        .collect();
    match candidates.as_slice() {
        [only] => Ok((*only).clone()),
        _ => Err(ItemError::AmbiguousExecutable {
            found: candidates.len(),
            candidates: candidates.iter().map(|p| file_name_of(p)).collect(),
        }),
    }
}

/// Remove temp files and scratch dirs that a killed run left in `dest`.
///
/// Returns how many entries were removed.
pub fn sweep_scratch(dest: &Path) -> std::io::Result<usize> {
    let entries = match std::fs::read_dir(dest) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if SCRATCH_PREFIXES.iter().any(|prefix| name.starts_with(prefix)) {
            tracing::debug!(path = %entry.path().display(), "removing orphaned scratch entry");
            remove_existing(&entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Clear a leftover from an earlier attempt so the new artifact can take its place.
fn remove_existing(target: &Path) -> std::io::Result<()> {
    match std::fs::symlink_metadata(target) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(target),
        Ok(_) => std::fs::remove_file(target),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
