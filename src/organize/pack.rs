//! Packing the finished tree into a single archive.
//!
//! Directories are stored under their own name (`drivers/display/...`), files
//! at the archive root, matching what `7z a` produces.

use super::extract::SevenZip;
use crate::core::CancelToken;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

/// Status for a source path that does not exist.
pub const STATUS_MISSING_SOURCE: i32 = 1;

/// Packs `sources` into `output` at compression `level` (0-9).
pub trait Packer {
    fn pack(&self, output: &Path, sources: &[&Path], level: u8) -> std::io::Result<i32>;
}

/// Zip packing with the `zip` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeZipPacker;

fn zip_options(level: u8) -> SimpleFileOptions {
    if level == 0 {
        SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
    } else {
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(i64::from(level.min(9))))
    }
}

/// Archive name for `path`, relative to `base`, with forward slashes.
fn entry_name(base: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

impl Packer for NativeZipPacker {
    fn pack(&self, output: &Path, sources: &[&Path], level: u8) -> std::io::Result<i32> {
        if let Some(missing) = sources.iter().find(|s| !s.exists()) {
            tracing::warn!(source = %missing.display(), "pack source does not exist");
            return Ok(STATUS_MISSING_SOURCE);
        }

        if let Some(parent) = output.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let options = zip_options(level);
        let mut zip = zip::ZipWriter::new(BufWriter::new(File::create(output)?));

        for source in sources {
            let base = source.parent().unwrap_or_else(|| Path::new(""));
            for entry in WalkDir::new(source).sort_by_file_name() {
                let entry = entry.map_err(std::io::Error::other)?;
                let path = entry.path();
                if path == output {
                    continue;
                }
                let Some(name) = entry_name(base, path) else {
                    continue;
                };

                if entry.file_type().is_dir() {
                    zip.add_directory(name, options)
                        .map_err(std::io::Error::other)?;
                } else {
                    zip.start_file(name, options)
                        .map_err(std::io::Error::other)?;
                    let mut reader = BufReader::new(File::open(path)?);
                    std::io::copy(&mut reader, &mut zip)?;
                }
            }
        }

        zip.finish().map_err(std::io::Error::other)?;
        Ok(0)
    }
}

impl Packer for SevenZip {
    fn pack(&self, output: &Path, sources: &[&Path], level: u8) -> std::io::Result<i32> {
        let mut args: Vec<std::ffi::OsString> = vec!["a".into(), output.as_os_str().to_os_string()];
        args.extend(sources.iter().map(|s| s.as_os_str().to_os_string()));
        args.push(format!("-mx{}", level.min(9)).into());
        args.push("-y".into());
        self.run(&args, &CancelToken::new())
    }
}
