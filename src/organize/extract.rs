//! Archive extraction
//!
//! Extractors report a process-style status: 0 on success, anything else is a
//! failure the organizer turns into an extraction error. [`NativeZip`] needs
//! no external tools; [`SevenZip`] shells out to a 7z-compatible binary.

use crate::core::CancelToken;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

/// Status returned when extraction stopped because of cancellation.
pub const STATUS_CANCELLED: i32 = 130;

/// Status returned by [`NativeZip`] for unreadable or corrupt archives.
pub const STATUS_BAD_ARCHIVE: i32 = 2;

const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Unpacks an archive into a directory.
pub trait Extractor: Send + Sync {
    fn extract(&self, archive: &Path, dest: &Path, cancel: &CancelToken) -> std::io::Result<i32>;
}

/// Zip extraction with the `zip` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeZip;

impl Extractor for NativeZip {
    fn extract(&self, archive: &Path, dest: &Path, cancel: &CancelToken) -> std::io::Result<i32> {
        let file = File::open(archive)?;
        let mut zip = match zip::ZipArchive::new(BufReader::new(file)) {
            Ok(zip) => zip,
            Err(e) => {
                tracing::debug!(archive = %archive.display(), error = %e, "zip read error");
                return Ok(STATUS_BAD_ARCHIVE);
            }
        };

        for i in 0..zip.len() {
            if cancel.is_cancelled() {
                return Ok(STATUS_CANCELLED);
            }

            let mut entry = match zip.by_index(i) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!(index = i, error = %e, "zip entry error");
                    return Ok(STATUS_BAD_ARCHIVE);
                }
            };

            // Entries that would escape `dest` are skipped.
            let Some(relative) = entry.enclosed_name() else {
                tracing::warn!(name = entry.name(), "skipping unsafe zip entry");
                continue;
            };
            let outpath = dest.join(relative);

            if entry.is_dir() {
                std::fs::create_dir_all(&outpath)?;
                continue;
            }

            if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut outfile = File::create(&outpath)?;
            let mut buffer = [0u8; 64 * 1024];
            loop {
                let n = match entry.read(&mut buffer) {
                    Ok(n) => n,
                    Err(e) => {
                        tracing::debug!(entry = %outpath.display(), error = %e, "zip data error");
                        return Ok(STATUS_BAD_ARCHIVE);
                    }
                };
                if n == 0 {
                    break;
                }
                outfile.write_all(&buffer[..n])?;
            }

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = entry.unix_mode() {
                    std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode))?;
                }
            }
        }

        Ok(0)
    }
}

/// A 7z-compatible command line tool (`7z`, `7zz`, `7za`).
#[derive(Debug, Clone)]
pub struct SevenZip {
    program: PathBuf,
}

impl SevenZip {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run the tool silently, killing it if `cancel` fires.
    pub(crate) fn run(&self, args: &[std::ffi::OsString], cancel: &CancelToken) -> std::io::Result<i32> {
        tracing::debug!(program = %self.program.display(), ?args, "running archive tool");
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status.code().unwrap_or(-1));
            }
            if cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                return Ok(STATUS_CANCELLED);
            }
            std::thread::sleep(CHILD_POLL_INTERVAL);
        }
    }
}

impl Extractor for SevenZip {
    fn extract(&self, archive: &Path, dest: &Path, cancel: &CancelToken) -> std::io::Result<i32> {
        let mut out_flag = std::ffi::OsString::from("-o");
        out_flag.push(dest.as_os_str());
        let args = vec![
            "x".into(),
            archive.as_os_str().to_os_string(),
            out_flag,
            "-y".into(),
        ];
        self.run(&args, cancel)
    }
}
