//! Download progress bar helpers
//!
//! A download starts as a spinner and is upgraded to a byte bar once the
//! response declares its length. Without a length the spinner keeps a running
//! byte counter instead of a percentage.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

const TICK_INTERVAL_MS: u64 = 80;

/// Create a spinner progress bar with standard styling.
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("     {spinner:.cyan} {msg}")
            .unwrap()
            .tick_chars(SPINNER_CHARS),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(TICK_INTERVAL_MS));
    pb
}

/// Create a download progress indicator.
///
/// `total_bytes == 0` means the length is unknown: the spinner shows the bytes
/// received so far.
pub fn create_download_progress(message: &str, total_bytes: u64) -> ProgressBar {
    let pb = create_spinner(message);
    if total_bytes > 0 {
        upgrade_to_bytes(&pb, total_bytes);
    } else {
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("     {spinner:.cyan} {msg} {bytes} ({bytes_per_sec})")
                .unwrap()
                .tick_chars(SPINNER_CHARS),
        );
    }
    pb
}

/// Upgrade a spinner to a byte progress bar when content length is known.
pub fn upgrade_to_bytes(pb: &ProgressBar, total_bytes: u64) {
    pb.set_length(total_bytes);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("     {spinner:.cyan} [{bar:30.cyan/dim}] {bytes}/{total_bytes} ({eta})")
            .unwrap()
            .progress_chars("━╸━"),
    );
}

/// RAII guard that clears a progress bar when dropped.
///
/// Keeps the terminal clean when a download bails out with `?`.
pub struct ProgressGuard<'a>(&'a ProgressBar);

impl<'a> ProgressGuard<'a> {
    pub fn new(pb: &'a ProgressBar) -> Self {
        Self(pb)
    }
}

impl Drop for ProgressGuard<'_> {
    fn drop(&mut self) {
        self.0.finish_and_clear();
    }
}

/// Run a closure with a spinner, clearing it when done.
pub fn with_spinner<T, E>(message: &str, f: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
    let pb = create_spinner(message);
    let _guard = ProgressGuard::new(&pb);
    f()
}
