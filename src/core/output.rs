//! Colored console output for driverclaw
//!
//! Uses owo-colors for terminal colors. Byte and spinner progress bars live in
//! [`super::progress`].

use owo_colors::OwoColorize;

/// Print an action header (blue, bold)
/// Example: "==> Acquiring 12 item(s) into drivers"
pub fn action(message: &str) {
    println!("{} {}", "==>".blue().bold(), message.bold());
}

/// Print an item header with a counter
/// Example: "( 3/12) [display] Nvidia"
pub fn action_numbered(current: usize, total: usize, message: &str) {
    let width = total.to_string().len();
    println!(
        "{} {}",
        format!("({:>width$}/{})", current, total, width = width).cyan(),
        message.bold()
    );
}

/// Print a sub-action (cyan arrow)
/// Example: "  -> downloading"
pub fn sub_action(step: &str) {
    println!("  {} {}", "->".cyan(), step);
}

/// Print a detail line (dimmed)
pub fn detail(message: &str) {
    println!("     {}", message.dimmed());
}

/// Print a success message (green)
pub fn success(message: &str) {
    println!("{} {}", "==>".green().bold(), message.green());
}

/// Print an info message (cyan)
pub fn info(message: &str) {
    println!("{} {}", "::".cyan(), message);
}

/// Print a warning message (yellow)
pub fn warning(message: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), message.yellow());
}

/// Print an error message (red)
pub fn error(message: &str) {
    eprintln!("{} {}", "error:".red().bold(), message.red());
}

/// Print a per-item failure line
/// Example: "  x failed: HTTP 404 from https://..."
pub fn item_failed(message: &str) {
    println!("  {} {}", "x".red().bold(), format!("failed: {}", message).red());
}

/// Print a per-item completion line
pub fn item_done(message: &str) {
    println!("  {} {}", "ok".green().bold(), message.dimmed());
}
