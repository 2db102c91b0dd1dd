//! # Terminal Rendering
//!
//! Utilities for rendering formatted output to the terminal.

use colored::Colorize;
use emojiswap_core::{ErrorInfo, ErrorKind};
use unicode_width::UnicodeWidthStr;

/// Output style
pub enum Style {
    Error,
    Warning,
    Success,
}

/// Print a message with a style
pub fn print_styled(message: &str, style: Style) {
    let prefix = match style {
        Style::Error => "Error:".bright_red().bold(),
        Style::Warning => "Warning:".bright_yellow().bold(),
        Style::Success => "✓".bright_green().bold(),
    };
    println!("{} {}", prefix, message);
}

/// One-line hint for what the user can do about a failure
pub fn recovery_hint(error: &ErrorInfo) -> &'static str {
    match error.kind {
        ErrorKind::NoFaceDetected => "Try another photo with a clearly visible face",
        ErrorKind::Timeout | ErrorKind::Network => "Check that the service is reachable and try again",
        ErrorKind::Service => "The service rejected the request; try again later",
        ErrorKind::Storage => "Check the cache directory permissions",
    }
}

/// Progress spinner
pub struct Spinner {
    pb: indicatif::ProgressBar,
}

impl Spinner {
    pub fn new(message: &str) -> Self {
        let pb = indicatif::ProgressBar::new_spinner();
        if let Ok(style) = indicatif::ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { pb }
    }

    pub fn update(&self, message: &str) {
        self.pb.set_message(message.to_string());
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

/// Print a table
pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.width()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.width());
            }
        }
    }

    let header_line: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| pad(h, widths[i]))
        .collect();
    println!("{}", header_line.join(" │ ").bright_cyan().bold());

    let separator: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
    println!("{}", separator.join("─┼─").dimmed());

    for row in rows {
        let row_line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| pad(cell, widths.get(i).copied().unwrap_or(0)))
            .collect();
        println!("{}", row_line.join(" │ "));
    }
}

/// Pad by display width; emoji are wider than one column
fn pad(cell: &str, width: usize) -> String {
    let fill = width.saturating_sub(cell.width());
    format!("{}{}", cell, " ".repeat(fill))
}
