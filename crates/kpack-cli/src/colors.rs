//! ANSI styling for kpack's progress and summary lines.

use std::fmt::Display;
use std::io::{self, Write};

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const BLUE: &str = "\x1b[34m";
pub const CYAN: &str = "\x1b[36m";

/// Wrap `text` in `style`, always resetting afterwards.
pub fn paint(style: &str, text: impl Display) -> String {
    format!("{style}{text}{RESET}")
}

/// A `Label: value` summary line with a styled label.
pub fn field(style: &str, label: &str, value: impl Display) -> String {
    format!("{} {}", paint(style, format_args!("{label}:")), value)
}

/// Flush stdout so a progress line without a trailing newline shows up.
pub fn flush_stdout() {
    io::stdout().flush().ok();
}
