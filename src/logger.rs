//! Logging utilities with colored output.
//!
//! This module provides:
//! - `log!` macro for formatted terminal output with colored prefixes
//! - `debug!` for output that only appears with `--verbose`
//! - `EventLine` for timestamped change notification lines in listen mode
//!
//! Log lines always go to stderr. Stdout carries only what `listen` reports,
//! so `listen --json | jq` sees nothing but JSON.
//!
//! # Example
//!
//! ```ignore
//! log!("launch"; "starting {}", bin.display());
//! debug!("hmr"; "dropped frame: {}", text);
//!
//! EventLine::new(std::io::stdout()).changed("index.html");
//! ```

use owo_colors::{OwoColorize, Stream, Style};
use std::{
    io::{self, Write, stderr},
    sync::atomic::{AtomicBool, Ordering},
};

/// Global verbose flag (set by --verbose CLI argument)
static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Set verbose mode globally
pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::SeqCst);
}

/// Check if verbose mode is enabled
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored module prefix
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Log a debug message (only shown when --verbose is enabled)
///
/// # Usage
/// ```ignore
/// debug!("module"; "debug info: {}", value);
/// ```
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Log a message with a colored module prefix to stderr.
#[inline]
pub fn log(module: &str, message: &str) {
    let prefix = colorize_prefix(module, &module.to_ascii_lowercase());
    let mut out = stderr().lock();
    writeln!(out, "{prefix} {message}").ok();
    out.flush().ok();
}

/// Apply color to a module prefix based on module type
///
/// Honors `--color` and falls back to plain text when stderr is not a terminal.
#[inline]
fn colorize_prefix(module: &str, module_lower: &str) -> String {
    let prefix = format!("[{module}]");
    let style = match module_lower {
        "launch" | "serve" => Style::new().bright_blue().bold(),
        "hmr" | "listen" => Style::new().bright_green().bold(),
        "error" => Style::new().bright_red().bold(),
        _ => Style::new().bright_yellow().bold(),
    };
    prefix
        .if_supports_color(Stream::Stderr, |text| text.style(style))
        .to_string()
}

// ============================================================================
// Event Line (timestamped notification output)
// ============================================================================

/// Get current time formatted as HH:MM:SS (UTC)
fn now() -> String {
    use std::time::SystemTime;
    let secs = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let hours = (secs / 3600) % 24;
    let minutes = (secs / 60) % 60;
    let seconds = secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Timestamped line display for change notifications.
///
/// ```text
/// [12:04:51] ~ index.html
/// [12:04:53] + about.html
/// [12:04:55] - old.css
/// [12:04:58] → new.js ← old.js
/// ```
#[derive(Debug)]
pub struct EventLine<W: Write> {
    out: W,
}

impl<W: Write> EventLine<W> {
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    /// File content changed (~ prefix, yellow).
    pub fn changed(&mut self, file: &str) -> io::Result<()> {
        let symbol = paint("~", Style::new().yellow());
        self.display(&symbol, file)
    }

    /// File created (+ prefix, green).
    pub fn created(&mut self, file: &str) -> io::Result<()> {
        let symbol = paint("+", Style::new().green());
        self.display(&symbol, file)
    }

    /// File deleted (- prefix, red).
    pub fn deleted(&mut self, file: &str) -> io::Result<()> {
        let symbol = paint("-", Style::new().red());
        self.display(&symbol, file)
    }

    /// File renamed (→ prefix, cyan). The previous name is dimmed.
    pub fn renamed(&mut self, file: &str, old_file: Option<&str>) -> io::Result<()> {
        let message = match old_file {
            Some(old) => format!("{file} {}", paint(&format!("← {old}"), Style::new().dimmed())),
            None => file.to_string(),
        };
        let symbol = paint("→", Style::new().cyan());
        self.display(&symbol, &message)
    }

    fn display(&mut self, symbol: &str, message: &str) -> io::Result<()> {
        let timestamp = paint(&format!("[{}]", now()), Style::new().dimmed());
        writeln!(self.out, "{timestamp} {symbol} {message}")?;
        self.out.flush()
    }
}

/// Style text written to stdout, honoring `--color` and TTY detection.
fn paint(text: &str, style: Style) -> String {
    text.if_supports_color(Stream::Stdout, |t| t.style(style))
        .to_string()
}
