// This file implements the application's logging system.
// Terminal output goes through the `log_*!` macros (colored tags on stderr),
// and every message is mirrored into `tracing` so the log file under the
// openframe log directory keeps a plain-text record of each invocation.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::EnvFilter;

/// Name of the log file created inside the log directory.
pub const LOG_FILE_NAME: &str = "openframe.log";

// `log_info!` for general progress. Suppressed by `--silent`.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {{
        let message = format!($($arg)*);
        ::tracing::info!("{}", message);
        if !$crate::logger::is_silent() {
            eprintln!("{} {}", ::colored::Colorize::bright_green("[INFO]"), message);
        }
    }};
}

// `log_warn!` for non-critical issues. Always printed.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {{
        let message = format!($($arg)*);
        ::tracing::warn!("{}", message);
        eprintln!("{} {}", ::colored::Colorize::bright_yellow("[WARN]"), message);
    }};
}

// `log_error!` for failures the user has to act on. Always printed.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {{
        let message = format!($($arg)*);
        ::tracing::error!("{}", message);
        eprintln!("{} {}", ::colored::Colorize::bright_red("[ERROR]"), message);
    }};
}

// `log_debug!` only reaches the terminal with `--verbose`, but always reaches
// the log file (subject to the subscriber's filter).
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {{
        let message = format!($($arg)*);
        ::tracing::debug!("{}", message);
        if $crate::logger::is_debug_enabled() {
            eprintln!("{} {}", ::colored::Colorize::dimmed("[DEBUG]"), message);
        }
    }};
}

static DEBUG_ENABLED: OnceLock<AtomicBool> = OnceLock::new();
static SILENT: OnceLock<AtomicBool> = OnceLock::new();

/// Sets the terminal verbosity for the rest of the process.
///
/// # Arguments
/// * `verbose`: print `log_debug!` output to the terminal.
/// * `silent`: hide `log_info!` output (warnings and errors still print).
pub fn init(verbose: bool, silent: bool) {
    DEBUG_ENABLED
        .get_or_init(|| AtomicBool::new(verbose))
        .store(verbose, Ordering::Relaxed);
    SILENT
        .get_or_init(|| AtomicBool::new(silent))
        .store(silent, Ordering::Relaxed);
}

/// Checks if debug logging is currently enabled.
pub fn is_debug_enabled() -> bool {
    DEBUG_ENABLED
        .get()
        .map(|f| f.load(Ordering::Relaxed))
        .unwrap_or(false)
}

/// Checks if informational output is suppressed.
pub fn is_silent() -> bool {
    SILENT.get().map(|f| f.load(Ordering::Relaxed)).unwrap_or(false)
}

/// Installs the global `tracing` subscriber writing to `<log_dir>/openframe.log`.
///
/// The filter comes from `RUST_LOG` when set, otherwise `debug` for verbose
/// runs and `info` for the rest. ANSI codes are disabled since the target is
/// a file. Returns the log file path on success.
pub fn init_file_logging(log_dir: &Path, verbose: bool) -> std::io::Result<PathBuf> {
    let log_path = log_dir.join(LOG_FILE_NAME);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let default_level = if verbose { "debug" } else { "info" };
    // `try_init` fails when a subscriber already exists (tests); that's fine.
    let _ = tracing_subscriber::fmt()
        .with_writer(file)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_ansi(false)
        .with_target(true)
        .try_init();

    Ok(log_path)
}
