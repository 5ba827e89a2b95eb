// Start-up initialization run before every command: make sure the log
// directory exists and hook the file subscriber into it. Nothing here is
// allowed to stop the CLI; failures degrade to a warning.

use std::path::PathBuf;

use crate::libs::paths;
use crate::{log_debug, log_warn, logger};

/// Creates the log directory and starts file logging.
///
/// Returns the log file path when file logging is active.
pub fn initialize(log_dir_override: Option<&str>, verbose: bool) -> Option<PathBuf> {
    let log_dir = paths::log_dir(log_dir_override);

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        log_warn!(
            "Could not create log directory {}: {}",
            log_dir.display(),
            e
        );
        return None;
    }

    match logger::init_file_logging(&log_dir, verbose) {
        Ok(path) => {
            log_debug!("[System] writing logs to {}", path.display());
            tracing::info!(
                version = env!("CARGO_PKG_VERSION"),
                "openframe started"
            );
            Some(path)
        }
        Err(e) => {
            log_warn!("Could not open log file in {}: {}", log_dir.display(), e);
            None
        }
    }
}
