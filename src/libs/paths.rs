// Resolves the handful of filesystem locations openframe reads or writes:
// the application home, the log directory, the certificate directory and the
// `helm-values.yaml` in the working directory.

use std::path::{Path, PathBuf};

use crate::log_debug;

/// Application home, tilde-expanded on use.
pub const APP_HOME: &str = "~/.openframe";
/// Values file looked up in the current working directory.
pub const HELM_VALUES_FILE: &str = "helm-values.yaml";
/// Certificate file names produced by mkcert.
pub const CERT_FILE_NAME: &str = "localhost.pem";
pub const KEY_FILE_NAME: &str = "localhost-key.pem";

/// Expands a leading `~` (and `$VARS`) in a user supplied path.
///
/// Falls back to the raw input when expansion fails (e.g. undefined variable),
/// which leaves the decision about a bad path to whoever opens it.
pub fn expand_tilde(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(e) => {
            log_debug!("[Paths] could not expand '{}': {}", path, e);
            PathBuf::from(shellexpand::tilde(path).as_ref())
        }
    }
}

pub fn app_home() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".openframe"))
        .unwrap_or_else(|| expand_tilde(APP_HOME))
}

/// Log directory: explicit override (flag / `OPENFRAME_LOG_DIR`) or `~/.openframe/logs`.
pub fn log_dir(override_dir: Option<&str>) -> PathBuf {
    match override_dir {
        Some(dir) if !dir.trim().is_empty() => expand_tilde(dir.trim()),
        _ => app_home().join("logs"),
    }
}

/// Certificate directory: `--cert-dir` when given, else `~/.openframe/certs`.
pub fn cert_dir(override_dir: Option<&str>) -> PathBuf {
    match override_dir {
        Some(dir) if !dir.trim().is_empty() => expand_tilde(dir.trim()),
        _ => app_home().join("certs"),
    }
}

pub fn cert_files(cert_dir: &Path) -> (PathBuf, PathBuf) {
    (cert_dir.join(CERT_FILE_NAME), cert_dir.join(KEY_FILE_NAME))
}

pub fn helm_values_path() -> PathBuf {
    PathBuf::from(HELM_VALUES_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_dirs_win_over_defaults() {
        assert_eq!(cert_dir(Some("/tmp/certs")), PathBuf::from("/tmp/certs"));
        assert_eq!(log_dir(Some(" /var/log/of ")), PathBuf::from("/var/log/of"));
        assert!(cert_dir(Some("  ")).ends_with("certs"));
    }

    #[test]
    fn tilde_is_expanded() {
        let expanded = expand_tilde("~/x");
        assert!(!expanded.to_string_lossy().starts_with('~'));
    }

    #[test]
    fn cert_files_live_in_cert_dir() {
        let (cert, key) = cert_files(Path::new("/c"));
        assert_eq!(cert, PathBuf::from("/c/localhost.pem"));
        assert_eq!(key, PathBuf::from("/c/localhost-key.pem"));
    }
}
