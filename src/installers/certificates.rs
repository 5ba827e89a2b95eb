//! # Certificate Installer
//!
//! Local ingress is served over TLS with a mkcert-issued certificate for
//! `localhost`. The pair lives in the certificate directory and is handed to
//! Helm via `--set-file`, so the secret material never appears on a command
//! line.
//!
//! Workflow:
//! 1. make sure `mkcert` itself is available (brew / apt / choco)
//! 2. `mkcert -install` to trust the local CA
//! 3. `mkcert -cert-file <dir>/localhost.pem -key-file <dir>/localhost-key.pem localhost 127.0.0.1 ::1`

use std::path::PathBuf;
use std::sync::Arc;

use super::package_manager::{apt, brew, choco};
use super::{InstallError, InstallStep, Installability, ToolChecker, run_steps};
use crate::libs::executor::{CommandExecutor, ExecutorExt};
use crate::libs::paths;
use crate::libs::utilities::platform::{Os, detect_os};
use crate::log_debug;

pub struct CertificateInstaller {
    executor: Arc<dyn CommandExecutor>,
    cert_dir: PathBuf,
    os: Os,
}

impl CertificateInstaller {
    pub fn new(executor: Arc<dyn CommandExecutor>, cert_dir: PathBuf) -> Self {
        Self {
            executor,
            cert_dir,
            os: detect_os(),
        }
    }

    pub fn cert_files(&self) -> (PathBuf, PathBuf) {
        paths::cert_files(&self.cert_dir)
    }

    fn ensure_mkcert(&self) -> Result<(), InstallError> {
        if self.executor.execute("mkcert", &["-version"]).is_ok() {
            return Ok(());
        }
        let step = match self.os {
            Os::MacOs => brew("mkcert"),
            Os::Linux => apt("mkcert libnss3-tools"),
            Os::Windows => choco("mkcert"),
            Os::Other => return Err(InstallError::UnsupportedPlatform { tool: "mkcert".into() }),
        };
        run_steps(self.executor.as_ref(), &[step])
    }

    fn generate(&self) -> Result<(), InstallError> {
        self.ensure_mkcert()?;
        std::fs::create_dir_all(&self.cert_dir).map_err(|e| {
            InstallError::Verification(format!(
                "could not create certificate directory {}: {}",
                self.cert_dir.display(),
                e
            ))
        })?;

        let (cert, key) = self.cert_files();
        let cert = cert.to_string_lossy().into_owned();
        let key = key.to_string_lossy().into_owned();
        run_steps(
            self.executor.as_ref(),
            &[
                InstallStep::new("trust local CA", "mkcert", &["-install"]),
                InstallStep::new(
                    "issue localhost certificate",
                    "mkcert",
                    &["-cert-file", &cert, "-key-file", &key, "localhost", "127.0.0.1", "::1"],
                ),
            ],
        )
    }

    /// Removes the current pair (if any) and issues a fresh one.
    pub fn force_regenerate(&self) -> Result<(), InstallError> {
        let (cert, key) = self.cert_files();
        for file in [&cert, &key] {
            if file.exists() {
                if let Err(e) = std::fs::remove_file(file) {
                    log_debug!("[Certificates] could not remove {}: {}", file.display(), e);
                }
            }
        }
        self.generate()
    }
}

impl ToolChecker for CertificateInstaller {
    fn name(&self) -> String {
        "Certificates".to_string()
    }

    fn is_installed(&self) -> bool {
        let (cert, key) = self.cert_files();
        cert.is_file() && key.is_file()
    }

    fn install_help(&self) -> String {
        format!(
            "Certificates: Install mkcert, run 'mkcert -install' and generate localhost certificates into {}",
            self.cert_dir.display()
        )
    }

    fn install(&self) -> Result<(), InstallError> {
        if self.is_installed() {
            return Ok(());
        }
        self.generate()
    }

    fn installability(&self) -> Installability {
        Installability::SkipWhenNonInteractive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::executor::MockCommandExecutor;

    #[test]
    fn installed_only_when_both_files_exist() {
        let dir = tempfile::tempdir().unwrap();
        let installer = CertificateInstaller::new(
            Arc::new(MockCommandExecutor::new()),
            dir.path().to_path_buf(),
        );
        assert!(!installer.is_installed());

        let (cert, key) = installer.cert_files();
        std::fs::write(&cert, "cert").unwrap();
        assert!(!installer.is_installed());
        std::fs::write(&key, "key").unwrap();
        assert!(installer.is_installed());
    }
}
