use std::path::PathBuf;
use std::sync::Arc;

use super::PrerequisiteSet;
use crate::installers::certificates::CertificateInstaller;
use crate::installers::git::GitChecker;
use crate::installers::kubernetes::helm;
use crate::installers::memory::MemoryChecker;
use crate::libs::executor::CommandExecutor;
use crate::libs::run_mode::RunMode;
use crate::{log_info, log_warn};

/// Git and Helm are hard requirements; memory only warns and certificates
/// are skipped when nobody is at the terminal.
pub fn chart_prerequisites(
    executor: Arc<dyn CommandExecutor>,
    mode: RunMode,
    cert_dir: PathBuf,
) -> PrerequisiteSet {
    PrerequisiteSet::new(mode)
        .with_tool(Box::new(GitChecker::new(executor.clone())))
        .with_tool(Box::new(helm(executor.clone())))
        .with_tool(Box::new(MemoryChecker::new(executor.clone())))
        .with_tool(Box::new(CertificateInstaller::new(executor, cert_dir)))
}

/// Issues a fresh localhost certificate pair. Failure is only a warning; an
/// existing pair keeps working.
pub fn regenerate_certificates(executor: Arc<dyn CommandExecutor>, cert_dir: PathBuf) {
    log_info!("Refreshing local TLS certificates...");
    match CertificateInstaller::new(executor, cert_dir).force_regenerate() {
        Ok(()) => log_info!("Certificates regenerated"),
        Err(e) => log_warn!("Certificate regeneration failed: {}", e),
    }
}
