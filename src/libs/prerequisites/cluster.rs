// Cluster commands need a running Docker daemon plus kubectl and k3d.

use std::sync::Arc;

use super::{PrerequisiteError, PrerequisiteSet};
use crate::installers::docker::DockerChecker;
use crate::installers::kubernetes::{k3d, kubectl};
use crate::libs::executor::CommandExecutor;
use crate::libs::prompts;
use crate::libs::run_mode::RunMode;
use crate::{log_debug, log_warn};

pub fn cluster_prerequisites(executor: Arc<dyn CommandExecutor>, mode: RunMode) -> PrerequisiteSet {
    PrerequisiteSet::new(mode)
        .with_tool(Box::new(DockerChecker::new(executor.clone())))
        .with_tool(Box::new(kubectl(executor.clone())))
        .with_tool(Box::new(k3d(executor)))
}

/// A Docker that is installed but stopped gets a start attempt before the
/// regular flow, so it isn't offered for reinstallation.
pub fn start_docker_if_stopped(
    docker: &DockerChecker,
    mode: RunMode,
) -> Result<(), PrerequisiteError> {
    if !docker.is_stopped() {
        return Ok(());
    }
    let start = prompts::confirm(
        mode,
        "Docker is installed but not running. Would you like me to start it?",
        true,
    )?;
    if !start {
        log_debug!("[Prerequisites] user chose not to start Docker");
        return Ok(());
    }
    if let Err(e) = docker.start_daemon() {
        log_warn!("Could not start Docker: {}", e);
    }
    Ok(())
}

pub fn ensure_cluster_prerequisites(
    executor: Arc<dyn CommandExecutor>,
    mode: RunMode,
) -> Result<(), PrerequisiteError> {
    start_docker_if_stopped(&DockerChecker::new(executor.clone()), mode)?;
    cluster_prerequisites(executor, mode).ensure()
}
