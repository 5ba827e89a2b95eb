use std::sync::Arc;

use super::{PrerequisiteError, PrerequisiteSet};
use crate::installers::dev_tools::{jq, skaffold, telepresence};
use crate::libs::executor::CommandExecutor;
use crate::libs::k3d_manager::K3dManager;
use crate::libs::run_mode::RunMode;
use crate::log_debug;

pub fn intercept_prerequisites(executor: Arc<dyn CommandExecutor>, mode: RunMode) -> PrerequisiteSet {
    PrerequisiteSet::new(mode)
        .with_tool(Box::new(telepresence(executor.clone())))
        .with_tool(Box::new(jq(executor)))
}

pub fn scaffold_prerequisites(executor: Arc<dyn CommandExecutor>, mode: RunMode) -> PrerequisiteSet {
    PrerequisiteSet::new(mode).with_tool(Box::new(skaffold(executor)))
}

/// Dev workflows are pointless without a cluster to talk to.
pub fn ensure_cluster_available(executor: Arc<dyn CommandExecutor>) -> Result<(), PrerequisiteError> {
    let clusters = K3dManager::new(executor, false)
        .list_clusters()
        .unwrap_or_default();
    log_debug!("[Prerequisites] {} cluster(s) available", clusters.len());
    if clusters.is_empty() {
        return Err(PrerequisiteError::NoClusters);
    }
    Ok(())
}

pub fn ensure_intercept_prerequisites(
    executor: Arc<dyn CommandExecutor>,
    mode: RunMode,
) -> Result<(), PrerequisiteError> {
    intercept_prerequisites(executor.clone(), mode).ensure()?;
    ensure_cluster_available(executor)
}

pub fn ensure_scaffold_prerequisites(
    executor: Arc<dyn CommandExecutor>,
    mode: RunMode,
) -> Result<(), PrerequisiteError> {
    scaffold_prerequisites(executor.clone(), mode).ensure()?;
    ensure_cluster_available(executor)
}
